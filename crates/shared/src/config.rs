//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use crate::observability::ObservabilityConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 规则引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 规则树允许的最大深度，解析、校验和求值时都会检查
    pub max_tree_depth: usize,
    /// 是否记录详细评估追踪
    pub trace_enabled: bool,
    /// 删除条件后规则为空时是否允许直接移除该规则
    ///
    /// 为 false 时返回 EmptyResult 错误，原规则保持不变
    pub allow_empty_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tree_depth: 256,
            trace_enabled: false,
            allow_empty_rules: false,
        }
    }
}

/// 属性目录初始数据
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeSeed {
    pub name: String,
    /// 属性类型：string / number / boolean
    #[serde(rename = "type")]
    pub attr_type: String,
}

/// 属性目录配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CatalogConfig {
    pub attributes: Vec<AttributeSeed>,
}

/// 启动时加载的规则
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSeed {
    pub name: String,
    pub expression: String,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub catalog: CatalogConfig,
    pub rules: Vec<RuleSeed>,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（RULE_ 前缀，层级用双下划线分隔，如 RULE_ENGINE__MAX_TREE_DEPTH -> engine.max_tree_depth）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("RULE_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from_dir(service_name, &env, Path::new(&config_dir))
    }

    /// 从指定目录加载配置
    pub fn load_from_dir(
        service_name: &str,
        environment: &str,
        config_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", environment)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", environment))).required(false),
            )
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("RULE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if config.observability.service_name.is_empty() {
            config.observability.service_name = config.service_name.clone();
        }

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
