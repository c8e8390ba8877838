//! 可观测性
//!
//! 规则引擎是纯 CPU 计算的同步库，这里只负责日志订阅器的初始化，
//! 所有入口通过 [`init`] 统一配置日志格式与级别。

pub mod tracing;

use ::tracing::info;
use anyhow::Result;
use serde::Deserialize;

/// 日志配置，对应配置文件中的 `[observability]` 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 日志中标识来源的服务名，为空时由 AppConfig 补全
    pub service_name: String,
    /// EnvFilter 指令，RUST_LOG 存在时以 RUST_LOG 为准
    pub log_level: String,
    /// 输出 JSON 行而不是人类可读格式
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }
}

/// 安装全局日志订阅器，进程内只能成功调用一次
///
/// ```ignore
/// let config = AppConfig::load("rule-engine")?;
/// observability::init(&config.observability)?;
/// ```
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    tracing::init(config)?;

    info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "日志已初始化"
    );

    Ok(())
}
