//! 共享库
//!
//! 包含规则引擎及其外围服务共用的配置加载与日志初始化代码。

pub mod config;
pub mod observability;

pub use config::{AppConfig, AttributeSeed, CatalogConfig, EngineConfig, RuleSeed};
pub use observability::ObservabilityConfig;
