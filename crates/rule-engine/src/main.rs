//! 规则引擎命令行服务
//!
//! 从配置加载属性目录与规则，逐行读取标准输入中的 JSON 数据记录，
//! 对每条记录求值所有规则并把结果以 JSON 行写到标准输出。

use anyhow::Result;
use rule_engine::{EvaluationContext, FunctionRegistry, InMemoryCatalog, RuleStore};
use rule_shared::config::AppConfig;
use rule_shared::observability;
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<()> {
    let config = AppConfig::load("rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    info!(environment = %config.environment, "Starting rule-engine...");

    let catalog = InMemoryCatalog::from_seeds(&config.catalog.attributes)?;
    let store = RuleStore::new(Arc::new(catalog), FunctionRegistry::new(), &config.engine);

    let mut rules = Vec::with_capacity(config.rules.len());
    for seed in &config.rules {
        match store.create(&seed.expression) {
            Ok(compiled) => rules.push((seed.name.clone(), compiled.id().to_string())),
            Err(e) => warn!(rule = %seed.name, code = e.code(), error = %e, "Failed to compile rule"),
        }
    }
    info!("Loaded {} of {} configured rules", rules.len(), config.rules.len());

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record = match EvaluationContext::from_json(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed record");
                continue;
            }
        };

        let results: Vec<Value> = rules
            .iter()
            .map(|(name, rule_id)| match store.evaluate(rule_id, &record) {
                Ok(result) => json!({
                    "rule": name,
                    "matched": result.matched,
                    "matched_conditions": result.matched_conditions,
                    "evaluation_trace": result.evaluation_trace,
                }),
                Err(e) => json!({
                    "rule": name,
                    "error": e.to_string(),
                    "code": e.code(),
                }),
            })
            .collect();

        let output = json!({ "line": index + 1, "results": results });
        writeln!(stdout, "{}", serde_json::to_string(&output)?)?;
    }

    info!("Input exhausted, shutting down");
    Ok(())
}
