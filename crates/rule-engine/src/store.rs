//! 规则存储管理
//!
//! 使用 DashMap 提供线程安全的规则缓存。规则的变更在条目锁内完成，
//! 并发读者只会看到变更前或变更后的完整规则，不会看到中间状态。

use crate::catalog::AttributeCatalog;
use crate::compiler::{CompiledRule, RuleCompiler};
use crate::error::{Result, RuleError};
use crate::executor::RuleExecutor;
use crate::models::{EvaluationContext, EvaluationResult, Rule, RuleNode};
use crate::mutator::RuleMutator;
use crate::operators::LogicalOperator;
use crate::parser::RuleParser;
use crate::registry::FunctionRegistry;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rule_shared::EngineConfig;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 规则存储
#[derive(Clone)]
pub struct RuleStore {
    /// 编译后的规则缓存
    rules: Arc<DashMap<String, CompiledRule>>,
    /// 规则编译器
    compiler: Arc<Mutex<RuleCompiler>>,
    mutator: RuleMutator,
    executor: RuleExecutor,
    functions: FunctionRegistry,
    allow_empty_rules: bool,
}

impl RuleStore {
    /// 创建新的规则存储
    pub fn new(
        catalog: Arc<dyn AttributeCatalog>,
        functions: FunctionRegistry,
        config: &EngineConfig,
    ) -> Self {
        let parser = RuleParser::new(catalog)
            .with_functions(functions.clone())
            .with_max_depth(config.max_tree_depth);

        Self {
            rules: Arc::new(DashMap::new()),
            compiler: Arc::new(Mutex::new(RuleCompiler::new(parser.clone()))),
            mutator: RuleMutator::new(parser),
            executor: RuleExecutor::from_config(config),
            functions,
            allow_empty_rules: config.allow_empty_rules,
        }
    }

    /// 求值时使用的自定义函数注册表
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 从规则字符串创建规则
    #[instrument(skip(self))]
    pub fn create(&self, text: &str) -> Result<CompiledRule> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile(text)?
        };

        self.rules
            .insert(compiled.id().to_string(), compiled.clone());

        info!(rule_id = %compiled.id(), "规则已创建");
        Ok(compiled)
    }

    /// 加载规则（从 Rule 对象），同 ID 的规则会被覆盖
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn load(&self, rule: Rule) -> Result<()> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile_rule(rule)?
        };

        let rule_id = compiled.id().to_string();
        self.rules.insert(rule_id.clone(), compiled);

        info!("规则已加载: {}", rule_id);
        Ok(())
    }

    /// 加载规则（从 JSON 字符串）
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<String> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile_from_json(json)?
        };

        let rule_id = compiled.id().to_string();
        self.rules.insert(rule_id.clone(), compiled);

        info!("规则已加载: {}", rule_id);
        Ok(rule_id)
    }

    /// 导出规则为 JSON
    pub fn export_json(&self, rule_id: &str) -> Result<String> {
        let rule = self
            .rules
            .get(rule_id)
            .map(|r| r.rule.clone())
            .ok_or_else(|| RuleError::rule_not_found(rule_id))?;

        Ok(serde_json::to_string_pretty(&rule)?)
    }

    /// 用 AND 组合多条已存储的规则，生成一条新规则
    ///
    /// 源规则保持不变，组合结果使用它们规则树的副本。
    #[instrument(skip(self))]
    pub fn combine(&self, rule_ids: &[&str]) -> Result<CompiledRule> {
        if rule_ids.len() < 2 {
            return Err(RuleError::InsufficientOperands(rule_ids.len()));
        }

        let parts = rule_ids
            .iter()
            .map(|id| {
                self.rules
                    .get(*id)
                    .map(|r| (r.root().clone(), r.source_text().to_string()))
                    .ok_or_else(|| RuleError::rule_not_found(*id))
            })
            .collect::<Result<Vec<_>>>()?;

        let (root, text) = self.mutator.combine(parts)?;
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile_rule(Rule::new(text, root))?
        };

        self.rules
            .insert(compiled.id().to_string(), compiled.clone());

        info!(rule_id = %compiled.id(), sources = rule_ids.len(), "规则已组合");
        Ok(compiled)
    }

    /// 用新的规则字符串整体替换规则
    #[instrument(skip(self))]
    pub fn modify(&self, rule_id: &str, text: &str) -> Result<CompiledRule> {
        let compiled = self.mutate(rule_id, |mutator, _| mutator.modify(text))?;
        info!("规则已修改: {}", rule_id);
        Ok(compiled)
    }

    /// 追加条件
    #[instrument(skip(self))]
    pub fn add_condition(
        &self,
        rule_id: &str,
        condition: &str,
        operator: LogicalOperator,
    ) -> Result<CompiledRule> {
        let compiled = self.mutate(rule_id, |mutator, current| {
            mutator.add_condition(current.root(), current.source_text(), condition, operator)
        })?;
        info!(conditions = compiled.root().condition_count(), "条件已追加: {}", rule_id);
        Ok(compiled)
    }

    /// 删除条件
    ///
    /// 删除后规则为空时：允许空规则则移除该规则并返回 `None`，否则返回 EmptyResult 且规则不变。
    #[instrument(skip(self))]
    pub fn remove_condition(&self, rule_id: &str, attribute: &str) -> Result<Option<CompiledRule>> {
        let Entry::Occupied(mut entry) = self.rules.entry(rule_id.to_string()) else {
            warn!("删除条件时规则不存在: {}", rule_id);
            return Err(RuleError::rule_not_found(rule_id));
        };

        match self.mutator.remove_condition(entry.get().root(), attribute) {
            Ok((root, text)) => {
                self.compiler.lock().recompile(entry.get_mut(), root, text);
                info!("条件已删除: {}", rule_id);
                Ok(Some(entry.get().clone()))
            }
            Err(RuleError::EmptyResult(_)) if self.allow_empty_rules => {
                entry.remove();
                info!("删除条件后规则为空，规则已移除: {}", rule_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 对单条数据记录求值规则
    pub fn evaluate(
        &self,
        rule_id: &str,
        context: &EvaluationContext,
    ) -> Result<EvaluationResult> {
        if context.is_empty() {
            return Err(RuleError::EmptyRecord);
        }

        // 先复制规则再求值，自定义函数执行期间不持有条目锁
        let compiled = self.get(rule_id).ok_or_else(|| RuleError::rule_not_found(rule_id))?;
        let result = self.executor.execute(&compiled, context, &self.functions)?;

        debug!(rule_id, matched = result.matched, "规则求值完成");
        Ok(result)
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn delete(&self, rule_id: &str) -> Result<()> {
        if self.rules.remove(rule_id).is_some() {
            info!("规则已删除: {}", rule_id);
            Ok(())
        } else {
            warn!("删除不存在的规则: {}", rule_id);
            Err(RuleError::rule_not_found(rule_id))
        }
    }

    /// 获取规则
    pub fn get(&self, rule_id: &str) -> Option<CompiledRule> {
        self.rules.get(rule_id).map(|r| r.clone())
    }

    /// 检查规则是否存在
    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    /// 获取所有规则 ID
    pub fn list_ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.key().clone()).collect()
    }

    /// 获取所有规则
    pub fn list_all(&self) -> Vec<CompiledRule> {
        self.rules.iter().map(|r| r.value().clone()).collect()
    }

    /// 清空所有规则
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rules.len();
        self.rules.clear();
        info!("已清空 {} 条规则", count);
    }

    /// 获取规则统计信息
    pub fn stats(&self) -> RuleStoreStats {
        let rules_count = self.rules.len();
        let (total_conditions, max_depth) = self.rules.iter().fold((0, 0), |(count, depth), r| {
            (
                count + r.root().condition_count(),
                depth.max(r.root().depth()),
            )
        });

        RuleStoreStats {
            rules_count,
            total_conditions,
            avg_conditions_per_rule: if rules_count > 0 {
                total_conditions as f64 / rules_count as f64
            } else {
                0.0
            },
            max_depth,
        }
    }

    /// 在条目锁内计算并替换规则树
    fn mutate<F>(&self, rule_id: &str, change: F) -> Result<CompiledRule>
    where
        F: FnOnce(&RuleMutator, &CompiledRule) -> Result<(RuleNode, String)>,
    {
        let mut entry = self.rules.get_mut(rule_id).ok_or_else(|| {
            warn!("变更不存在的规则: {}", rule_id);
            RuleError::rule_not_found(rule_id)
        })?;

        let (root, text) = change(&self.mutator, entry.value())?;
        self.compiler.lock().recompile(entry.value_mut(), root, text);

        Ok(entry.value().clone())
    }
}

/// 规则存储统计信息
#[derive(Debug, Clone)]
pub struct RuleStoreStats {
    /// 规则总数
    pub rules_count: usize,
    /// 所有规则的比较条件总数
    pub total_conditions: usize,
    /// 平均每条规则的比较条件数
    pub avg_conditions_per_rule: f64,
    /// 最深的规则树深度
    pub max_depth: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::employee_catalog;
    use serde_json::json;

    fn store() -> RuleStore {
        store_with(EngineConfig::default())
    }

    fn store_with(config: EngineConfig) -> RuleStore {
        RuleStore::new(
            Arc::new(employee_catalog()),
            FunctionRegistry::new(),
            &config,
        )
    }

    fn employee() -> EvaluationContext {
        EvaluationContext::new(json!({
            "age": 35,
            "department": "Sales",
            "salary": 60000,
            "experience": 3
        }))
    }

    #[test]
    fn test_create_and_get() {
        let store = store();
        let compiled = store.create("age > 30 AND department = Sales").unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.contains(compiled.id()));
        assert_eq!(
            store.get(compiled.id()).unwrap().source_text(),
            "age > 30 AND department = Sales"
        );
    }

    #[test]
    fn test_create_invalid_rule_is_not_stored() {
        let store = store();
        assert!(store.create("age >").is_err());
        assert!(store.create("height > 1").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_evaluate() {
        let store = store();
        let id = store.create("age > 30 AND department = Sales").unwrap().id().to_string();

        let result = store.evaluate(&id, &employee()).unwrap();
        assert!(result.matched);
        assert_eq!(result.rule_id, id);
    }

    #[test]
    fn test_evaluate_rejects_empty_record() {
        let store = store();
        let id = store.create("age > 30").unwrap().id().to_string();

        let err = store
            .evaluate(&id, &EvaluationContext::new(json!({})))
            .unwrap_err();
        assert!(matches!(err, RuleError::EmptyRecord));
    }

    #[test]
    fn test_evaluate_unknown_rule() {
        let err = store().evaluate("missing", &employee()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_combine() {
        let store = store();
        let a = store.create("age > 30").unwrap();
        let b = store.create("department = Sales").unwrap();

        let combined = store.combine(&[a.id(), b.id()]).unwrap();
        assert_eq!(combined.source_text(), "age > 30 AND department = Sales");
        assert_eq!(store.len(), 3);

        // 源规则不受影响
        assert!(store.get(a.id()).unwrap().root().is_leaf());

        let ctx = EvaluationContext::new(json!({ "age": 35, "department": "Marketing" }));
        assert!(store.evaluate(a.id(), &ctx).unwrap().matched);
        assert!(!store.evaluate(combined.id(), &ctx).unwrap().matched);
    }

    #[test]
    fn test_combine_errors() {
        let store = store();
        let a = store.create("age > 30").unwrap();

        let err = store.combine(&[a.id()]).unwrap_err();
        assert!(matches!(err, RuleError::InsufficientOperands(1)));

        let err = store.combine(&[a.id(), "missing"]).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_modify() {
        let store = store();
        let created = store.create("age > 30").unwrap();

        let modified = store.modify(created.id(), "salary > 50000").unwrap();
        assert_eq!(modified.id(), created.id());
        assert_eq!(modified.source_text(), "salary > 50000");
        assert!(modified.compile_version > created.compile_version);
        assert!(modified.rule.updated_at >= created.rule.updated_at);
        assert_eq!(modified.rule.created_at, created.rule.created_at);
    }

    #[test]
    fn test_failed_modify_keeps_rule() {
        let store = store();
        let created = store.create("age > 30").unwrap();

        assert!(store.modify(created.id(), "salary >").is_err());
        assert_eq!(store.get(created.id()).unwrap().source_text(), "age > 30");

        assert_eq!(
            store.modify("missing", "age > 1").unwrap_err().code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn test_add_condition() {
        let store = store();
        let id = store.create("age > 30").unwrap().id().to_string();

        let updated = store
            .add_condition(&id, "department = Sales", LogicalOperator::And)
            .unwrap();
        assert_eq!(updated.source_text(), "(age > 30) AND department = Sales");
        assert!(updated.required_fields.contains("department"));

        let ctx = EvaluationContext::new(json!({ "age": 40, "department": "HR" }));
        assert!(!store.evaluate(&id, &ctx).unwrap().matched);
    }

    #[test]
    fn test_remove_condition() {
        let store = store();
        let id = store
            .create("age > 30 AND department = Sales")
            .unwrap()
            .id()
            .to_string();

        let updated = store.remove_condition(&id, "department").unwrap().unwrap();
        assert_eq!(updated.source_text(), "age > 30");
        assert!(!updated.required_fields.contains("department"));
    }

    #[test]
    fn test_remove_last_condition_rejected_by_default() {
        let store = store();
        let id = store.create("age > 30").unwrap().id().to_string();

        let err = store.remove_condition(&id, "age").unwrap_err();
        assert!(matches!(err, RuleError::EmptyResult(_)));
        assert_eq!(store.get(&id).unwrap().source_text(), "age > 30");
    }

    #[test]
    fn test_remove_last_condition_deletes_when_allowed() {
        let store = store_with(EngineConfig {
            allow_empty_rules: true,
            ..EngineConfig::default()
        });
        let id = store.create("age > 30").unwrap().id().to_string();

        assert!(store.remove_condition(&id, "age").unwrap().is_none());
        assert!(!store.contains(&id));
    }

    #[test]
    fn test_remove_condition_unknown_rule() {
        let err = store().remove_condition("missing", "age").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_delete_and_clear() {
        let store = store();
        let id = store.create("age > 30").unwrap().id().to_string();
        store.create("salary > 1").unwrap();

        store.delete(&id).unwrap();
        assert!(store.delete(&id).is_err());
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_export_and_load_json() {
        let source = store();
        let id = source
            .create("age > 30 OR department = 'Sales'")
            .unwrap()
            .id()
            .to_string();
        let json = source.export_json(&id).unwrap();

        let target = store();
        let loaded_id = target.load_from_json(&json).unwrap();
        assert_eq!(loaded_id, id);
        assert_eq!(
            target.get(&id).unwrap().root(),
            source.get(&id).unwrap().root()
        );
    }

    #[test]
    fn test_load_validates_rule() {
        let store = store();
        let rule = Rule::new(
            "height > 1",
            RuleNode::comparison(
                "height",
                crate::operators::CompareOperator::Gt,
                crate::models::Operand::number(1.0),
            ),
        );

        assert!(store.load(rule).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_rejects_text_tree_mismatch() {
        let store = store();
        let root = RuleNode::comparison(
            "age",
            crate::operators::CompareOperator::Gt,
            crate::models::Operand::number(30.0),
        );

        let err = store.load(Rule::new("salary < 1", root)).unwrap_err();
        assert_eq!(err.code(), "SOURCE_MISMATCH");
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_from_json_rejects_edited_text() {
        let store = store();
        let id = store.create("age > 30").unwrap().id().to_string();
        let json = store
            .export_json(&id)
            .unwrap()
            .replace("age > 30", "salary < 1");
        store.delete(&id).unwrap();

        let err = store.load_from_json(&json).unwrap_err();
        assert!(matches!(err, RuleError::SourceMismatch(_)));
        assert!(!store.contains(&id));
    }

    #[test]
    fn test_export_and_reload_deep_rule() {
        let store = store();
        let text = (0..200)
            .map(|i| format!("salary > {}", i))
            .collect::<Vec<_>>()
            .join(" AND ");
        let original = store.create(&text).unwrap();
        assert_eq!(original.root().depth(), 200);

        let json = store.export_json(original.id()).unwrap();
        store.delete(original.id()).unwrap();

        let id = store.load_from_json(&json).unwrap();
        let reloaded = store.get(&id).unwrap();
        assert_eq!(reloaded.root(), original.root());
        assert_eq!(reloaded.source_text(), text);
    }

    #[test]
    fn test_registered_function() {
        let store = store();
        store.functions().register("tenure_bonus", |ctx: &EvaluationContext| {
            let years = ctx
                .get_field("experience")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0);
            json!(years * 100.0)
        });

        let id = store.create("tenure_bonus > 200").unwrap().id().to_string();
        assert!(store.evaluate(&id, &employee()).unwrap().matched);
    }

    #[test]
    fn test_stats() {
        let store = store();
        store.create("age > 30 AND department = Sales").unwrap();
        store.create("salary > 1").unwrap();

        let stats = store.stats();
        assert_eq!(stats.rules_count, 2);
        assert_eq!(stats.total_conditions, 3);
        assert!((stats.avg_conditions_per_rule - 1.5).abs() < f64::EPSILON);
        assert_eq!(stats.max_depth, 2);
    }

    #[test]
    fn test_concurrent_mutations_are_atomic() {
        use std::thread;

        let store = store();
        let id = store.create("age > 0").unwrap().id().to_string();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let id = id.clone();
                thread::spawn(move || {
                    for j in 0..10 {
                        let condition = format!("salary > {}", i * 10 + j);
                        store
                            .add_condition(&id, &condition, LogicalOperator::And)
                            .unwrap();
                        let snapshot = store.get(&id).unwrap();
                        assert_eq!(
                            snapshot.root().attributes().len(),
                            snapshot.required_fields.len()
                        );
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let rule = store.get(&id).unwrap();
        assert_eq!(rule.root().condition_count(), 81);
        // 文本与规则树始终一致
        let reparsed = store.mutator.parser().parse(rule.source_text()).unwrap();
        assert_eq!(reparsed.condition_count(), 81);
    }
}
