//! 规则执行器
//!
//! 实现规则树的短路求值执行，返回匹配结果和评估追踪信息。

use crate::compiler::CompiledRule;
use crate::error::{Result, RuleError};
use crate::evaluator::ConditionEvaluator;
use crate::models::{Comparison, EvaluationContext, EvaluationResult, LogicalNode, RuleNode};
use crate::operators::LogicalOperator;
use crate::registry::FunctionRegistry;
use rule_shared::EngineConfig;
use std::time::Instant;

/// 规则执行器
#[derive(Debug, Clone)]
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
    /// 允许求值的最大树深度
    max_depth: usize,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
            max_depth: EngineConfig::default().max_tree_depth,
        }
    }

    /// 按引擎配置创建
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            trace_enabled: config.trace_enabled,
            max_depth: config.max_tree_depth,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 对单条数据记录求值规则树
    pub fn evaluate(
        &self,
        root: &RuleNode,
        context: &EvaluationContext,
        functions: &FunctionRegistry,
    ) -> Result<bool> {
        self.check_depth(root)?;
        self.evaluate_node(root, context, functions, None, "root")
    }

    /// 执行规则评估
    pub fn execute(
        &self,
        rule: &CompiledRule,
        context: &EvaluationContext,
        functions: &FunctionRegistry,
    ) -> Result<EvaluationResult> {
        let start = Instant::now();
        self.check_depth(rule.root())?;

        let mut result = EvaluationResult::new(rule.id().to_string());
        let matched =
            self.evaluate_node(rule.root(), context, functions, Some(&mut result), "root")?;

        result.matched = matched;
        result.evaluation_time_ms = start.elapsed().as_millis() as i64;

        Ok(result)
    }

    /// 外部构造的树可能绕过解析器的深度限制，递归前先检查
    fn check_depth(&self, root: &RuleNode) -> Result<()> {
        let depth = root.depth();
        if depth > self.max_depth {
            return Err(RuleError::DepthLimitExceeded {
                depth,
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    /// 递归评估规则节点
    fn evaluate_node(
        &self,
        node: &RuleNode,
        context: &EvaluationContext,
        functions: &FunctionRegistry,
        result: Option<&mut EvaluationResult>,
        path: &str,
    ) -> Result<bool> {
        match node {
            RuleNode::Comparison(cond) => {
                self.evaluate_comparison(cond, context, functions, result, path)
            }
            RuleNode::Logical(logical) => {
                self.evaluate_logical(logical, context, functions, result, path)
            }
        }
    }

    /// 评估比较条件
    fn evaluate_comparison(
        &self,
        cond: &Comparison,
        context: &EvaluationContext,
        functions: &FunctionRegistry,
        result: Option<&mut EvaluationResult>,
        path: &str,
    ) -> Result<bool> {
        let left = ConditionEvaluator::resolve_name(&cond.attribute, context, functions);
        let right = ConditionEvaluator::resolve_operand(&cond.operand, context, functions);

        let matched = ConditionEvaluator::compare(&left, cond.operator, &right)?;

        if let Some(result) = result {
            if self.trace_enabled {
                result.evaluation_trace.push(format!(
                    "{}: {} {} {} ({} {} {}) => {}",
                    path,
                    cond.attribute,
                    cond.operator,
                    cond.operand,
                    left,
                    cond.operator,
                    right,
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                ));
            }

            if matched {
                result.matched_conditions.push(format!(
                    "{}: {} {} {}",
                    path, cond.attribute, cond.operator, cond.operand
                ));
            }
        }

        Ok(matched)
    }

    /// 评估逻辑节点（短路求值）
    fn evaluate_logical(
        &self,
        logical: &LogicalNode,
        context: &EvaluationContext,
        functions: &FunctionRegistry,
        mut result: Option<&mut EvaluationResult>,
        path: &str,
    ) -> Result<bool> {
        let recording = result.is_some();
        let child_path = |side: &str| {
            if recording {
                format!("{}.{}", path, side)
            } else {
                String::new()
            }
        };

        let left = self.evaluate_node(
            &logical.left,
            context,
            functions,
            result.as_deref_mut(),
            &child_path("left"),
        )?;

        // AND 遇到 false、OR 遇到 true 时右子树不再求值
        let short_circuit = match logical.operator {
            LogicalOperator::And => !left,
            LogicalOperator::Or => left,
        };

        if short_circuit {
            if let Some(result) = result.filter(|_| self.trace_enabled) {
                result.evaluation_trace.push(format!(
                    "{}: {} 短路 - 左子树{}",
                    path,
                    logical.operator,
                    if left { "匹配" } else { "不匹配" }
                ));
            }
            return Ok(left);
        }

        self.evaluate_node(
            &logical.right,
            context,
            functions,
            result,
            &child_path("right"),
        )
    }
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new()
    }
}
