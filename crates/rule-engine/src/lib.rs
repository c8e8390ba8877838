//! 属性规则引擎
//!
//! 把 `age > 30 AND department = Sales` 这类规则字符串编译成规则树，
//! 对扁平的数据记录求值，并支持组合、追加和删除条件等变更。
//!
//! - 分词与单优先级、左结合的解析
//! - 属性目录校验与自定义函数注册表
//! - 短路求值与评估追踪
//! - 基于 DashMap 的并发规则存储

pub mod catalog;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod mutator;
pub mod operators;
pub mod parser;
pub mod registry;
pub mod store;
pub mod tokenizer;

#[cfg(test)]
mod test_support;

pub use catalog::{Attribute, AttributeCatalog, AttributeType, InMemoryCatalog};
pub use compiler::{CompiledRule, RuleCompiler};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use models::{
    Comparison, EvaluationContext, EvaluationResult, LogicalNode, Operand, Rule, RuleNode,
};
pub use mutator::RuleMutator;
pub use operators::{CompareOperator, LogicalOperator};
pub use parser::RuleParser;
pub use registry::{FunctionRegistry, UserFunction};
pub use store::{RuleStore, RuleStoreStats};
