//! 规则引擎领域模型

use crate::error::Result;
use crate::operators::{CompareOperator, LogicalOperator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// 规则定义
///
/// `source_text` 始终可以由 `root` 重新生成，所有变更操作同时替换二者。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub source_text: String,
    pub root: RuleNode,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(source_text: impl Into<String>, root: RuleNode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_text: source_text.into(),
            root,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// 整体替换规则树与文本
    pub fn replace(&mut self, root: RuleNode, source_text: String) {
        self.root = root;
        self.source_text = source_text;
        self.updated_at = Utc::now();
    }
}

/// 比较条件右侧的操作数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// 裸标识符，求值时依次查找数据记录、自定义函数、数值、字符串
    Identifier(String),
    /// 数值字面量，保留原始文本用于重新生成规则字符串
    Number { value: f64, text: String },
    /// 引号包裹的字符串字面量
    Text(String),
}

impl Operand {
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn number(value: f64) -> Self {
        Self::Number {
            value,
            text: value.to_string(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => f.write_str(name),
            Self::Number { text, .. } => f.write_str(text),
            Self::Text(text) if text.contains('\'') => write!(f, "\"{}\"", text),
            Self::Text(text) => write!(f, "'{}'", text),
        }
    }
}

/// 规则节点（比较条件或逻辑组合）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleNode {
    Comparison(Comparison),
    Logical(LogicalNode),
}

/// 比较条件：`attribute operator operand`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub attribute: String,
    pub operator: CompareOperator,
    pub operand: Operand,
}

/// 逻辑节点，恰好两个子树
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalNode {
    pub operator: LogicalOperator,
    pub left: Box<RuleNode>,
    pub right: Box<RuleNode>,
}

impl RuleNode {
    pub fn comparison(
        attribute: impl Into<String>,
        operator: CompareOperator,
        operand: Operand,
    ) -> Self {
        Self::Comparison(Comparison {
            attribute: attribute.into(),
            operator,
            operand,
        })
    }

    /// 从原始符号构造比较节点，供未经过解析器的调用方使用
    pub fn comparison_from_parts(
        attribute: impl Into<String>,
        operator: &str,
        operand: Operand,
    ) -> Result<Self> {
        let operator = CompareOperator::from_symbol(operator)?;
        Ok(Self::comparison(attribute, operator, operand))
    }

    /// 组合两个子树，子树所有权转移到新节点
    pub fn logical(operator: LogicalOperator, left: RuleNode, right: RuleNode) -> Self {
        Self::Logical(LogicalNode {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn and(left: RuleNode, right: RuleNode) -> Self {
        Self::logical(LogicalOperator::And, left, right)
    }

    pub fn or(left: RuleNode, right: RuleNode) -> Self {
        Self::logical(LogicalOperator::Or, left, right)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Comparison(_))
    }

    /// 节点携带的操作符符号
    pub fn operator_kind(&self) -> &'static str {
        match self {
            Self::Comparison(cond) => cond.operator.symbol(),
            Self::Logical(node) => node.operator.symbol(),
        }
    }

    /// 树的深度（单个比较条件为 1）
    ///
    /// 使用显式栈计算，避免对外部构造的超深树递归。
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1usize)];

        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Self::Logical(logical) = node {
                stack.push((&logical.left, depth + 1));
                stack.push((&logical.right, depth + 1));
            }
        }

        max_depth
    }

    /// 比较条件数量
    pub fn condition_count(&self) -> usize {
        let mut count = 0;
        self.visit_comparisons(|_| count += 1);
        count
    }

    /// 规则中比较条件左侧引用的所有属性
    pub fn attributes(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.visit_comparisons(|cond| {
            fields.insert(cond.attribute.clone());
        });
        fields
    }

    /// 按从左到右的顺序访问所有比较条件
    pub fn visit_comparisons<'a, F>(&'a self, mut visit: F)
    where
        F: FnMut(&'a Comparison),
    {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Comparison(cond) => visit(cond),
                Self::Logical(logical) => {
                    stack.push(&logical.right);
                    stack.push(&logical.left);
                }
            }
        }
    }
}

/// 规范文本形式：比较条件为 `a op b`，逻辑节点为 `(l op r)`
impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison(cond) => {
                write!(f, "{} {} {}", cond.attribute, cond.operator, cond.operand)
            }
            Self::Logical(node) => {
                write!(f, "({} {} {})", node.left, node.operator, node.right)
            }
        }
    }
}

/// 评估上下文 - 提供给规则引擎的数据记录
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    data: Value,
}

impl EvaluationContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let data: Value = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    /// 获取属性值，属性集合是扁平的，只查找顶层键
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.data.as_object().and_then(|map| map.get(name))
    }

    /// 记录中没有任何属性
    pub fn is_empty(&self) -> bool {
        self.data.as_object().is_none_or(|map| map.is_empty())
    }

    /// 获取底层数据
    pub fn data(&self) -> &Value {
        &self.data
    }
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub rule_id: String,
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_ms: i64,
}

impl EvaluationResult {
    pub fn new(rule_id: String) -> Self {
        Self {
            matched: false,
            rule_id,
            matched_conditions: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_ms: 0,
        }
    }
}
