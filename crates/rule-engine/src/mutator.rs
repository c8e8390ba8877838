//! 规则树变更
//!
//! 组合、替换、追加条件与删除条件。所有操作都返回新的规则树和对应的文本，
//! 调用方负责整体替换存储中的规则。

use crate::error::{Result, RuleError};
use crate::models::RuleNode;
use crate::operators::LogicalOperator;
use crate::parser::RuleParser;
use tracing::debug;

/// 规则变更器
#[derive(Clone)]
pub struct RuleMutator {
    parser: RuleParser,
}

impl RuleMutator {
    pub fn new(parser: RuleParser) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> &RuleParser {
        &self.parser
    }

    /// 用 AND 从左到右折叠多条规则
    ///
    /// 每条规则以 `(规则树, 文本)` 传入，所有权转移给组合结果。
    /// 组合文本以 ` AND ` 连接，第二条起的复合规则加括号，保证文本重新解析后语义不变。
    pub fn combine(&self, parts: Vec<(RuleNode, String)>) -> Result<(RuleNode, String)> {
        if parts.len() < 2 {
            return Err(RuleError::InsufficientOperands(parts.len()));
        }

        let mut depth = 0;
        for (index, (root, _)) in parts.iter().enumerate() {
            self.parser.validate(root)?;
            depth = if index == 0 {
                root.depth()
            } else {
                depth.max(root.depth()) + 1
            };
        }
        if depth > self.parser.max_depth() {
            return Err(RuleError::DepthLimitExceeded {
                depth,
                limit: self.parser.max_depth(),
            });
        }

        let count = parts.len();
        let mut texts = Vec::with_capacity(count);
        let mut combined: Option<RuleNode> = None;

        for (root, text) in parts {
            let text = text.trim();
            texts.push(if combined.is_some() && !root.is_leaf() {
                format!("({})", text)
            } else {
                text.to_string()
            });

            combined = Some(match combined {
                Some(left) => RuleNode::and(left, root),
                None => root,
            });
        }

        let root = combined.ok_or(RuleError::InsufficientOperands(0))?;
        debug!(rules = count, depth = root.depth(), "规则已组合");
        Ok((root, texts.join(" AND ")))
    }

    /// 整体替换为新的规则字符串
    pub fn modify(&self, text: &str) -> Result<(RuleNode, String)> {
        let root = self.parser.parse(text)?;
        Ok((root, text.to_string()))
    }

    /// 以指定的逻辑操作符追加一个条件表达式
    ///
    /// 先解析新条件，失败时原规则不受影响。
    /// 新文本为 `(原文本) OP 条件`，复合条件同样加括号。
    pub fn add_condition(
        &self,
        root: &RuleNode,
        source_text: &str,
        condition: &str,
        operator: LogicalOperator,
    ) -> Result<(RuleNode, String)> {
        let addition = self.parser.parse(condition)?;
        self.parser.validate(root)?;

        let depth = root.depth().max(addition.depth()) + 1;
        if depth > self.parser.max_depth() {
            return Err(RuleError::DepthLimitExceeded {
                depth,
                limit: self.parser.max_depth(),
            });
        }

        let condition = condition.trim();
        let text = if addition.is_leaf() {
            format!("({}) {} {}", source_text.trim(), operator, condition)
        } else {
            format!("({}) {} ({})", source_text.trim(), operator, condition)
        };

        Ok((RuleNode::logical(operator, root.clone(), addition), text))
    }

    /// 删除所有左侧为指定属性的比较条件，返回剪枝后的规则树和重新生成的文本
    pub fn remove_condition(&self, root: &RuleNode, attribute: &str) -> Result<(RuleNode, String)> {
        self.parser.validate(root)?;

        let pruned = Self::prune(root.clone(), attribute)
            .ok_or_else(|| RuleError::EmptyResult(attribute.to_string()))?;
        let text = Self::regenerate_text(&pruned);

        Ok((pruned, text))
    }

    /// 剪枝
    ///
    /// 一侧子树被完全删除的逻辑节点由另一侧子树取代；两侧都被删除时整个节点消失。
    pub fn prune(root: RuleNode, attribute: &str) -> Option<RuleNode> {
        match root {
            RuleNode::Comparison(cond) if cond.attribute == attribute => None,
            RuleNode::Comparison(cond) => Some(RuleNode::Comparison(cond)),
            RuleNode::Logical(node) => {
                let left = Self::prune(*node.left, attribute);
                let right = Self::prune(*node.right, attribute);
                match (left, right) {
                    (Some(left), Some(right)) => Some(RuleNode::logical(node.operator, left, right)),
                    (Some(kept), None) | (None, Some(kept)) => Some(kept),
                    (None, None) => None,
                }
            }
        }
    }

    /// 由规则树生成规范文本，比较条件为 `a op b`，逻辑节点为 `(l op r)`
    pub fn regenerate_text(root: &RuleNode) -> String {
        root.to_string()
    }
}
