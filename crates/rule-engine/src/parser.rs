//! 规则解析器
//!
//! 文法只有一个优先级，按从左到右的顺序归约：
//!
//! ```text
//! Rule        := Comparison ( LogicalOp Comparison )*
//! Comparison  := Identifier CompareOp Operand
//! Operand     := Identifier | NumberLiteral | StringLiteral
//! LogicalOp   := "AND" | "OR"
//! CompareOp   := ">" | "<" | "=" | "!="
//! ```
//!
//! 属性名、比较操作符和字面量是相邻的标记，没有任何包围符号，因此每读满一个三元组就立即
//! 归约成比较节点压栈；遇到 AND/OR 时记为待定组合符，下一个三元组归约后与栈顶合并。
//! 生成的展示文本带有括号，括号只开启一个新的归约帧，帧结束后的节点按三元组同样处理。

use crate::catalog::AttributeCatalog;
use crate::error::{Result, RuleError};
use crate::models::{Operand, RuleNode};
use crate::operators::LogicalOperator;
use crate::registry::FunctionRegistry;
use crate::tokenizer::{Token, tokenize};
use rule_shared::EngineConfig;
use std::sync::Arc;
use tracing::debug;

/// 规则解析器
#[derive(Clone)]
pub struct RuleParser {
    catalog: Arc<dyn AttributeCatalog>,
    functions: Option<FunctionRegistry>,
    max_depth: usize,
}

/// 一个归约帧：已归约节点栈（附带子树深度）与待定的逻辑组合符
#[derive(Default)]
struct Frame {
    stack: Vec<(RuleNode, usize)>,
    pending: Option<LogicalOperator>,
}

impl Frame {
    /// 当前位置是否应当开始一个新的比较条件
    fn expects_condition(&self) -> bool {
        self.stack.is_empty() || self.pending.is_some()
    }

    fn reduce(&mut self, node: RuleNode, depth: usize, limit: usize) -> Result<()> {
        let reduced = match (self.pending.take(), self.stack.pop()) {
            (Some(op), Some((left, left_depth))) => {
                let depth = left_depth.max(depth) + 1;
                if depth > limit {
                    return Err(RuleError::DepthLimitExceeded { depth, limit });
                }
                (RuleNode::logical(op, left, node), depth)
            }
            (_, previous) => {
                // 缺少组合符时保留两个节点，结束时报告不平衡
                self.stack.extend(previous);
                (node, depth)
            }
        };
        self.stack.push(reduced);
        Ok(())
    }

    fn finish(mut self) -> Result<(RuleNode, usize)> {
        if let Some(op) = self.pending {
            return Err(RuleError::UnbalancedExpression(format!(
                "逻辑操作符 {} 缺少右侧条件",
                op
            )));
        }

        match (self.stack.pop(), self.stack.is_empty()) {
            (Some(node), true) => Ok(node),
            (None, _) => Err(RuleError::UnbalancedExpression("分组中没有任何条件".to_string())),
            (Some(_), false) => Err(RuleError::UnbalancedExpression(format!(
                "剩余 {} 个条件未被 AND/OR 连接",
                self.stack.len() + 1
            ))),
        }
    }
}

fn current<'a>(root: &'a mut Frame, open: &'a mut [Frame]) -> &'a mut Frame {
    match open.last_mut() {
        Some(frame) => frame,
        None => root,
    }
}

fn unexpected(position: usize, found: &Token, expected: &'static str) -> RuleError {
    RuleError::UnexpectedToken {
        position,
        found: found.to_string(),
        expected,
    }
}

fn end_of_input(position: usize, expected: &'static str) -> RuleError {
    RuleError::UnexpectedToken {
        position,
        found: "输入结束".to_string(),
        expected,
    }
}

impl RuleParser {
    pub fn new(catalog: Arc<dyn AttributeCatalog>) -> Self {
        Self {
            catalog,
            functions: None,
            max_depth: EngineConfig::default().max_tree_depth,
        }
    }

    /// 允许已注册的自定义函数名出现在比较条件左侧
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 标识符是否为已知属性或自定义函数
    pub fn is_known(&self, name: &str) -> bool {
        self.catalog.exists(name)
            || self
                .functions
                .as_ref()
                .is_some_and(|functions| functions.contains(name))
    }

    /// 解析规则字符串为规则树
    pub fn parse(&self, text: &str) -> Result<RuleNode> {
        let tokens = tokenize(text)?;
        let end = tokens.len();
        let mut tokens = tokens.into_iter().enumerate();

        let mut root = Frame::default();
        let mut open: Vec<Frame> = Vec::new();

        while let Some((position, token)) = tokens.next() {
            match token {
                Token::Logical(op) => {
                    let frame = current(&mut root, &mut open);
                    if frame.expects_condition() {
                        return Err(unexpected(position, &token, "比较条件"));
                    }
                    frame.pending = Some(op);
                }
                Token::Open => {
                    if !current(&mut root, &mut open).expects_condition() {
                        return Err(unexpected(position, &token, "AND/OR"));
                    }
                    open.push(Frame::default());
                }
                Token::Close => {
                    let Some(frame) = open.pop() else {
                        return Err(unexpected(position, &token, "AND/OR 或输入结束"));
                    };
                    let (node, depth) = frame.finish()?;
                    current(&mut root, &mut open).reduce(node, depth, self.max_depth)?;
                }
                first => {
                    let comparison = self.read_comparison(position, first, &mut tokens, end)?;
                    current(&mut root, &mut open).reduce(comparison, 1, self.max_depth)?;
                }
            }
        }

        if !open.is_empty() {
            return Err(RuleError::UnbalancedExpression(format!(
                "缺少 {} 个右括号",
                open.len()
            )));
        }

        let (node, depth) = root.finish()?;
        debug!(depth, conditions = node.condition_count(), "规则解析完成");
        Ok(node)
    }

    /// 校验未经过解析器的规则树
    ///
    /// 深度不超过上限，且比较条件左侧均为已知属性或自定义函数。
    pub fn validate(&self, root: &RuleNode) -> Result<()> {
        let depth = root.depth();
        if depth > self.max_depth {
            return Err(RuleError::DepthLimitExceeded {
                depth,
                limit: self.max_depth,
            });
        }

        let mut unknown = None;
        root.visit_comparisons(|cond| {
            if unknown.is_none() && !self.is_known(&cond.attribute) {
                unknown = Some(cond.attribute.clone());
            }
        });

        match unknown {
            Some(attribute) => Err(RuleError::InvalidOperand(attribute)),
            None => Ok(()),
        }
    }

    /// 读取 `属性 操作符 操作数` 三元组并归约为比较节点
    fn read_comparison(
        &self,
        position: usize,
        first: Token,
        tokens: &mut impl Iterator<Item = (usize, Token)>,
        end: usize,
    ) -> Result<RuleNode> {
        let attribute = match first {
            Token::Identifier(name) if self.is_known(&name) => name,
            Token::Identifier(name) => return Err(RuleError::InvalidOperand(name)),
            other => return Err(unexpected(position, &other, "属性名")),
        };

        let operator = match tokens.next() {
            Some((_, Token::Compare(op))) => op,
            Some((pos, other)) => return Err(unexpected(pos, &other, "比较操作符")),
            None => return Err(end_of_input(end, "比较操作符")),
        };

        let operand = match tokens.next() {
            Some((_, Token::Identifier(name))) => Operand::Identifier(name),
            Some((_, Token::Number { value, text })) => Operand::Number { value, text },
            Some((_, Token::Text(text))) => Operand::Text(text),
            Some((pos, other)) => return Err(unexpected(pos, &other, "操作数")),
            None => return Err(end_of_input(end, "操作数")),
        };

        Ok(RuleNode::comparison(attribute, operator, operand))
    }
}
