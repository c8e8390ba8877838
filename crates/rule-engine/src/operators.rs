//! 规则操作符定义

use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 比较操作符
///
/// 序列化为规则字符串中的符号，反序列化时拒绝固定集合之外的符号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompareOperator {
    Gt,
    Lt,
    Eq,
    Neq,
}

impl CompareOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
            Self::Neq => "!=",
        }
    }

    /// 从符号解析，未知符号返回 UnknownOperator
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        match symbol {
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            "=" => Ok(Self::Eq),
            "!=" => Ok(Self::Neq),
            other => Err(RuleError::UnknownOperator(other.to_string())),
        }
    }

    /// 是否只对数值有定义
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Gt | Self::Lt)
    }
}

impl fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl TryFrom<String> for CompareOperator {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_symbol(&value)
    }
}

impl From<CompareOperator> for String {
    fn from(op: CompareOperator) -> Self {
        op.symbol().to_string()
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// 从关键字解析，大小写敏感
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        match symbol {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(RuleError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl TryFrom<String> for LogicalOperator {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_symbol(&value)
    }
}

impl From<LogicalOperator> for String {
    fn from(op: LogicalOperator) -> Self {
        op.symbol().to_string()
    }
}
