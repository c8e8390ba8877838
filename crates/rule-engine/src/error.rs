//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    // ==================== 解析错误 ====================
    #[error("规则字符串不能为空")]
    EmptyInput,

    #[error("意外的标记: 位置 {position} 处为 '{found}'，期望 {expected}")]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: &'static str,
    },

    #[error("表达式不平衡: {0}")]
    UnbalancedExpression(String),

    #[error("无效的属性或值: {0}，该属性不在属性目录中")]
    InvalidOperand(String),

    #[error("规则树深度 {depth} 超过上限 {limit}")]
    DepthLimitExceeded { depth: usize, limit: usize },

    // ==================== 执行错误 ====================
    #[error("未知操作符: {0}")]
    UnknownOperator(String),

    #[error("类型不匹配: 操作符 {operator} 需要数值，实际 {left} 与 {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("评估数据不能为空")]
    EmptyRecord,

    // ==================== 变更错误 ====================
    #[error("组合规则至少需要两个操作数，实际 {0} 个")]
    InsufficientOperands(usize),

    #[error("{entity} 未找到: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("规则文本与规则树不一致: {0}")]
    SourceMismatch(String),

    #[error("删除条件 '{0}' 后规则为空")]
    EmptyResult(String),

    // ==================== 属性目录错误 ====================
    #[error("属性已存在: {0}")]
    AttributeExists(String),

    #[error("未知的属性类型: {0}")]
    UnknownAttributeType(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::UnexpectedToken { .. } => "UNEXPECTED_TOKEN",
            Self::UnbalancedExpression(_) => "UNBALANCED_EXPRESSION",
            Self::InvalidOperand(_) => "INVALID_OPERAND",
            Self::DepthLimitExceeded { .. } => "DEPTH_LIMIT_EXCEEDED",
            Self::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::EmptyRecord => "EMPTY_RECORD",
            Self::InsufficientOperands(_) => "INSUFFICIENT_OPERANDS",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::SourceMismatch(_) => "SOURCE_MISMATCH",
            Self::EmptyResult(_) => "EMPTY_RESULT",
            Self::AttributeExists(_) => "ATTRIBUTE_EXISTS",
            Self::UnknownAttributeType(_) => "UNKNOWN_ATTRIBUTE_TYPE",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// 是否为内部错误
    ///
    /// 内部错误说明有绕过解析器构造的非法节点或损坏的快照进入了引擎，
    /// 上层应与调用方输入校验错误区分开返回不同的状态码。
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::UnknownOperator(_) | Self::Json(_))
    }

    pub(crate) fn rule_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "规则",
            id: id.into(),
        }
    }
}
