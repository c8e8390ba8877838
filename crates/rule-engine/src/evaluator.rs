//! 条件评估器
//!
//! 负责比较条件两侧的取值解析与类型感知的比较语义。
//! 数值之间按 IEEE-754 双精度比较；只要有一侧不是数值，`=`/`!=` 做精确的值相等判断，
//! `>`/`<` 没有定义并返回类型不匹配，绝不把任意字符串强转为浮点数。

use crate::error::{Result, RuleError};
use crate::models::{EvaluationContext, Operand};
use crate::operators::CompareOperator;
use crate::registry::FunctionRegistry;
use serde_json::{Number, Value};

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 解析名称的取值
    ///
    /// 优先级：数据记录中的键 → 已注册的自定义函数 → 数值字面量 → 字符串字面量。
    pub fn resolve_name(
        name: &str,
        context: &EvaluationContext,
        functions: &FunctionRegistry,
    ) -> Value {
        if let Some(value) = context.get_field(name) {
            return value.clone();
        }

        if let Some(func) = functions.lookup(name) {
            return func(context);
        }

        Self::literal(name)
    }

    /// 解析比较条件右侧操作数的取值
    pub fn resolve_operand(
        operand: &Operand,
        context: &EvaluationContext,
        functions: &FunctionRegistry,
    ) -> Value {
        match operand {
            Operand::Identifier(name) => Self::resolve_name(name, context, functions),
            Operand::Number { value, text } => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(text.clone())),
            Operand::Text(text) => Value::String(text.clone()),
        }
    }

    /// 比较两个已解析的值
    pub fn compare(left: &Value, operator: CompareOperator, right: &Value) -> Result<bool> {
        if let (Some(l), Some(r)) = (Self::as_f64(left), Self::as_f64(right)) {
            return Ok(match operator {
                CompareOperator::Gt => l > r,
                CompareOperator::Lt => l < r,
                CompareOperator::Eq => l == r,
                CompareOperator::Neq => l != r,
            });
        }

        if operator.is_ordering() {
            return Err(RuleError::TypeMismatch {
                operator: operator.to_string(),
                left: Self::describe(left),
                right: Self::describe(right),
            });
        }

        Ok((left == right) == (operator == CompareOperator::Eq))
    }

    /// 未命中记录和函数的标识符按字面量处理
    fn literal(text: &str) -> Value {
        if let Some(number) = text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .and_then(Number::from_f64)
        {
            return Value::Number(number);
        }

        match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        }
    }

    /// 尝试将 Value 转换为 f64，数值字符串视为数值
    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    fn describe(value: &Value) -> String {
        format!("{} {}", Self::type_name(value), value)
    }

    /// 获取值的类型名称
    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
