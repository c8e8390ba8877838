//! 规则字符串分词器
//!
//! 严格按空白切分，不支持转义；包含空格的字面量无法表示。
//! 单词开头的括号和结尾未配对的括号会被拆成独立的分组标记，使生成的展示文本可以被重新解析。

use crate::error::{Result, RuleError};
use crate::operators::{CompareOperator, LogicalOperator};
use std::fmt;

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    Number { value: f64, text: String },
    Text(String),
    Logical(LogicalOperator),
    Compare(CompareOperator),
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => f.write_str(name),
            Self::Number { text, .. } => f.write_str(text),
            Self::Text(text) => write!(f, "'{}'", text),
            Self::Logical(op) => write!(f, "{}", op),
            Self::Compare(op) => write!(f, "{}", op),
            Self::Open => f.write_str("("),
            Self::Close => f.write_str(")"),
        }
    }
}

/// 将规则字符串切分为标记序列
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    if text.trim().is_empty() {
        return Err(RuleError::EmptyInput);
    }

    let mut tokens = Vec::new();

    for word in text.split_whitespace() {
        let after_open = word.trim_start_matches('(');
        let opens = word.len() - after_open.len();
        let core = peel_closes(after_open);
        let closes = after_open.len() - core.len();

        tokens.extend(std::iter::repeat_n(Token::Open, opens));
        if !core.is_empty() {
            tokens.push(classify(core));
        }
        tokens.extend(std::iter::repeat_n(Token::Close, closes));
    }

    Ok(tokens)
}

/// 只拆掉没有配对 `(` 的结尾 `)`，`f(x)` 这样的单词保持完整
fn peel_closes(word: &str) -> &str {
    let mut core = word;
    while core.ends_with(')') && core.matches(')').count() > core.matches('(').count() {
        core = &core[..core.len() - 1];
    }
    core
}

fn classify(word: &str) -> Token {
    if let Ok(op) = LogicalOperator::from_symbol(word) {
        return Token::Logical(op);
    }

    if let Ok(op) = CompareOperator::from_symbol(word) {
        return Token::Compare(op);
    }

    if let Some(inner) = unquote(word) {
        return Token::Text(inner.to_string());
    }

    match word.parse::<f64>() {
        // inf / NaN 等拼写按标识符处理
        Ok(value) if value.is_finite() => Token::Number {
            value,
            text: word.to_string(),
        },
        _ => Token::Identifier(word.to_string()),
    }
}

fn unquote(word: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|quote| {
        if word.len() >= 2 && word.starts_with(quote) && word.ends_with(quote) {
            Some(&word[1..word.len() - 1])
        } else {
            None
        }
    })
}
