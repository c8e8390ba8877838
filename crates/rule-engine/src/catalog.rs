//! 属性目录
//!
//! 解析器只通过 [`AttributeCatalog::exists`] 校验标识符是否为已知属性，
//! 目录的管理（创建、列举）由外围服务负责，这里提供一个基于 DashMap 的内存实现。

use crate::error::{Result, RuleError};
use crate::operators::{CompareOperator, LogicalOperator};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rule_shared::AttributeSeed;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 属性目录协作方接口
#[cfg_attr(test, mockall::automock)]
pub trait AttributeCatalog: Send + Sync {
    /// 名称是否为已知属性
    fn exists(&self, name: &str) -> bool;
}

/// 属性类型
///
/// 当前解析器只校验属性是否存在，类型信息供外围服务展示和后续扩展使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Boolean,
}

impl FromStr for AttributeType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            _ => Err(RuleError::UnknownAttributeType(s.to_string())),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// 属性定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
}

/// 内存属性目录
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    attributes: Arc<DashMap<String, Attribute>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置中的初始属性列表创建
    pub fn from_seeds(seeds: &[AttributeSeed]) -> Result<Self> {
        let catalog = Self::new();
        for seed in seeds {
            catalog.create(&seed.name, seed.attr_type.parse()?)?;
        }
        info!("属性目录已初始化: {} 个属性", catalog.len());
        Ok(catalog)
    }

    /// 创建属性，名称必须唯一且能作为规则中的标识符出现
    pub fn create(&self, name: &str, attr_type: AttributeType) -> Result<Attribute> {
        if !is_valid_attribute_name(name) {
            return Err(RuleError::InvalidOperand(name.to_string()));
        }

        match self.attributes.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RuleError::AttributeExists(name.to_string())),
            Entry::Vacant(slot) => {
                let attribute = Attribute {
                    id: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    attr_type,
                };
                slot.insert(attribute.clone());
                debug!(attribute = %name, attr_type = %attr_type, "属性已创建");
                Ok(attribute)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Attribute> {
        self.attributes.get(name).map(|a| a.clone())
    }

    /// 按名称排序列出所有属性
    pub fn list(&self) -> Vec<Attribute> {
        let mut attributes: Vec<Attribute> =
            self.attributes.iter().map(|a| a.value().clone()).collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl AttributeCatalog for InMemoryCatalog {
    fn exists(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

/// 属性名不能与数值、操作符、引号或括号混淆
fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"'))
        && name.parse::<f64>().is_err()
        && CompareOperator::from_symbol(name).is_err()
        && LogicalOperator::from_symbol(name).is_err()
}
