//! 单元测试共用的属性目录与解析器

use crate::catalog::{AttributeType, InMemoryCatalog};
use crate::parser::RuleParser;
use std::sync::Arc;

pub fn employee_catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    for (name, attr_type) in [
        ("age", AttributeType::Number),
        ("department", AttributeType::String),
        ("salary", AttributeType::Number),
        ("experience", AttributeType::Number),
    ] {
        catalog
            .create(name, attr_type)
            .expect("测试属性应当可以创建");
    }
    catalog
}

pub fn employee_parser() -> RuleParser {
    RuleParser::new(Arc::new(employee_catalog()))
}
