//! 规则编译器
//!
//! 将规则字符串或序列化的规则编译成可执行的规则树，并预提取规则引用的属性。

use crate::error::{Result, RuleError};
use crate::models::{Rule, RuleNode};
use crate::parser::RuleParser;
use serde::Deserialize;
use std::collections::HashSet;

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// 原始规则
    pub rule: Rule,
    /// 规则中比较条件引用的所有属性
    pub required_fields: HashSet<String>,
    /// 编译版本号，规则每次被替换都会递增
    pub compile_version: u64,
}

impl CompiledRule {
    /// 获取规则 ID
    pub fn id(&self) -> &str {
        &self.rule.id
    }

    /// 获取规则文本
    pub fn source_text(&self) -> &str {
        &self.rule.source_text
    }

    /// 获取根节点
    pub fn root(&self) -> &RuleNode {
        &self.rule.root
    }
}

/// 规则编译器
pub struct RuleCompiler {
    parser: RuleParser,
    compile_version: u64,
}

impl RuleCompiler {
    pub fn new(parser: RuleParser) -> Self {
        Self {
            parser,
            compile_version: 0,
        }
    }

    pub fn parser(&self) -> &RuleParser {
        &self.parser
    }

    /// 从规则字符串编译
    pub fn compile(&mut self, text: &str) -> Result<CompiledRule> {
        let root = self.parser.parse(text)?;
        Ok(self.finish(Rule::new(text, root)))
    }

    /// 从 JSON 字符串编译规则
    ///
    /// 规则树每层对应一层 JSON 嵌套，serde_json 默认的 128 层上限低于
    /// 解析器允许的树深度，这里关闭该上限并按需扩展栈，深度由 `compile_rule` 校验。
    pub fn compile_from_json(&mut self, json: &str) -> Result<CompiledRule> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let rule = Rule::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;

        self.compile_rule(rule)
    }

    /// 编译未经过解析器的规则
    ///
    /// 先校验规则树结构，再要求规则文本重新解析后得到同一棵树。
    pub fn compile_rule(&mut self, rule: Rule) -> Result<CompiledRule> {
        self.parser.validate(&rule.root)?;

        if self.parser.parse(&rule.source_text)? != rule.root {
            return Err(RuleError::SourceMismatch(rule.source_text));
        }

        Ok(self.finish(rule))
    }

    /// 用新的规则树和文本替换已编译的规则
    pub fn recompile(&mut self, compiled: &mut CompiledRule, root: RuleNode, source_text: String) {
        compiled.required_fields = Self::extract_fields(&root);
        compiled.rule.replace(root, source_text);
        self.compile_version += 1;
        compiled.compile_version = self.compile_version;
    }

    fn finish(&mut self, rule: Rule) -> CompiledRule {
        let required_fields = Self::extract_fields(&rule.root);
        self.compile_version += 1;

        CompiledRule {
            rule,
            required_fields,
            compile_version: self.compile_version,
        }
    }

    fn extract_fields(root: &RuleNode) -> HashSet<String> {
        root.attributes().into_iter().collect()
    }
}
