//! 自定义函数注册表
//!
//! 进程级共享的读多写少状态：注册很少发生，求值时频繁读取，
//! 因此使用读写锁保护的 HashMap，并以可克隆句柄的形式显式注入到解析器和执行器中。

use crate::models::EvaluationContext;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 函数签名：接收完整的数据记录，返回一个值
pub type UserFunction = Arc<dyn Fn(&EvaluationContext) -> Value + Send + Sync>;

/// 函数注册表
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: Arc<RwLock<HashMap<String, UserFunction>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册函数，同名函数会被替换并返回旧实现
    pub fn register<F>(&self, name: impl Into<String>, func: F) -> Option<UserFunction>
    where
        F: Fn(&EvaluationContext) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(function = %name, "注册自定义函数");
        self.functions.write().insert(name, Arc::new(func))
    }

    /// 注销函数
    pub fn unregister(&self, name: &str) -> Option<UserFunction> {
        self.functions.write().remove(name)
    }

    /// 查找函数
    ///
    /// 返回克隆的句柄，调用时不持有锁，函数内部可以安全地再次访问注册表。
    pub fn lookup(&self, name: &str) -> Option<UserFunction> {
        self.functions.read().get(name).cloned()
    }

    /// 检查函数是否存在
    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// 所有已注册函数名，按字母排序
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
