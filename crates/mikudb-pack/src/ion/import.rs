//! Ion 符号表导入链
//!
//! 每一层只持有自己的符号，id 从 `parent.offset + parent.len()` 开始连续分配。
//! 查找先委托给父层；子层从不修改父层，已分配的 id 不会被复用或重排。

use super::constants::SYSTEM_SYMBOLS;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Import {
    parent: Option<Arc<Import>>,
    offset: usize,
    symbols: Vec<String>,
    by_text: HashMap<String, usize>,
}

impl Import {
    pub fn new(parent: Option<Arc<Import>>, symbols: Vec<String>) -> Self {
        let offset = parent.as_ref().map_or(1, |p| p.offset + p.len());
        let mut by_text = HashMap::with_capacity(symbols.len());
        for (i, text) in symbols.iter().enumerate() {
            by_text.entry(text.clone()).or_insert(offset + i);
        }
        Self {
            parent,
            offset,
            symbols,
            by_text,
        }
    }

    /// 系统符号表（id 1..=9）
    pub fn system() -> Self {
        Self::new(None, SYSTEM_SYMBOLS.iter().map(|s| s.to_string()).collect())
    }

    /// 挂在系统符号表下的空本地符号表
    pub fn local() -> Self {
        Self::new(Some(Arc::new(Self::system())), Vec::new())
    }

    pub fn child(parent: Arc<Import>, symbols: Vec<String>) -> Self {
        Self::new(Some(parent), symbols)
    }

    pub fn parent(&self) -> Option<&Arc<Import>> {
        self.parent.as_ref()
    }

    /// 本层第一个 id
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 本层符号个数
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// 本层符号，按 id 顺序
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// 整条链上最大的 id
    pub fn max_id(&self) -> usize {
        self.offset + self.symbols.len() - 1
    }

    pub fn get_id(&self, text: &str) -> Option<usize> {
        if let Some(id) = self.parent.as_ref().and_then(|p| p.get_id(text)) {
            return Some(id);
        }
        self.by_text.get(text).copied()
    }

    pub fn get_text(&self, id: usize) -> Option<&str> {
        if id < self.offset {
            return self.parent.as_ref().and_then(|p| p.get_text(id));
        }
        self.symbols.get(id - self.offset).map(String::as_str)
    }

    /// 返回符号的 id，链上不存在时追加到本层
    pub fn add(&mut self, text: &str) -> usize {
        if let Some(id) = self.get_id(text) {
            return id;
        }
        let id = self.offset + self.symbols.len();
        self.symbols.push(text.to_string());
        self.by_text.insert(text.to_string(), id);
        id
    }
}

impl Default for Import {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_ids() {
        let system = Import::system();
        assert_eq!(system.offset(), 1);
        assert_eq!(system.get_id("$ion"), Some(1));
        assert_eq!(system.get_id("symbols"), Some(7));
        assert_eq!(system.get_text(9), Some("$ion_shared_symbol_table"));
        assert_eq!(system.max_id(), 9);
        assert_eq!(system.get_text(0), None);
    }

    #[test]
    fn test_local_ids_start_after_system() {
        let mut local = Import::local();
        assert_eq!(local.offset(), 10);
        assert_eq!(local.add("foo"), 10);
        assert_eq!(local.add("bar"), 11);
        assert_eq!(local.add("foo"), 10);
        assert_eq!(local.add("name"), 4);
        assert_eq!(local.len(), 2);
        assert_eq!(local.get_text(11), Some("bar"));
        assert_eq!(local.get_text(3), Some("$ion_symbol_table"));
    }

    #[test]
    fn test_child_does_not_touch_parent() {
        let mut base = Import::local();
        base.add("a");
        let parent = Arc::new(base);
        let mut child = Import::child(parent.clone(), vec!["b".to_string()]);
        assert_eq!(child.offset(), 11);
        assert_eq!(child.get_id("a"), Some(10));
        assert_eq!(child.get_id("b"), Some(11));
        assert_eq!(child.add("c"), 12);
        assert_eq!(parent.len(), 1);
        assert_eq!(parent.get_id("c"), None);
    }
}
