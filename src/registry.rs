//! 处理器注册表
//!
//! 按注册顺序保存处理器，并在多个处理器都能识别同一字符串时给出确定的顺序：
//!
//! 1. 匹配到的字面 marker 越长越优先
//! 2. 长度相同时按注册顺序
//!
//! 没有 marker 的处理器（如 Cisco）特异度为 0，总是排在有 marker 的候选之后。

use std::collections::HashMap;

use tracing::debug;

use crate::codec::{HashRecord, McfHash};
use crate::error::{ConfigError, Error, Result};
use crate::handler::{self, Handler};

/// 算法名称到处理器的映射
#[derive(Debug, Default)]
pub struct Registry {
    handlers: Vec<Box<dyn Handler>>,
    index: HashMap<&'static str, usize>,
}

impl Registry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 按名称注册一组内置处理器
    pub fn with_builtins<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            let name = name.as_ref();
            let handler =
                handler::builtin(name).ok_or_else(|| ConfigError::UnknownScheme(name.to_string()))?;
            registry.register(handler)?;
        }
        Ok(registry)
    }

    /// 注册处理器，名称重复时返回错误
    pub fn register(&mut self, handler: Box<dyn Handler>) -> Result<()> {
        let name = handler.name();
        if self.index.contains_key(name) {
            return Err(ConfigError::DuplicateScheme(name.to_string()).into());
        }
        self.index.insert(name, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// 按名称查找处理器
    pub fn get(&self, name: &str) -> Result<&dyn Handler> {
        self.index
            .get(name)
            .map(|&i| self.handlers[i].as_ref())
            .ok_or_else(|| Error::UnknownScheme(name.to_string()))
    }

    /// 是否注册了该算法
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 所有能识别该字符串的处理器，按特异度降序、注册顺序升序排列
    pub fn find_by_marker(&self, hash: &str) -> Vec<&dyn Handler> {
        let mut candidates: Vec<(usize, &dyn Handler)> = self
            .handlers
            .iter()
            .filter(|h| h.identify(hash))
            .map(|h| (specificity(h.as_ref(), hash), h.as_ref()))
            .collect();
        // 稳定排序，特异度相同的保持注册顺序
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        candidates.into_iter().map(|(_, h)| h).collect()
    }

    /// 第一个候选处理器
    pub fn identify(&self, hash: &str) -> Option<&dyn Handler> {
        let found = self.find_by_marker(hash).into_iter().next();
        if let Some(handler) = found {
            debug!(scheme = handler.name(), "identified hash");
        }
        found
    }

    /// 使用第一个候选处理器解码
    ///
    /// 没有候选时，结构合法的模块化字符串返回 [`Error::UnknownScheme`]，
    /// 其他输入返回 [`Error::Malformed`]。
    pub fn decode(&self, hash: &str) -> Result<HashRecord> {
        match self.identify(hash) {
            Some(handler) => handler.parse(hash),
            None => Err(unidentified(hash)),
        }
    }

    /// 注册顺序的算法名称
    pub fn schemes(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// 注册顺序的处理器
    pub fn handlers(&self) -> impl Iterator<Item = &dyn Handler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// 处理器匹配到的最长 marker 长度
fn specificity(handler: &dyn Handler, hash: &str) -> usize {
    handler
        .markers()
        .iter()
        .filter(|m| hash.starts_with(**m))
        .map(|m| m.len())
        .max()
        .unwrap_or(0)
}

/// 没有处理器认领时的错误
pub(crate) fn unidentified(hash: &str) -> Error {
    match McfHash::parse(hash) {
        Ok(mcf) => Error::UnknownScheme(mcf.marker()),
        Err(err) => err,
    }
}
