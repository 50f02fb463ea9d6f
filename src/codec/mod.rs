//! 哈希字符串编解码模块
//!
//! 规范的哈希字符串形如 `<marker><参数><分隔符><salt><分隔符><摘要>`，
//! 例如 `$pbkdf2-sha256$29000$c2FsdA$...`。本模块提供：
//!
//! - [`HashRecord`]: 解码后的结构化记录
//! - [`McfHash`]: 与算法无关的模块化结构解析，只识别 marker 与字段
//! - [`Alphabet`]: 各算法使用的二进制到文本字母表
//!
//! 具体字段的含义由各个 [`Handler`](crate::handler::Handler) 决定，
//! 完整的 `decode` / `encode` 见 [`Context`](crate::context::Context)。
//!
//! ## 示例
//!
//! ```rust
//! use passrs::codec::McfHash;
//!
//! let mcf = McfHash::parse("$pbkdf2-sha256$1000$c2FsdA$abc").unwrap();
//! assert_eq!(mcf.ident(), "pbkdf2-sha256");
//! assert_eq!(mcf.marker(), "$pbkdf2-sha256$");
//! assert_eq!(mcf.fields(), ["1000", "c2FsdA", "abc"]);
//! ```

pub mod alphabet;

pub use alphabet::{Alphabet, AlphabetError};

use std::fmt;

use crate::error::{MalformedHashError, Result};

// ============================================================================
// 参数
// ============================================================================

/// 哈希参数值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// 整数参数，如 rounds、memory_cost
    Int(u64),
    /// 文本参数，如 variant
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(u64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// 有序的参数映射，保持插入顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    /// 创建空参数表
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入参数；同名参数原位替换
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// 链式插入
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_int(&self, name: &str) -> Option<u64> {
        match self.get(name) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ParamValue::Text(v)) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// HashRecord
// ============================================================================

/// 参数名：成本因子
pub const ROUNDS: &str = "rounds";
/// 参数名：算法变体
pub const VARIANT: &str = "variant";

/// 解码后的哈希记录
///
/// 每次调用时创建，用完即丢弃。未修改的记录重新编码后与原字符串一致，
/// 仅有文档化的规范化差异（例如 bcrypt 末字符的填充位被清零）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    /// 算法名称，如 `pbkdf2_sha256`
    pub scheme: String,
    /// 字符串中实际使用的 marker，如 `$2a$`
    pub ident: String,
    /// 成本与变体参数
    pub params: Params,
    /// salt 字节
    pub salt: Vec<u8>,
    /// 摘要字节
    pub checksum: Vec<u8>,
    /// 原始字符串
    pub raw: String,
}

impl HashRecord {
    /// 创建只含设置、不含摘要的记录
    pub fn new(scheme: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            ident: ident.into(),
            params: Params::new(),
            salt: Vec::new(),
            checksum: Vec::new(),
            raw: String::new(),
        }
    }

    /// 成本因子（如果算法有）
    pub fn rounds(&self) -> Option<u64> {
        self.params.get_int(ROUNDS)
    }

    /// 变体（如果算法有）
    pub fn variant(&self) -> Option<&str> {
        self.params.get_text(VARIANT)
    }
}

// ============================================================================
// 模块化结构解析
// ============================================================================

/// 与算法无关的模块化哈希字符串（`$ident$field$field...`）
///
/// 只做结构检查：非空、全部为可见 ASCII、`$` 开头、ident 非空且后面还有
/// 一个 `$` 和非空的剩余部分。ident 可以是任意不含 `$` 的可见字符
/// （如 `$P$`、`$NT$`），字段内容留给具体算法校验。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McfHash<'a> {
    ident: &'a str,
    fields: Vec<&'a str>,
}

impl<'a> McfHash<'a> {
    /// 解析模块化结构
    pub fn parse(hash: &'a str) -> Result<Self> {
        check_printable(hash)?;
        let rest = hash
            .strip_prefix('$')
            .ok_or(MalformedHashError::NotModular)?;
        let (ident, body) = rest.split_once('$').ok_or(MalformedHashError::NotModular)?;
        // 只有 marker 没有内容的字符串视为截断
        if ident.is_empty() || body.is_empty() {
            return Err(MalformedHashError::NotModular.into());
        }
        Ok(Self {
            ident,
            fields: body.split('$').collect(),
        })
    }

    /// 标识符，不含 `$`
    pub fn ident(&self) -> &'a str {
        self.ident
    }

    /// 带分隔符的 marker，如 `$1$`
    pub fn marker(&self) -> String {
        format!("${}$", self.ident)
    }

    pub fn fields(&self) -> &[&'a str] {
        &self.fields
    }

    /// 要求字段数量恰好为 `expected`
    pub fn expect_fields(&self, scheme: &str, expected: usize) -> Result<&[&'a str]> {
        if self.fields.len() != expected {
            return Err(MalformedHashError::FieldCount {
                scheme: scheme.to_string(),
                expected,
                found: self.fields.len(),
            }
            .into());
        }
        Ok(&self.fields)
    }

    /// 组装模块化字符串
    pub fn format(ident: &str, fields: &[&str]) -> String {
        let mut out = format!("${}", ident);
        for field in fields {
            out.push('$');
            out.push_str(field);
        }
        out
    }
}

/// 检查字符串非空且只包含可见 ASCII 字符
pub fn check_printable(hash: &str) -> Result<()> {
    if hash.is_empty() {
        return Err(MalformedHashError::Empty.into());
    }
    if !hash.bytes().all(|c| c.is_ascii_graphic()) {
        return Err(MalformedHashError::NotAscii.into());
    }
    Ok(())
}

// ============================================================================
// 字段工具
// ============================================================================

/// 解码一个字段，将字母表错误映射为带上下文的结构错误
pub fn decode_field(
    alphabet: Alphabet,
    scheme: &str,
    field: &'static str,
    text: &str,
) -> Result<Vec<u8>> {
    alphabet.decode(text).map_err(|e| {
        let err = match e {
            AlphabetError::InvalidCharacter(found) => MalformedHashError::InvalidCharacter {
                scheme: scheme.to_string(),
                field,
                found,
            },
            AlphabetError::InvalidLength(found) => MalformedHashError::InvalidLength {
                scheme: scheme.to_string(),
                field,
                found,
            },
        };
        err.into()
    })
}

/// 检查字段只包含字母表中的字符
pub fn check_field_chars(
    alphabet: Alphabet,
    scheme: &str,
    field: &'static str,
    text: &str,
) -> Result<()> {
    match alphabet.find_invalid(text) {
        Some(found) => Err(MalformedHashError::InvalidCharacter {
            scheme: scheme.to_string(),
            field,
            found,
        }
        .into()),
        None => Ok(()),
    }
}

/// 检查字段长度
pub fn check_field_len(
    scheme: &str,
    field: &'static str,
    text: &str,
    valid: impl Fn(usize) -> bool,
) -> Result<()> {
    if valid(text.len()) {
        Ok(())
    } else {
        Err(MalformedHashError::InvalidLength {
            scheme: scheme.to_string(),
            field,
            found: text.len(),
        }
        .into())
    }
}

/// 解析十进制成本参数
///
/// 只接受 ASCII 数字，不允许多余的前导零，并检查 `[min, max]` 范围。
pub fn parse_decimal(scheme: &str, text: &str, min: u64, max: u64) -> Result<u64> {
    let invalid = || MalformedHashError::InvalidCost {
        scheme: scheme.to_string(),
        value: text.to_string(),
    };
    if text.is_empty()
        || !text.bytes().all(|c| c.is_ascii_digit())
        || (text.len() > 1 && text.starts_with('0'))
    {
        return Err(invalid().into());
    }
    let value: u64 = text.parse().map_err(|_| invalid())?;
    if value < min || value > max {
        return Err(invalid().into());
    }
    Ok(value)
}
