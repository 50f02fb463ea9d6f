//! 统一错误类型模块
//!
//! 提供 passrs 库中所有操作的错误类型定义。
//!
//! 注意：密码不匹配不是错误，`verify` 返回 `Ok(false)`。

use std::fmt;

/// passrs 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// passrs 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 哈希字符串结构无效（分隔符数量错误、非法字符、字段被截断等）
    Malformed(MalformedHashError),

    /// 哈希字符串结构正确，但没有已注册的处理器能识别它
    UnknownScheme(String),

    /// 显式参数违反了算法的约束
    Param(ParamError),

    /// 构造 Context 时的配置冲突
    Config(ConfigError),

    /// 密码超出算法允许的长度
    PasswordSize {
        /// 算法名称
        scheme: String,
        /// 允许的最大字节数
        max: usize,
    },

    /// 加密原语错误
    Crypto(CryptoError),
}

impl Error {
    /// 创建一个结构错误
    pub fn malformed(scheme: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Malformed(MalformedHashError::Invalid {
            scheme: Some(scheme.into()),
            reason: reason.into(),
        })
    }

    /// 是否为哈希结构错误
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Malformed(_))
    }

    /// 是否为未知算法错误
    pub fn is_unknown_scheme(&self) -> bool {
        matches!(self, Error::UnknownScheme(_))
    }
}

/// 哈希字符串结构错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedHashError {
    /// 空字符串
    Empty,
    /// 包含非 ASCII 或空白字符
    NotAscii,
    /// 不符合 `$marker$...` 的模块化格式
    NotModular,
    /// 字段数量错误
    FieldCount {
        scheme: String,
        expected: usize,
        found: usize,
    },
    /// 字段中出现字母表之外的字符
    InvalidCharacter {
        scheme: String,
        field: &'static str,
        found: char,
    },
    /// 字段长度错误
    InvalidLength {
        scheme: String,
        field: &'static str,
        found: usize,
    },
    /// 成本参数无法解析或越界
    InvalidCost { scheme: String, value: String },
    /// 其他结构问题
    Invalid {
        scheme: Option<String>,
        reason: String,
    },
}

/// 参数相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// 数值参数超出算法允许的范围（严格模式）
    OutOfRange {
        scheme: String,
        param: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    /// 显式提供的 salt 不合法
    InvalidSalt { scheme: String, reason: String },
    /// 算法不支持该变体
    UnsupportedVariant { scheme: String, variant: String },
    /// 算法没有该参数（例如固定成本算法的 rounds）
    NotSupported { scheme: String, param: &'static str },
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 没有启用任何算法
    NoSchemes,
    /// 未知的算法名称
    UnknownScheme(String),
    /// 重复注册同一算法
    DuplicateScheme(String),
    /// 默认算法未启用
    DefaultNotEnabled(String),
    /// 默认算法被标记为弃用
    DefaultDeprecated(String),
    /// 弃用或覆盖配置引用了未启用的算法
    NotEnabled { key: &'static str, scheme: String },
    /// 无效的配置值
    InvalidValue { key: String, message: String },
    /// 配置文件解析失败
    Parse(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 摘要原语拒绝了输入
    PrimitiveFailed(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed(e) => write!(f, "Malformed hash: {}", e),
            Error::UnknownScheme(s) => write!(f, "Unknown scheme: {}", s),
            Error::Param(e) => write!(f, "Parameter error: {}", e),
            Error::Config(e) => write!(f, "Unsupported config: {}", e),
            Error::PasswordSize { scheme, max } => {
                write!(f, "Password too long: {} allows at most {} bytes", scheme, max)
            }
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
        }
    }
}

impl fmt::Display for MalformedHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedHashError::Empty => write!(f, "empty hash"),
            MalformedHashError::NotAscii => {
                write!(f, "hash contains non-ascii or whitespace characters")
            }
            MalformedHashError::NotModular => write!(f, "not a modular crypt string"),
            MalformedHashError::FieldCount {
                scheme,
                expected,
                found,
            } => write!(
                f,
                "{}: expected {} fields, found {}",
                scheme, expected, found
            ),
            MalformedHashError::InvalidCharacter {
                scheme,
                field,
                found,
            } => write!(f, "{}: invalid character {:?} in {}", scheme, found, field),
            MalformedHashError::InvalidLength {
                scheme,
                field,
                found,
            } => write!(f, "{}: invalid {} length {}", scheme, field, found),
            MalformedHashError::InvalidCost { scheme, value } => {
                write!(f, "{}: invalid cost parameter {:?}", scheme, value)
            }
            MalformedHashError::Invalid {
                scheme: Some(scheme),
                reason,
            } => write!(f, "{}: {}", scheme, reason),
            MalformedHashError::Invalid {
                scheme: None,
                reason,
            } => write!(f, "{}", reason),
        }
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::OutOfRange {
                scheme,
                param,
                value,
                min,
                max,
            } => write!(
                f,
                "{}: {} = {} outside allowed range {}..={}",
                scheme, param, value, min, max
            ),
            ParamError::InvalidSalt { scheme, reason } => {
                write!(f, "{}: invalid salt: {}", scheme, reason)
            }
            ParamError::UnsupportedVariant { scheme, variant } => {
                write!(f, "{}: unsupported variant {:?}", scheme, variant)
            }
            ParamError::NotSupported { scheme, param } => {
                write!(f, "{}: parameter '{}' is not supported", scheme, param)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoSchemes => write!(f, "no schemes enabled"),
            ConfigError::UnknownScheme(s) => write!(f, "unknown scheme '{}'", s),
            ConfigError::DuplicateScheme(s) => write!(f, "scheme '{}' registered twice", s),
            ConfigError::DefaultNotEnabled(s) => {
                write!(f, "default scheme '{}' is not enabled", s)
            }
            ConfigError::DefaultDeprecated(s) => {
                write!(f, "default scheme '{}' is deprecated", s)
            }
            ConfigError::NotEnabled { key, scheme } => {
                write!(f, "'{}' references scheme '{}' which is not enabled", key, scheme)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
            ConfigError::Parse(msg) => write!(f, "failed to parse configuration: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::PrimitiveFailed(msg) => write!(f, "digest primitive failed: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Malformed(e) => Some(e),
            Error::Param(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for MalformedHashError {}
impl std::error::Error for ParamError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<MalformedHashError> for Error {
    fn from(err: MalformedHashError) -> Self {
        Error::Malformed(err)
    }
}

impl From<ParamError> for Error {
    fn from(err: ParamError) -> Self {
        Error::Param(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}
