//! # passrs
//!
//! 多算法密码哈希管理库。
//!
//! 在一套统一的 hash / verify / 升级接口后面管理多种互不兼容的密码哈希格式，
//! 让应用可以同时验证新旧格式的凭据，并在用户登录时逐步迁移到更强的算法，
//! 而不需要一次性重新哈希整个凭据库。
//!
//! ## 功能特性
//!
//! - **哈希编解码**: 模块化（`$ident$...`）与 PHC 字符串的解析和格式化，
//!   hash64 / bcrypt64 / ab64 / base64 / hex 字母表
//! - **算法处理器**: md5-crypt、apr1、bcrypt、PBKDF2、Argon2、PHPass、
//!   NT 哈希、Django、Oracle 11g、Cisco PIX/ASA
//! - **注册表**: 确定性的 marker 歧义消解
//! - **Context**: 默认算法、弃用算法、按算法的成本下限，以及 `verify_and_update`
//! - **常量时间比较**: 摘要比较使用 `subtle`
//!
//! ## Features
//!
//! - `argon2` - 启用 Argon2 支持（默认启用）
//! - `bcrypt` - 启用 bcrypt 支持（默认启用）
//! - `full` - 启用所有功能
//!
//! ## 密码哈希示例
//!
//! ```rust
//! use passrs::{hash_password, verify_password};
//!
//! // 哈希密码
//! let hash = hash_password("my_secure_password").unwrap();
//!
//! // 验证密码
//! let is_valid = verify_password("my_secure_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## 迁移示例
//!
//! ```rust
//! use passrs::ContextConfig;
//!
//! let context = ContextConfig::new(["pbkdf2_sha256", "django_salted_sha1"])
//!     .with_deprecated("django_salted_sha1")
//!     .build()
//!     .unwrap();
//!
//! let stored = "sha1$abcde$f513c4466c7991d917d0cc026829387f6cbf9f94";
//! let (valid, updated) = context.verify_and_update("password", stored).unwrap();
//! assert!(valid);
//! // 调用方负责把新哈希写回存储
//! assert!(updated.is_some());
//! ```
//!
//! ## 日志
//!
//! 库通过 `tracing` 输出调试和警告事件，不会安装任何 subscriber。

pub mod codec;
pub mod context;
pub mod error;
pub mod handler;
pub mod random;
pub mod registry;

pub use error::{Error, Result};

// ============================================================================
// Context 相关导出
// ============================================================================

pub use context::{
    Context, ContextConfig, SchemeOverride, default_context, hash_password, verify_password,
};

// ============================================================================
// 处理器相关导出
// ============================================================================

pub use codec::{HashRecord, McfHash};
pub use handler::{BoundsMode, Handler, HashOptions, SchemeConfig, SchemePolicy, VerifyOptions};
pub use registry::Registry;

// ============================================================================
// 随机数与比较函数导出
// ============================================================================

pub use random::{constant_time_compare, generate_random_bytes};
