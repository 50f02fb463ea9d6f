//! 算法处理器模块
//!
//! 每个 [`Handler`] 绑定一个算法，负责参数校验、salt 生成、摘要计算
//! 以及哈希字符串的解析和格式化。处理器不保存可变状态，可以在线程间共享。
//!
//! ## 成本参数
//!
//! 不同算法的成本参数语义不同：
//!
//! - **线性** ([`RoundsCost::Linear`]): rounds 直接表示迭代次数，范围很宽
//!   （如 PBKDF2 的 1 到 2^32-1）
//! - **指数** ([`RoundsCost::Log2`]): rounds 表示 2 的幂，范围很窄
//!   （如 bcrypt 的 4 到 31）
//!
//! 每个处理器只检查自己的范围，范围之间不共享。
//!
//! ## 支持的算法
//!
//! | 名称 | marker |
//! |------|--------|
//! | `md5_crypt` | `$1$` |
//! | `apr_md5_crypt` | `$apr1$` |
//! | `bcrypt` | `$2a$` `$2b$` `$2y$`，`$2$` 只解析（需启用 `bcrypt` feature） |
//! | `pbkdf2_sha1` / `pbkdf2_sha256` / `pbkdf2_sha512` | `$pbkdf2$` 等 |
//! | `argon2` | `$argon2i$` `$argon2d$` `$argon2id$`（需启用 `argon2` feature） |
//! | `phpass` | `$P$` `$H$` |
//! | `nthash` | `$3$$` `$NT$` |
//! | `django_salted_sha1` / `django_salted_md5` | `sha1$` / `md5$` |
//! | `django_disabled` | `!`（整个字符串） |
//! | `oracle11` | `S:` |
//! | `cisco_pix` / `cisco_asa` | 无 marker，16 个 hash64 字符 |

#[cfg(feature = "argon2")]
mod argon2;
#[cfg(feature = "bcrypt")]
mod bcrypt;
mod cisco;
mod django;
mod md5_crypt;
mod nthash;
mod oracle;
mod pbkdf2;
mod phpass;

#[cfg(feature = "argon2")]
pub use self::argon2::Argon2Handler;
#[cfg(feature = "bcrypt")]
pub use self::bcrypt::BcryptHandler;
pub use self::cisco::CiscoHandler;
pub use self::django::{DjangoDisabled, DjangoSaltedHandler};
pub use self::md5_crypt::Md5CryptHandler;
pub use self::nthash::NtHashHandler;
pub use self::oracle::Oracle11Handler;
pub use self::pbkdf2::Pbkdf2Handler;
pub use self::phpass::PhpassHandler;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::HashRecord;
use crate::error::{ParamError, Result};
use crate::random::{constant_time_compare, generate_random_bytes};

// ============================================================================
// 策略类型
// ============================================================================

/// 成本参数的缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundsCost {
    /// rounds 即迭代次数
    Linear,
    /// 迭代次数为 2^rounds
    Log2,
}

/// 单个算法的 rounds 策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundsPolicy {
    /// 缩放方式
    pub cost: RoundsCost,
    /// 算法本身允许的最小值
    pub hard_min: u32,
    /// 算法本身允许的最大值
    pub hard_max: u32,
    /// 策略最小值，低于它的哈希需要升级
    pub min: u32,
    /// 策略最大值
    pub max: u32,
    /// 新哈希使用的默认值
    pub default: u32,
}

impl RoundsPolicy {
    /// 以算法的完整范围创建策略
    pub const fn new(cost: RoundsCost, hard_min: u32, hard_max: u32, default: u32) -> Self {
        Self {
            cost,
            hard_min,
            hard_max,
            min: hard_min,
            max: hard_max,
            default,
        }
    }

    /// 检查 `hard_min <= min <= default <= max <= hard_max`
    pub fn is_consistent(&self) -> bool {
        self.hard_min <= self.min
            && self.min <= self.default
            && self.default <= self.max
            && self.max <= self.hard_max
    }

    /// rounds 对应的实际迭代次数
    pub fn iterations(&self, rounds: u32) -> u64 {
        match self.cost {
            RoundsCost::Linear => u64::from(rounds),
            RoundsCost::Log2 => 1u64 << rounds.min(63),
        }
    }
}

/// 单个算法不可变的参数配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeConfig {
    /// rounds 策略；固定成本的算法为 `None`
    pub rounds: Option<RoundsPolicy>,
    /// 新生成 salt 的长度
    pub salt_size: usize,
    /// 可接受的最小 salt 长度
    pub min_salt_size: usize,
    /// 可接受的最大 salt 长度
    pub max_salt_size: usize,
    /// 支持的变体
    pub variants: &'static [&'static str],
    /// 新哈希使用的变体，其他变体在 `needs_update` 中被标记
    pub default_variant: Option<&'static str>,
    /// 内存成本（KiB），仅 argon2
    pub memory_cost: Option<u32>,
    /// 并行度，仅 argon2
    pub parallelism: Option<u32>,
}

impl SchemeConfig {
    /// 固定成本、固定 salt 长度的配置
    pub const fn fixed(salt_size: usize) -> Self {
        Self {
            rounds: None,
            salt_size,
            min_salt_size: salt_size,
            max_salt_size: salt_size,
            variants: &[],
            default_variant: None,
            memory_cost: None,
            parallelism: None,
        }
    }

    /// 设置 rounds 策略
    pub const fn with_rounds(mut self, rounds: RoundsPolicy) -> Self {
        self.rounds = Some(rounds);
        self
    }

    /// 设置可接受的 salt 长度范围
    pub const fn with_salt_range(mut self, min: usize, max: usize) -> Self {
        self.min_salt_size = min;
        self.max_salt_size = max;
        self
    }

    /// 设置支持的变体和默认变体
    pub const fn with_variants(
        mut self,
        variants: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        self.variants = variants;
        self.default_variant = Some(default);
        self
    }
}

/// 超出 rounds 范围时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsMode {
    /// 拒绝并返回 [`ParamError::OutOfRange`]
    #[default]
    Strict,
    /// 截断到范围内并记录警告
    Clamp,
}

/// Context 为单个算法持有的策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemePolicy {
    /// 应用覆盖之后的参数
    pub config: SchemeConfig,
    /// 是否已弃用（仍可验证，但总是需要升级）
    pub deprecated: bool,
}

// ============================================================================
// 调用选项
// ============================================================================

/// `hash` 的显式选项
///
/// 所有字段都是可选的，缺省值来自当前策略。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashOptions {
    /// 使用指定算法而不是默认算法
    pub scheme: Option<String>,
    /// 指定 rounds
    pub rounds: Option<u32>,
    /// 指定 salt（用于可重现的测试）
    pub salt: Option<Vec<u8>>,
    /// 指定变体，如 bcrypt 的 `2a`
    pub variant: Option<String>,
    /// 用户名，作为 Cisco 等算法的 salt
    pub user: Option<String>,
}

impl HashOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = Some(rounds);
        self
    }

    pub fn with_salt(mut self, salt: impl AsRef<[u8]>) -> Self {
        self.salt = Some(salt.as_ref().to_vec());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// `verify` 的显式选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// 用户名，作为 Cisco 等算法的 salt
    pub user: Option<String>,
}

impl VerifyOptions {
    pub fn with_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }
}

/// 摘要计算的目的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Hash,
    Verify,
}

/// 参与摘要计算的秘密输入
#[derive(Debug, Clone, Copy)]
pub struct Secret<'a> {
    pub password: &'a [u8],
    pub user: Option<&'a str>,
    pub purpose: Purpose,
}

// ============================================================================
// Handler trait
// ============================================================================

/// 单个算法的能力接口
///
/// 实现者只需提供解析、格式化、设置生成和摘要计算；`hash`、`verify`
/// 和 `needs_update` 的默认实现负责串联流程和常量时间比较。
pub trait Handler: fmt::Debug + Send + Sync {
    /// 算法名称，在一个 Registry 中唯一
    fn name(&self) -> &'static str;

    /// 字面 marker，用于快速识别和歧义消解
    fn markers(&self) -> &'static [&'static str];

    /// 算法自身的默认配置
    fn config(&self) -> &SchemeConfig;

    /// 快速检查字符串是否属于该算法，不解析其余部分，对任意输入都不会 panic
    fn identify(&self, hash: &str) -> bool {
        self.markers().iter().any(|m| hash.starts_with(m))
    }

    /// 解析哈希字符串
    fn parse(&self, hash: &str) -> Result<HashRecord>;

    /// 将记录格式化为哈希字符串
    fn format(&self, record: &HashRecord) -> Result<String>;

    /// 根据选项和策略生成不含摘要的记录
    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord>;

    /// 使用记录中的参数计算摘要
    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>>;

    /// 生成指定长度的随机 salt
    fn generate_salt(&self, size: usize) -> Result<Vec<u8>> {
        generate_random_bytes(size)
    }

    /// 校验显式提供的 salt
    fn check_salt(&self, salt: &[u8], config: &SchemeConfig) -> Result<()> {
        if salt.len() < config.min_salt_size || salt.len() > config.max_salt_size {
            return Err(ParamError::InvalidSalt {
                scheme: self.name().to_string(),
                reason: format!(
                    "salt must be {}..={} bytes, got {}",
                    config.min_salt_size,
                    config.max_salt_size,
                    salt.len()
                ),
            }
            .into());
        }
        Ok(())
    }

    /// 使用显式 salt 或生成新的 salt
    fn resolve_salt(&self, requested: Option<&[u8]>, config: &SchemeConfig) -> Result<Vec<u8>> {
        match requested {
            Some(salt) => {
                self.check_salt(salt, config)?;
                Ok(salt.to_vec())
            }
            None => self.generate_salt(config.salt_size),
        }
    }

    /// 哈希密码
    fn hash(
        &self,
        password: &[u8],
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<String> {
        let mut record = self.settings(options, config, mode)?;
        let secret = Secret {
            password,
            user: options.user.as_deref(),
            purpose: Purpose::Hash,
        };
        record.checksum = self.checksum(&secret, &record)?;
        self.format(&record)
    }

    /// 验证已解析的记录，摘要比较为常量时间
    fn verify_record(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<bool> {
        let expected = self.checksum(secret, record)?;
        Ok(constant_time_compare(&expected, &record.checksum))
    }

    /// 验证密码；不匹配返回 `Ok(false)`
    fn verify(&self, password: &[u8], hash: &str, options: &VerifyOptions) -> Result<bool> {
        let record = self.parse(hash)?;
        let secret = Secret {
            password,
            user: options.user.as_deref(),
            purpose: Purpose::Verify,
        };
        self.verify_record(&secret, &record)
    }

    /// 记录是否需要按当前策略重新哈希
    fn needs_update(&self, record: &HashRecord, policy: &SchemePolicy) -> bool {
        policy_needs_update(record, policy)
    }

    /// 校验覆盖之后的配置是否仍被算法接受
    ///
    /// 通用的 rounds 与 salt 范围由 Context 检查，这里只处理算法特有的约束。
    fn check_config(&self, _config: &SchemeConfig) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// 共享工具
// ============================================================================

/// 确定本次使用的 rounds
///
/// 缺省时使用策略默认值；超出 `[min, max]` 时按 `mode` 拒绝或截断。
pub fn resolve_rounds(
    scheme: &str,
    requested: Option<u32>,
    config: &SchemeConfig,
    mode: BoundsMode,
) -> Result<Option<u32>> {
    let Some(policy) = &config.rounds else {
        if requested.is_some() {
            return Err(ParamError::NotSupported {
                scheme: scheme.to_string(),
                param: "rounds",
            }
            .into());
        }
        return Ok(None);
    };
    let value = requested.unwrap_or(policy.default);
    if (policy.min..=policy.max).contains(&value) {
        return Ok(Some(value));
    }
    match mode {
        BoundsMode::Strict => Err(ParamError::OutOfRange {
            scheme: scheme.to_string(),
            param: "rounds",
            value: u64::from(value),
            min: u64::from(policy.min),
            max: u64::from(policy.max),
        }
        .into()),
        BoundsMode::Clamp => {
            let clamped = value.clamp(policy.min, policy.max);
            warn!(
                scheme,
                requested = value,
                clamped,
                "rounds outside policy range, clamping"
            );
            Ok(Some(clamped))
        }
    }
}

/// 通用的升级判断：弃用、rounds 越界或变体不是默认变体
pub fn policy_needs_update(record: &HashRecord, policy: &SchemePolicy) -> bool {
    if policy.deprecated {
        return true;
    }
    if let (Some(rounds), Some(value)) = (&policy.config.rounds, record.rounds())
        && (value < u64::from(rounds.min) || value > u64::from(rounds.max))
    {
        return true;
    }
    if let (Some(mandated), Some(variant)) = (policy.config.default_variant, record.variant())
        && variant != mandated
    {
        return true;
    }
    false
}

/// 确定本次使用的变体
pub fn resolve_variant(
    scheme: &str,
    requested: Option<&str>,
    config: &SchemeConfig,
) -> Result<Option<&'static str>> {
    match requested {
        None => Ok(config.default_variant),
        Some(v) => config
            .variants
            .iter()
            .find(|known| **known == v)
            .copied()
            .map(Some)
            .ok_or_else(|| {
                ParamError::UnsupportedVariant {
                    scheme: scheme.to_string(),
                    variant: v.to_string(),
                }
                .into()
            }),
    }
}

// ============================================================================
// 内置算法目录
// ============================================================================

/// 所有内置算法名称（取决于启用的 feature）
pub fn builtin_schemes() -> Vec<&'static str> {
    let mut names = vec!["md5_crypt", "apr_md5_crypt"];
    #[cfg(feature = "bcrypt")]
    names.push("bcrypt");
    names.extend(["pbkdf2_sha1", "pbkdf2_sha256", "pbkdf2_sha512"]);
    #[cfg(feature = "argon2")]
    names.push("argon2");
    names.extend([
        "phpass",
        "nthash",
        "django_salted_sha1",
        "django_salted_md5",
        "django_disabled",
        "oracle11",
        "cisco_pix",
        "cisco_asa",
    ]);
    names
}

/// 按名称创建内置处理器
pub fn builtin(name: &str) -> Option<Box<dyn Handler>> {
    let handler: Box<dyn Handler> = match name {
        "md5_crypt" => Box::new(Md5CryptHandler::md5()),
        "apr_md5_crypt" => Box::new(Md5CryptHandler::apr()),
        #[cfg(feature = "bcrypt")]
        "bcrypt" => Box::new(BcryptHandler::new()),
        "pbkdf2_sha1" => Box::new(Pbkdf2Handler::sha1()),
        "pbkdf2_sha256" => Box::new(Pbkdf2Handler::sha256()),
        "pbkdf2_sha512" => Box::new(Pbkdf2Handler::sha512()),
        #[cfg(feature = "argon2")]
        "argon2" => Box::new(Argon2Handler::new()),
        "phpass" => Box::new(PhpassHandler::new()),
        "nthash" => Box::new(NtHashHandler::new()),
        "django_salted_sha1" => Box::new(DjangoSaltedHandler::sha1()),
        "django_salted_md5" => Box::new(DjangoSaltedHandler::md5()),
        "django_disabled" => Box::new(DjangoDisabled::new()),
        "oracle11" => Box::new(Oracle11Handler::new()),
        "cisco_pix" => Box::new(CiscoHandler::pix()),
        "cisco_asa" => Box::new(CiscoHandler::asa()),
        _ => return None,
    };
    Some(handler)
}
