//! 多算法 Context
//!
//! [`Context`] 持有一组处理器和一份策略，负责：
//!
//! - 使用默认算法哈希新密码
//! - 识别任意已启用算法的哈希并验证
//! - 判断旧哈希是否需要升级，并在验证成功时顺便给出新哈希
//!
//! Context 构造后不可变，可以通过 `Arc` 在线程间共享。策略变化时重建整个 Context。
//!
//! ## 示例
//!
//! ```rust
//! use passrs::context::{Context, ContextConfig};
//!
//! let context = ContextConfig::new(["pbkdf2_sha256", "md5_crypt"])
//!     .with_deprecated("md5_crypt")
//!     .with_min_rounds("pbkdf2_sha256", 1000)
//!     .build()
//!     .unwrap();
//!
//! // 旧系统中的 md5-crypt 哈希
//! let legacy = "$1$test$pi/xDtU5WFVRqYS6BMU8X/";
//! let (valid, updated) = context.verify_and_update("test", legacy).unwrap();
//! assert!(valid);
//! assert!(updated.unwrap().starts_with("$pbkdf2-sha256$"));
//! ```

pub mod config;

pub use config::{ContextConfig, SchemeOverride};

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::codec::HashRecord;
use crate::error::{ConfigError, Result};
use crate::handler::{BoundsMode, Handler, HashOptions, Purpose, SchemePolicy, Secret, VerifyOptions};
use crate::registry::{self, Registry};

// dummy_verify 使用的固定密码
const DUMMY_SECRET: &[u8] = b"too many secrets";

/// 多算法哈希上下文
#[derive(Debug)]
pub struct Context {
    registry: Registry,
    policies: HashMap<&'static str, SchemePolicy>,
    default: &'static str,
    bounds: BoundsMode,
    config: ContextConfig,
    dummy: OnceLock<String>,
}

impl Context {
    /// 校验配置并创建 Context
    ///
    /// 所有配置错误都在这里返回，构造成功后不会再出现配置相关的失败。
    ///
    /// # Errors
    ///
    /// - 没有启用算法、算法未知或重复
    /// - 默认算法未启用或已弃用
    /// - 弃用集合或覆盖引用了未启用的算法
    /// - 覆盖值超出算法允许的范围
    pub fn new(config: ContextConfig) -> Result<Self> {
        if config.schemes.is_empty() {
            return Err(ConfigError::NoSchemes.into());
        }
        let registry = Registry::with_builtins(&config.schemes)?;

        let default_name = config.effective_default().unwrap_or_default();
        let default = registry
            .get(default_name)
            .map_err(|_| ConfigError::DefaultNotEnabled(default_name.to_string()))?
            .name();
        if config.deprecated.contains(default) {
            return Err(ConfigError::DefaultDeprecated(default.to_string()).into());
        }
        for scheme in &config.deprecated {
            if !registry.contains(scheme) {
                return Err(ConfigError::NotEnabled {
                    key: "deprecated",
                    scheme: scheme.clone(),
                }
                .into());
            }
        }
        for scheme in config.overrides.keys() {
            if !registry.contains(scheme) {
                return Err(ConfigError::NotEnabled {
                    key: "overrides",
                    scheme: scheme.clone(),
                }
                .into());
            }
        }

        let mut policies = HashMap::with_capacity(registry.len());
        for handler in registry.handlers() {
            let name = handler.name();
            let scheme_config = match config.overrides.get(name) {
                Some(value) => value.apply(name, handler.config())?,
                None => handler.config().clone(),
            };
            handler.check_config(&scheme_config)?;
            policies.insert(
                name,
                SchemePolicy {
                    config: scheme_config,
                    deprecated: config.deprecated.contains(name),
                },
            );
        }

        debug!(
            schemes = ?registry.schemes(),
            default,
            deprecated = ?config.deprecated,
            "password context initialized"
        );

        Ok(Self {
            registry,
            policies,
            default,
            bounds: config.bounds,
            config,
            dummy: OnceLock::new(),
        })
    }

    /// 创建空配置，用于链式构建
    ///
    /// # Example
    ///
    /// ```rust
    /// use passrs::context::Context;
    ///
    /// let context = Context::builder()
    ///     .with_scheme("pbkdf2_sha256")
    ///     .with_scheme("django_salted_sha1")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(context.default_scheme(), "pbkdf2_sha256");
    /// ```
    pub fn builder() -> ContextConfig {
        ContextConfig::default()
    }

    // ========================================================================
    // 哈希
    // ========================================================================

    /// 使用默认算法哈希密码
    pub fn hash(&self, password: impl AsRef<[u8]>) -> Result<String> {
        self.hash_with(password, &HashOptions::new())
    }

    /// 使用显式选项哈希密码
    ///
    /// `options.scheme` 可以选择任意已启用的算法（包括弃用的），
    /// 其余缺省参数来自该算法的策略。
    pub fn hash_with(&self, password: impl AsRef<[u8]>, options: &HashOptions) -> Result<String> {
        let name = options.scheme.as_deref().unwrap_or(self.default);
        let handler = self.registry.get(name)?;
        let policy = self.policy_for(handler)?;
        debug!(scheme = handler.name(), "hashing password");
        handler.hash(password.as_ref(), options, &policy.config, self.bounds)
    }

    // ========================================================================
    // 验证
    // ========================================================================

    /// 验证密码
    ///
    /// 密码不匹配返回 `Ok(false)`；无法识别的哈希返回
    /// [`Error::UnknownScheme`](crate::Error::UnknownScheme) 或
    /// [`Error::Malformed`](crate::Error::Malformed)。
    pub fn verify(&self, password: impl AsRef<[u8]>, hash: &str) -> Result<bool> {
        self.verify_with(password, hash, &VerifyOptions::default())
    }

    /// 带用户名等选项的验证
    pub fn verify_with(
        &self,
        password: impl AsRef<[u8]>,
        hash: &str,
        options: &VerifyOptions,
    ) -> Result<bool> {
        let handler = self.identify_handler(hash)?;
        let record = handler.parse(hash)?;
        self.check_record(handler, password.as_ref(), &record, options)
    }

    /// 验证密码，并在哈希需要升级时返回新哈希
    ///
    /// 返回 `(是否匹配, 新哈希)`。只有密码匹配且旧哈希不符合当前策略时才有新哈希，
    /// 调用方负责把它写回存储。
    pub fn verify_and_update(
        &self,
        password: impl AsRef<[u8]>,
        hash: &str,
    ) -> Result<(bool, Option<String>)> {
        self.verify_and_update_with(password, hash, &VerifyOptions::default())
    }

    /// 带用户名等选项的 [`Context::verify_and_update`]
    pub fn verify_and_update_with(
        &self,
        password: impl AsRef<[u8]>,
        hash: &str,
        options: &VerifyOptions,
    ) -> Result<(bool, Option<String>)> {
        let password = password.as_ref();
        let handler = self.identify_handler(hash)?;
        let record = handler.parse(hash)?;
        if !self.check_record(handler, password, &record, options)? {
            return Ok((false, None));
        }
        if !handler.needs_update(&record, self.policy_for(handler)?) {
            return Ok((true, None));
        }

        debug!(from = handler.name(), to = self.default, "upgrading password hash");
        let mut hash_options = HashOptions::new();
        hash_options.user = options.user.clone();
        let updated = self.hash_with(password, &hash_options)?;
        Ok((true, Some(updated)))
    }

    /// 以默认算法的成本执行一次必然失败的验证
    ///
    /// 用于用户不存在的分支，使其耗时与正常验证相近。总是返回 `Ok(false)`。
    pub fn dummy_verify(&self, password: impl AsRef<[u8]>) -> Result<bool> {
        let dummy = match self.dummy.get() {
            Some(hash) => hash,
            None => {
                let hash = self.hash(DUMMY_SECRET)?;
                self.dummy.get_or_init(|| hash)
            }
        };
        self.verify(password, dummy)?;
        Ok(false)
    }

    // ========================================================================
    // 识别与升级
    // ========================================================================

    /// 识别哈希所属的算法名称，不解析其余部分
    pub fn identify(&self, hash: &str) -> Option<&'static str> {
        self.registry.identify(hash).map(|h| h.name())
    }

    /// 哈希是否需要按当前策略重新生成
    pub fn needs_update(&self, hash: &str) -> Result<bool> {
        let handler = self.identify_handler(hash)?;
        let record = handler.parse(hash)?;
        Ok(handler.needs_update(&record, self.policy_for(handler)?))
    }

    /// 解码为结构化记录
    pub fn decode(&self, hash: &str) -> Result<HashRecord> {
        self.registry.decode(hash)
    }

    /// 将记录重新编码为哈希字符串
    pub fn encode(&self, record: &HashRecord) -> Result<String> {
        self.registry.get(&record.scheme)?.format(record)
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 按名称获取处理器
    pub fn handler(&self, name: &str) -> Result<&dyn Handler> {
        self.registry.get(name)
    }

    /// 启用的算法，按识别优先级排列
    pub fn schemes(&self) -> Vec<&'static str> {
        self.registry.schemes()
    }

    /// 默认算法
    pub fn default_scheme(&self) -> &'static str {
        self.default
    }

    /// 算法是否已弃用
    pub fn is_deprecated(&self, name: &str) -> bool {
        self.policies.get(name).is_some_and(|p| p.deprecated)
    }

    /// 算法当前生效的策略
    pub fn policy(&self, name: &str) -> Option<&SchemePolicy> {
        self.policies.get(name)
    }

    /// 构造时使用的配置
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    // ========================================================================
    // 内部工具
    // ========================================================================

    fn identify_handler(&self, hash: &str) -> Result<&dyn Handler> {
        self.registry
            .identify(hash)
            .ok_or_else(|| registry::unidentified(hash))
    }

    fn policy_for(&self, handler: &dyn Handler) -> Result<&SchemePolicy> {
        self.policies
            .get(handler.name())
            .ok_or_else(|| ConfigError::UnknownScheme(handler.name().to_string()).into())
    }

    fn check_record(
        &self,
        handler: &dyn Handler,
        password: &[u8],
        record: &HashRecord,
        options: &VerifyOptions,
    ) -> Result<bool> {
        let secret = Secret {
            password,
            user: options.user.as_deref(),
            purpose: Purpose::Verify,
        };
        let valid = handler.verify_record(&secret, record)?;
        if valid && self.is_deprecated(handler.name()) {
            warn!(scheme = handler.name(), "verified password against deprecated scheme");
        }
        Ok(valid)
    }
}

// ============================================================================
// 便捷函数
// ============================================================================

/// 启用内置算法的 Context
///
/// 默认算法依次优先 argon2、bcrypt（取决于启用的 feature），否则为 pbkdf2_sha256。
///
/// `cisco_asa` 与 `cisco_pix` 格式相同且都没有 marker，同时启用时识别总是落到
/// 先注册的那个，因此这里只启用 `cisco_pix`。需要 ASA 时用 [`ContextConfig`]
/// 显式启用 `cisco_asa`。
pub fn default_context() -> Result<Context> {
    let preferred = if cfg!(feature = "argon2") {
        "argon2"
    } else if cfg!(feature = "bcrypt") {
        "bcrypt"
    } else {
        "pbkdf2_sha256"
    };
    let schemes = crate::handler::builtin_schemes()
        .into_iter()
        .filter(|scheme| *scheme != "cisco_asa");
    ContextConfig::new(schemes).with_default(preferred).build()
}

/// 使用默认 Context 哈希密码
///
/// # Example
///
/// ```rust
/// use passrs::{hash_password, verify_password};
///
/// let hash = hash_password("my_secure_password").unwrap();
/// assert!(verify_password("my_secure_password", &hash).unwrap());
/// assert!(!verify_password("wrong_password", &hash).unwrap());
/// ```
pub fn hash_password(password: impl AsRef<[u8]>) -> Result<String> {
    default_context()?.hash(password)
}

/// 使用默认 Context 验证密码，可识别任意内置算法的哈希
pub fn verify_password(password: impl AsRef<[u8]>, hash: &str) -> Result<bool> {
    default_context()?.verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn legacy_context() -> Context {
        ContextConfig::new(["pbkdf2_sha256", "md5_crypt", "django_salted_sha1"])
            .with_deprecated("md5_crypt")
            .with_override(
                "pbkdf2_sha256",
                SchemeOverride::new().with_min_rounds(1000).with_default_rounds(1000),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_context_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Context>();
    }

    #[test]
    fn test_hash_uses_default() {
        let context = legacy_context();
        let hash = context.hash("secret").unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$1000$"));
        assert!(context.verify("secret", &hash).unwrap());
        assert!(!context.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn test_hash_with_explicit_scheme() {
        let context = legacy_context();
        let options = HashOptions::new().with_scheme("md5_crypt").with_salt("saltsalt");
        assert_eq!(
            context.hash_with("password", &options).unwrap(),
            "$1$saltsalt$qjXMvbEw8oaL.CzflDtaK/"
        );
        let options = HashOptions::new().with_scheme("oracle11");
        assert!(context.hash_with("password", &options).unwrap_err().is_unknown_scheme());
    }

    #[test]
    fn test_config_validation() {
        let cases = [
            (ContextConfig::default(), ConfigError::NoSchemes),
            (
                ContextConfig::new(["md5_crypt", "md5_crypt"]),
                ConfigError::DuplicateScheme("md5_crypt".into()),
            ),
            (
                ContextConfig::new(["md5_crypt"]).with_default("oracle11"),
                ConfigError::DefaultNotEnabled("oracle11".into()),
            ),
            (
                ContextConfig::new(["md5_crypt"]).with_deprecated("md5_crypt"),
                ConfigError::DefaultDeprecated("md5_crypt".into()),
            ),
            (
                ContextConfig::new(["md5_crypt"]).with_deprecated("oracle11"),
                ConfigError::NotEnabled {
                    key: "deprecated",
                    scheme: "oracle11".into(),
                },
            ),
            (
                ContextConfig::new(["md5_crypt"]).with_min_rounds("oracle11", 5),
                ConfigError::NotEnabled {
                    key: "overrides",
                    scheme: "oracle11".into(),
                },
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(Context::new(config).unwrap_err(), Error::Config(expected));
        }
    }

    #[test]
    fn test_verify_and_update_deprecated() {
        let context = legacy_context();
        let legacy = "$1$test$pi/xDtU5WFVRqYS6BMU8X/";
        assert!(context.needs_update(legacy).unwrap());

        let (valid, updated) = context.verify_and_update("test", legacy).unwrap();
        assert!(valid);
        let updated = updated.unwrap();
        assert_eq!(context.identify(&updated), Some("pbkdf2_sha256"));
        assert!(context.verify("test", &updated).unwrap());
        assert!(!context.needs_update(&updated).unwrap());

        assert_eq!(context.verify_and_update("nope", legacy).unwrap(), (false, None));
    }

    #[test]
    fn test_current_hash_not_updated() {
        let context = legacy_context();
        let hash = context.hash("secret").unwrap();
        assert_eq!(context.verify_and_update("secret", &hash).unwrap(), (true, None));
        // 未弃用的非默认算法也不需要升级
        let django = "sha1$abcde$f513c4466c7991d917d0cc026829387f6cbf9f94";
        assert_eq!(context.verify_and_update("password", django).unwrap(), (true, None));
    }

    #[test]
    fn test_unknown_and_malformed() {
        let context = legacy_context();
        assert!(context.verify("x", "$unknownscheme$abc").unwrap_err().is_unknown_scheme());
        assert!(context.verify("x", "not a valid hash at all").unwrap_err().is_malformed());
        assert!(context.verify("x", "$1$test$short").unwrap_err().is_malformed());
        assert_eq!(context.identify("$unknownscheme$abc"), None);
    }

    #[test]
    fn test_decode_encode_round_trip() {
        let context = legacy_context();
        let hash = "$pbkdf2-sha256$1000$c2FsdA$YywoEuRtRgQQK6dhjp1tfS.BKPYma0oDJk0qBGC33LM";
        let record = context.decode(hash).unwrap();
        assert_eq!(record.scheme, "pbkdf2_sha256");
        assert_eq!(record.raw, hash);
        assert_eq!(context.encode(&record).unwrap(), hash);
    }

    #[test]
    fn test_dummy_verify() {
        let context = legacy_context();
        assert!(!context.dummy_verify("secret").unwrap());
        assert!(!context.dummy_verify("too many secrets").unwrap());
    }

    #[test]
    fn test_default_context_verifies_any_builtin() {
        let context = default_context().unwrap();
        let mut expected = crate::handler::builtin_schemes();
        expected.retain(|scheme| *scheme != "cisco_asa");
        assert_eq!(context.schemes(), expected);
        assert!(context.verify("test", "$1$test$pi/xDtU5WFVRqYS6BMU8X/").unwrap());
        assert!(context.verify("test12345", "$P$9IQRaTwmfeRo7ud9Fh4E2PdI0S3r.L0").unwrap());
        assert!(context.verify("passphrase", "$NT$7f8fe03093cc84b267b109625f6bbf4b").unwrap());
        assert!(
            context
                .verify("SHAUGHNESSY", "S:33AEC159CC5C1994D46C1483D8DB0DAA23BB338B8C2C8E4B8E62E3946E0A")
                .unwrap()
        );
        assert!(context.verify("cisco", "2KFQnbNIdI.2KYOU").unwrap());
        assert!(!context.verify("anything", "!").unwrap());
    }

    #[test]
    fn test_queries() {
        let context = legacy_context();
        assert_eq!(context.default_scheme(), "pbkdf2_sha256");
        assert_eq!(
            context.schemes(),
            ["pbkdf2_sha256", "md5_crypt", "django_salted_sha1"]
        );
        assert!(context.is_deprecated("md5_crypt"));
        assert!(!context.is_deprecated("pbkdf2_sha256"));
        assert_eq!(
            context.policy("pbkdf2_sha256").unwrap().config.rounds.unwrap().min,
            1000
        );
        assert_eq!(context.handler("md5_crypt").unwrap().name(), "md5_crypt");
        assert_eq!(context.config().schemes.len(), 3);
    }
}
