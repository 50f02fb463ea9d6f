//! bcrypt
//!
//! 格式：`$2b$<两位 cost>$<22 字符 salt><31 字符摘要>`，使用 bcrypt 专用的
//! base64 字母表。cost 为指数成本（迭代 2^cost 次），范围 4-31。
//!
//! 摘要计算委托给 `bcrypt` crate，这里只负责格式、参数与比较。
//!
//! 最早的 `$2$` 格式只做解析和升级判断：它的摘要不包含密码末尾的 NUL，
//! `bcrypt` crate 无法计算，验证时返回 [`ParamError::UnsupportedVariant`]。

use crate::codec::{
    Alphabet, HashRecord, McfHash, ROUNDS, VARIANT, check_field_len, decode_field,
};
use crate::error::{CryptoError, Error, MalformedHashError, ParamError, Result};
use crate::handler::{
    BoundsMode, Handler, HashOptions, RoundsCost, RoundsPolicy, SchemeConfig, Secret,
    resolve_rounds, resolve_variant,
};

const SALT_CHARS: usize = 22;
const CHECKSUM_CHARS: usize = 31;
const SALT_BYTES: usize = 16;

const VARIANTS: &[&str] = &["2a", "2b", "2y"];
// 可以解析但不能计算摘要的旧变体
const LEGACY_VARIANT: &str = "2";

/// bcrypt 处理器
#[derive(Debug, Clone)]
pub struct BcryptHandler {
    config: SchemeConfig,
}

impl Default for BcryptHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl BcryptHandler {
    pub fn new() -> Self {
        Self {
            config: SchemeConfig::fixed(SALT_BYTES)
                .with_rounds(RoundsPolicy::new(RoundsCost::Log2, 4, 31, 12))
                .with_variants(VARIANTS, "2b"),
        }
    }
}

fn version(variant: &str) -> bcrypt::Version {
    match variant {
        "2a" => bcrypt::Version::TwoA,
        "2y" => bcrypt::Version::TwoY,
        _ => bcrypt::Version::TwoB,
    }
}

impl Handler for BcryptHandler {
    fn name(&self) -> &'static str {
        "bcrypt"
    }

    fn markers(&self) -> &'static [&'static str] {
        &["$2$", "$2a$", "$2b$", "$2y$"]
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let name = self.name();
        let mcf = McfHash::parse(hash)?;
        let variant = VARIANTS
            .iter()
            .chain([&LEGACY_VARIANT])
            .find(|v| **v == mcf.ident())
            .ok_or_else(|| Error::malformed(name, "unknown bcrypt variant"))?;
        let fields = mcf.expect_fields(name, 2)?;
        let (cost, data) = (fields[0], fields[1]);

        // cost 固定为两位数字，如 `05`
        if cost.len() != 2 || !cost.bytes().all(|c| c.is_ascii_digit()) {
            return Err(MalformedHashError::InvalidCost {
                scheme: name.to_string(),
                value: cost.to_string(),
            }
            .into());
        }
        let rounds: u32 = cost.parse().map_err(|_| Error::malformed(name, "invalid cost"))?;
        if !(4..=31).contains(&rounds) {
            return Err(MalformedHashError::InvalidCost {
                scheme: name.to_string(),
                value: cost.to_string(),
            }
            .into());
        }

        check_field_len(name, "salt+checksum", data, |n| {
            n == SALT_CHARS + CHECKSUM_CHARS
        })?;
        let (salt, checksum) = data.split_at(SALT_CHARS);

        let mut record = HashRecord::new(name, format!("${}$", variant));
        record.params.insert(VARIANT, *variant);
        record.params.insert(ROUNDS, rounds);
        record.salt = decode_field(Alphabet::Bcrypt64, name, "salt", salt)?;
        record.checksum = decode_field(Alphabet::Bcrypt64, name, "checksum", checksum)?;
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        let variant = record.variant().unwrap_or("2b");
        let rounds = record
            .rounds()
            .ok_or_else(|| Error::malformed(self.name(), "missing cost"))?;
        Ok(format!(
            "${}${:02}${}{}",
            variant,
            rounds,
            Alphabet::Bcrypt64.encode(&record.salt),
            Alphabet::Bcrypt64.encode(&record.checksum)
        ))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        let name = self.name();
        let rounds = resolve_rounds(name, options.rounds, config, mode)?.unwrap_or(12);
        let variant = resolve_variant(name, options.variant.as_deref(), config)?.unwrap_or("2b");
        let mut record = HashRecord::new(name, format!("${}$", variant));
        record.params.insert(VARIANT, variant);
        record.params.insert(ROUNDS, rounds);
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>> {
        let name = self.name();
        if record.variant() == Some(LEGACY_VARIANT) {
            return Err(ParamError::UnsupportedVariant {
                scheme: name.to_string(),
                variant: LEGACY_VARIANT.to_string(),
            }
            .into());
        }
        let cost = record
            .rounds()
            .and_then(|r| u32::try_from(r).ok())
            .ok_or_else(|| Error::malformed(name, "missing cost"))?;
        let salt: [u8; SALT_BYTES] = record
            .salt
            .as_slice()
            .try_into()
            .map_err(|_| Error::malformed(name, "salt must be 16 bytes"))?;
        let parts = bcrypt::hash_with_salt(secret.password, cost, salt)
            .map_err(|e| CryptoError::PrimitiveFailed(format!("bcrypt: {}", e)))?;
        let full = parts.format_for_version(version(record.variant().unwrap_or("2b")));
        let encoded = full
            .get(full.len().saturating_sub(CHECKSUM_CHARS)..)
            .ok_or_else(|| CryptoError::PrimitiveFailed("bcrypt: short output".to_string()))?;
        decode_field(Alphabet::Bcrypt64, name, "checksum", encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{SchemePolicy, VerifyOptions};

    // OpenBSD 测试向量
    const VECTOR: &str = "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";

    #[test]
    fn test_known_vector() {
        let handler = BcryptHandler::new();
        assert!(handler.verify(b"U*U", VECTOR, &VerifyOptions::default()).unwrap());
        assert!(!handler.verify(b"U*V", VECTOR, &VerifyOptions::default()).unwrap());
    }

    #[test]
    fn test_parse_fields() {
        let record = BcryptHandler::new().parse(VECTOR).unwrap();
        assert_eq!(record.ident, "$2a$");
        assert_eq!(record.variant(), Some("2a"));
        assert_eq!(record.rounds(), Some(5));
        assert_eq!(record.salt.len(), 16);
        assert_eq!(record.checksum.len(), 23);
    }

    #[test]
    fn test_format_round_trip() {
        let handler = BcryptHandler::new();
        let record = handler.parse(VECTOR).unwrap();
        assert_eq!(handler.format(&record).unwrap(), VECTOR);
    }

    #[test]
    fn test_hash_reproducible_with_salt() {
        let handler = BcryptHandler::new();
        let salt = Alphabet::Bcrypt64.decode("CCCCCCCCCCCCCCCCCCCCC.").unwrap();
        let options = HashOptions::new()
            .with_salt(&salt)
            .with_rounds(5)
            .with_variant("2b");
        let hash = handler
            .hash(b"U*U", &options, handler.config(), BoundsMode::Strict)
            .unwrap();
        assert_eq!(
            hash,
            "$2b$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW"
        );
    }

    #[test]
    fn test_cost_bounds() {
        let handler = BcryptHandler::new();
        let err = handler
            .hash(
                b"pw",
                &HashOptions::new().with_rounds(3),
                handler.config(),
                BoundsMode::Strict,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Param(_)));

        let hash = handler
            .hash(
                b"pw",
                &HashOptions::new().with_rounds(2),
                handler.config(),
                BoundsMode::Clamp,
            )
            .unwrap();
        assert!(hash.starts_with("$2b$04$"));
    }

    #[test]
    fn test_rejects_malformed() {
        let handler = BcryptHandler::new();
        for bad in [
            "$2a$5$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW",
            "$2a$32$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW",
            "$2a$03$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW",
            "$2a$xx$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW",
            "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOe",
            "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyO!W",
            "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0Xou$Yb4YMJKvyOeW",
        ] {
            assert!(handler.parse(bad).unwrap_err().is_malformed(), "{}", bad);
        }
    }

    #[test]
    fn test_legacy_variant_is_parse_only() {
        let handler = BcryptHandler::new();
        let legacy = "$2$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";
        assert!(handler.identify(legacy));

        let record = handler.parse(legacy).unwrap();
        assert_eq!(record.ident, "$2$");
        assert_eq!(record.variant(), Some("2"));
        assert_eq!(record.rounds(), Some(5));
        assert_eq!(handler.format(&record).unwrap(), legacy);

        let policy = SchemePolicy {
            config: handler.config().clone(),
            deprecated: false,
        };
        assert!(handler.needs_update(&record, &policy));

        let err = handler
            .verify(b"U*U", legacy, &VerifyOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Param(ParamError::UnsupportedVariant { .. })
        ));

        // 不能用旧变体生成新哈希
        let err = handler
            .hash(
                b"U*U",
                &HashOptions::new().with_variant("2").with_rounds(4),
                handler.config(),
                BoundsMode::Strict,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Param(ParamError::UnsupportedVariant { .. })
        ));
    }

    #[test]
    fn test_needs_update_on_variant_and_cost() {
        let handler = BcryptHandler::new();
        let policy = SchemePolicy {
            config: handler.config().clone(),
            deprecated: false,
        };
        // 2a 不是默认变体
        let record = handler.parse(VECTOR).unwrap();
        assert!(handler.needs_update(&record, &policy));

        let mut strict = policy.clone();
        if let Some(rounds) = strict.config.rounds.as_mut() {
            rounds.min = 10;
        }
        let hash = handler
            .hash(
                b"pw",
                &HashOptions::new().with_rounds(4),
                handler.config(),
                BoundsMode::Strict,
            )
            .unwrap();
        let record = handler.parse(&hash).unwrap();
        assert!(!handler.needs_update(&record, &policy));
        assert!(handler.needs_update(&record, &strict));
    }
}
