//! PHPass 可移植哈希（WordPress、phpBB3）
//!
//! 格式：`$P$<rounds 字符><8 字符 salt><22 字符摘要>`，phpBB3 使用 `$H$`。
//! rounds 以 hash64 字符表示 2 的幂（7-30），摘要为迭代 MD5，以 hash64 编码。

use md5::{Digest, Md5};

use crate::codec::{
    Alphabet, HashRecord, McfHash, ROUNDS, VARIANT, alphabet::HASH64_CHARS, check_field_chars,
    check_field_len, decode_field,
};
use crate::error::{Error, MalformedHashError, ParamError, Result};
use crate::handler::{
    BoundsMode, Handler, HashOptions, RoundsCost, RoundsPolicy, SchemeConfig, Secret,
    resolve_rounds, resolve_variant,
};
use crate::random::generate_salt_chars;

const SALT_CHARS: usize = 8;
const CHECKSUM_CHARS: usize = 22;
const MIN_ROUNDS: u32 = 7;
const MAX_ROUNDS: u32 = 30;

const VARIANTS: &[&str] = &["P", "H"];

/// PHPass 处理器
#[derive(Debug, Clone)]
pub struct PhpassHandler {
    config: SchemeConfig,
}

impl Default for PhpassHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl PhpassHandler {
    pub fn new() -> Self {
        Self {
            config: SchemeConfig::fixed(SALT_CHARS)
                .with_rounds(RoundsPolicy::new(
                    RoundsCost::Log2,
                    MIN_ROUNDS,
                    MAX_ROUNDS,
                    19,
                ))
                .with_variants(VARIANTS, "P"),
        }
    }
}

impl Handler for PhpassHandler {
    fn name(&self) -> &'static str {
        "phpass"
    }

    fn markers(&self) -> &'static [&'static str] {
        &["$P$", "$H$"]
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let name = self.name();
        let mcf = McfHash::parse(hash)?;
        let variant = VARIANTS
            .iter()
            .find(|v| **v == mcf.ident())
            .ok_or_else(|| Error::malformed(name, "wrong marker"))?;
        let body = mcf.expect_fields(name, 1)?[0];
        check_field_len(name, "rounds+salt+checksum", body, |n| {
            n == 1 + SALT_CHARS + CHECKSUM_CHARS
        })?;
        let (cost, rest) = body.split_at(1);
        let (salt, checksum) = rest.split_at(SALT_CHARS);

        let rounds = HASH64_CHARS
            .iter()
            .position(|c| cost.as_bytes()[0] == *c)
            .map(|i| i as u32)
            .filter(|r| (MIN_ROUNDS..=MAX_ROUNDS).contains(r))
            .ok_or_else(|| MalformedHashError::InvalidCost {
                scheme: name.to_string(),
                value: cost.to_string(),
            })?;
        check_field_chars(Alphabet::Hash64, name, "salt", salt)?;

        let mut record = HashRecord::new(name, mcf.marker());
        record.params.insert(VARIANT, *variant);
        record.params.insert(ROUNDS, rounds);
        record.salt = salt.as_bytes().to_vec();
        record.checksum = decode_field(Alphabet::Hash64, name, "checksum", checksum)?;
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        let name = self.name();
        let cost = record
            .rounds()
            .and_then(|r| usize::try_from(r).ok())
            .and_then(|r| HASH64_CHARS.get(r))
            .ok_or_else(|| Error::malformed(name, "missing rounds"))?;
        let salt = std::str::from_utf8(&record.salt)
            .map_err(|_| Error::malformed(name, "salt is not ascii"))?;
        Ok(format!(
            "${}${}{}{}",
            record.variant().unwrap_or("P"),
            *cost as char,
            salt,
            Alphabet::Hash64.encode(&record.checksum)
        ))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        let name = self.name();
        let rounds = resolve_rounds(name, options.rounds, config, mode)?.unwrap_or(19);
        let variant = resolve_variant(name, options.variant.as_deref(), config)?.unwrap_or("P");
        let mut record = HashRecord::new(name, format!("${}$", variant));
        record.params.insert(VARIANT, variant);
        record.params.insert(ROUNDS, rounds);
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>> {
        let rounds = record
            .rounds()
            .filter(|r| *r <= u64::from(MAX_ROUNDS))
            .ok_or_else(|| Error::malformed(self.name(), "missing rounds"))?;
        let mut result = Md5::new()
            .chain_update(&record.salt)
            .chain_update(secret.password)
            .finalize();
        for _ in 0..(1u64 << rounds) {
            result = Md5::new()
                .chain_update(result)
                .chain_update(secret.password)
                .finalize();
        }
        Ok(result.to_vec())
    }

    fn generate_salt(&self, size: usize) -> Result<Vec<u8>> {
        generate_salt_chars(HASH64_CHARS, size)
    }

    fn check_salt(&self, salt: &[u8], _config: &SchemeConfig) -> Result<()> {
        if salt.len() != SALT_CHARS || !salt.iter().all(|c| HASH64_CHARS.contains(c)) {
            return Err(ParamError::InvalidSalt {
                scheme: self.name().to_string(),
                reason: format!("expected exactly {} hash64 characters", SALT_CHARS),
            }
            .into());
        }
        Ok(())
    }
}
