//! Oracle 11g 口令哈希
//!
//! 格式：`S:<40 位十六进制摘要><20 位十六进制 salt>`，摘要为
//! `SHA1(password + salt)`。解析时大小写均可，输出统一为大写。

use sha1::{Digest, Sha1};

use crate::codec::{Alphabet, HashRecord, check_printable};
use crate::error::{Error, MalformedHashError, Result};
use crate::handler::{BoundsMode, Handler, HashOptions, SchemeConfig, Secret, resolve_rounds};

const MARKER: &str = "S:";
const CHECKSUM_CHARS: usize = 40;
const SALT_CHARS: usize = 20;

/// Oracle 11g 处理器
#[derive(Debug, Clone)]
pub struct Oracle11Handler {
    config: SchemeConfig,
}

impl Default for Oracle11Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle11Handler {
    pub fn new() -> Self {
        Self {
            config: SchemeConfig::fixed(SALT_CHARS / 2),
        }
    }
}

impl Handler for Oracle11Handler {
    fn name(&self) -> &'static str {
        "oracle11"
    }

    fn markers(&self) -> &'static [&'static str] {
        &[MARKER]
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let name = self.name();
        check_printable(hash)?;
        let body = hash
            .strip_prefix(MARKER)
            .ok_or_else(|| Error::malformed(name, "wrong marker"))?;
        if body.len() != CHECKSUM_CHARS + SALT_CHARS {
            return Err(MalformedHashError::InvalidLength {
                scheme: name.to_string(),
                field: "checksum+salt",
                found: body.len(),
            }
            .into());
        }
        if let Some(found) = body.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(MalformedHashError::InvalidCharacter {
                scheme: name.to_string(),
                field: "checksum+salt",
                found,
            }
            .into());
        }
        let (checksum, salt) = body.split_at(CHECKSUM_CHARS);

        let mut record = HashRecord::new(name, MARKER);
        record.checksum =
            hex::decode(checksum).map_err(|e| Error::malformed(name, e.to_string()))?;
        record.salt = hex::decode(salt).map_err(|e| Error::malformed(name, e.to_string()))?;
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        Ok(format!(
            "{}{}{}",
            MARKER,
            Alphabet::HexUpper.encode(&record.checksum),
            Alphabet::HexUpper.encode(&record.salt)
        ))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        resolve_rounds(self.name(), options.rounds, config, mode)?;
        let mut record = HashRecord::new(self.name(), MARKER);
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>> {
        Ok(Sha1::new()
            .chain_update(secret.password)
            .chain_update(&record.salt)
            .finalize()
            .to_vec())
    }
}
