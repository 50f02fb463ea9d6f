//! Windows NT 哈希
//!
//! 格式：`$3$$<32 位小写十六进制>`，也接受 `$NT$` 前缀。摘要为密码
//! UTF-16LE 编码后的 MD4，无 salt，无成本参数。

use md4::{Digest, Md4};

use crate::codec::{Alphabet, HashRecord, VARIANT, check_field_len, check_printable, decode_field};
use crate::error::{CryptoError, Error, Result};
use crate::handler::{
    BoundsMode, Handler, HashOptions, SchemeConfig, Secret, resolve_rounds, resolve_variant,
};

const CHECKSUM_CHARS: usize = 32;

const VARIANTS: &[&str] = &["3", "NT"];

/// NT 哈希处理器
#[derive(Debug, Clone)]
pub struct NtHashHandler {
    config: SchemeConfig,
}

impl Default for NtHashHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl NtHashHandler {
    pub fn new() -> Self {
        Self {
            config: SchemeConfig::fixed(0).with_variants(VARIANTS, "3"),
        }
    }
}

fn marker(variant: &str) -> &'static str {
    if variant == "NT" { "$NT$" } else { "$3$$" }
}

impl Handler for NtHashHandler {
    fn name(&self) -> &'static str {
        "nthash"
    }

    fn markers(&self) -> &'static [&'static str] {
        &["$3$$", "$NT$"]
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let name = self.name();
        check_printable(hash)?;
        let (variant, checksum) = VARIANTS
            .iter()
            .find_map(|v| hash.strip_prefix(marker(v)).map(|rest| (*v, rest)))
            .ok_or_else(|| Error::malformed(name, "wrong marker"))?;
        check_field_len(name, "checksum", checksum, |n| n == CHECKSUM_CHARS)?;

        let mut record = HashRecord::new(name, marker(variant));
        record.params.insert(VARIANT, variant);
        record.checksum = decode_field(Alphabet::HexLower, name, "checksum", checksum)?;
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        Ok(format!(
            "{}{}",
            marker(record.variant().unwrap_or("3")),
            Alphabet::HexLower.encode(&record.checksum)
        ))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        let name = self.name();
        resolve_rounds(name, options.rounds, config, mode)?;
        let variant = resolve_variant(name, options.variant.as_deref(), config)?.unwrap_or("3");
        let mut record = HashRecord::new(name, marker(variant));
        record.params.insert(VARIANT, variant);
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, _record: &HashRecord) -> Result<Vec<u8>> {
        let password = std::str::from_utf8(secret.password).map_err(|_| {
            CryptoError::PrimitiveFailed("nthash: password is not valid UTF-8".to_string())
        })?;
        let mut md4 = Md4::new();
        for unit in password.encode_utf16() {
            md4.update(unit.to_le_bytes());
        }
        Ok(md4.finalize().to_vec())
    }
}
