//! Django 旧版加盐摘要与禁用账户标记
//!
//! 格式：`sha1$<salt>$<hexdigest>` / `md5$<salt>$<hexdigest>`，摘要为
//! `H(salt + password)` 的小写十六进制。salt 为小写十六进制字符，按字符参与摘要。
//!
//! `!` 是 Django 用于禁用账户的标记，任何密码都无法通过验证。

use md5::Md5;
use sha1::{Digest, Sha1};

use crate::codec::{
    Alphabet, HashRecord, alphabet::HEX_LOWER_CHARS, check_field_chars, check_field_len,
    check_printable, decode_field,
};
use crate::error::{Error, ParamError, Result};
use crate::handler::{
    BoundsMode, Handler, HashOptions, SchemeConfig, SchemePolicy, Secret, VerifyOptions,
    resolve_rounds,
};
use crate::random::generate_salt_chars;

const MAX_SALT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DjangoDigest {
    Sha1,
    Md5,
}

impl DjangoDigest {
    fn checksum_chars(self) -> usize {
        match self {
            DjangoDigest::Sha1 => 40,
            DjangoDigest::Md5 => 32,
        }
    }
}

/// Django 加盐 SHA1 / MD5 处理器
#[derive(Debug, Clone)]
pub struct DjangoSaltedHandler {
    name: &'static str,
    markers: &'static [&'static str],
    digest: DjangoDigest,
    config: SchemeConfig,
}

impl DjangoSaltedHandler {
    fn build(name: &'static str, markers: &'static [&'static str], digest: DjangoDigest) -> Self {
        Self {
            name,
            markers,
            digest,
            config: SchemeConfig::fixed(5).with_salt_range(0, MAX_SALT),
        }
    }

    /// `sha1$`
    pub fn sha1() -> Self {
        Self::build("django_salted_sha1", &["sha1$"], DjangoDigest::Sha1)
    }

    /// `md5$`
    pub fn md5() -> Self {
        Self::build("django_salted_md5", &["md5$"], DjangoDigest::Md5)
    }

    fn marker(&self) -> &'static str {
        self.markers[0]
    }
}

impl Handler for DjangoSaltedHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn markers(&self) -> &'static [&'static str] {
        self.markers
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        check_printable(hash)?;
        let body = hash
            .strip_prefix(self.marker())
            .ok_or_else(|| Error::malformed(self.name, "wrong marker"))?;
        let (salt, checksum) = body
            .split_once('$')
            .ok_or_else(|| Error::malformed(self.name, "missing checksum"))?;

        check_field_len(self.name, "salt", salt, |n| n <= MAX_SALT)?;
        check_field_chars(Alphabet::HexLower, self.name, "salt", salt)?;
        check_field_len(self.name, "checksum", checksum, |n| {
            n == self.digest.checksum_chars()
        })?;

        let mut record = HashRecord::new(self.name, self.marker());
        record.salt = salt.as_bytes().to_vec();
        record.checksum = decode_field(Alphabet::HexLower, self.name, "checksum", checksum)?;
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        let salt = std::str::from_utf8(&record.salt)
            .map_err(|_| Error::malformed(self.name, "salt is not ascii"))?;
        Ok(format!(
            "{}{}${}",
            self.marker(),
            salt,
            Alphabet::HexLower.encode(&record.checksum)
        ))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        resolve_rounds(self.name, options.rounds, config, mode)?;
        let mut record = HashRecord::new(self.name, self.marker());
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>> {
        let out = match self.digest {
            DjangoDigest::Sha1 => Sha1::new()
                .chain_update(&record.salt)
                .chain_update(secret.password)
                .finalize()
                .to_vec(),
            DjangoDigest::Md5 => Md5::new()
                .chain_update(&record.salt)
                .chain_update(secret.password)
                .finalize()
                .to_vec(),
        };
        Ok(out)
    }

    fn generate_salt(&self, size: usize) -> Result<Vec<u8>> {
        generate_salt_chars(HEX_LOWER_CHARS, size)
    }

    fn check_salt(&self, salt: &[u8], config: &SchemeConfig) -> Result<()> {
        if salt.len() > config.max_salt_size || !salt.iter().all(|c| HEX_LOWER_CHARS.contains(c)) {
            return Err(ParamError::InvalidSalt {
                scheme: self.name.to_string(),
                reason: "expected lowercase hexadecimal characters".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// 禁用账户
// ============================================================================

/// Django 的禁用账户标记 `!`
///
/// 新哈希总是 `!`，验证总是返回 `false`。只认领恰好为 `!` 的字符串。
#[derive(Debug, Clone)]
pub struct DjangoDisabled {
    config: SchemeConfig,
}

impl Default for DjangoDisabled {
    fn default() -> Self {
        Self::new()
    }
}

impl DjangoDisabled {
    pub fn new() -> Self {
        Self {
            config: SchemeConfig::fixed(0),
        }
    }
}

impl Handler for DjangoDisabled {
    fn name(&self) -> &'static str {
        "django_disabled"
    }

    fn markers(&self) -> &'static [&'static str] {
        &["!"]
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    // 只认领 `!` 本身，`!` 开头的其他字符串不属于这里
    fn identify(&self, hash: &str) -> bool {
        hash == "!"
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        check_printable(hash)?;
        if hash != "!" {
            return Err(Error::malformed(self.name(), "expected '!'"));
        }
        let mut record = HashRecord::new(self.name(), "!");
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, _record: &HashRecord) -> Result<String> {
        Ok("!".to_string())
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        resolve_rounds(self.name(), options.rounds, config, mode)?;
        Ok(HashRecord::new(self.name(), "!"))
    }

    fn checksum(&self, _secret: &Secret<'_>, _record: &HashRecord) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn verify_record(&self, _secret: &Secret<'_>, _record: &HashRecord) -> Result<bool> {
        Ok(false)
    }

    fn verify(&self, _password: &[u8], hash: &str, _options: &VerifyOptions) -> Result<bool> {
        self.parse(hash)?;
        Ok(false)
    }

    fn needs_update(&self, _record: &HashRecord, policy: &SchemePolicy) -> bool {
        policy.deprecated
    }
}
