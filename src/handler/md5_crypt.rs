//! md5-crypt 与 Apache 的 apr1 变体
//!
//! 格式：`$1$<salt>$<checksum>` / `$apr1$<salt>$<checksum>`。
//! salt 为 0-8 个 hash64 字符，按字符直接参与摘要；摘要为 16 字节，
//! 重排后以 hash64 编码为 22 个字符。迭代次数固定为 1000。

use md5::{Digest, Md5};

use crate::codec::{
    Alphabet, HashRecord, McfHash, alphabet::HASH64_CHARS, check_field_chars, check_field_len,
    decode_field,
};
use crate::error::{Error, ParamError, Result};
use crate::handler::{BoundsMode, Handler, HashOptions, SchemeConfig, Secret};
use crate::random::generate_salt_chars;

const CHECKSUM_CHARS: usize = 22;
const MAX_SALT: usize = 8;

// 摘要字节在编码前的排列顺序
const TRANSPOSE: [usize; 16] = [12, 6, 0, 13, 7, 1, 14, 8, 2, 15, 9, 3, 5, 10, 4, 11];

/// md5-crypt 处理器
#[derive(Debug, Clone)]
pub struct Md5CryptHandler {
    name: &'static str,
    markers: &'static [&'static str],
    config: SchemeConfig,
}

impl Md5CryptHandler {
    /// `$1$` 格式
    pub fn md5() -> Self {
        Self {
            name: "md5_crypt",
            markers: &["$1$"],
            config: SchemeConfig::fixed(MAX_SALT).with_salt_range(0, MAX_SALT),
        }
    }

    /// Apache `$apr1$` 格式，只有混入摘要的 magic 不同
    pub fn apr() -> Self {
        Self {
            name: "apr_md5_crypt",
            markers: &["$apr1$"],
            ..Self::md5()
        }
    }

    fn magic(&self) -> &'static str {
        self.markers[0]
    }

    fn ident(&self) -> &'static str {
        self.magic().trim_matches('$')
    }
}

impl Handler for Md5CryptHandler {
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
        let mcf = McfHash::parse(hash)?;
        if mcf.ident() != self.ident() {
            return Err(Error::malformed(self.name, "wrong marker"));
        }
        let fields = mcf.expect_fields(self.name, 2)?;
        let (salt, checksum) = (fields[0], fields[1]);

        check_field_len(self.name, "salt", salt, |n| n <= MAX_SALT)?;
        check_field_chars(Alphabet::Hash64, self.name, "salt", salt)?;
        check_field_len(self.name, "checksum", checksum, |n| n == CHECKSUM_CHARS)?;
        // 先做字符检查，保证错误信息指向具体字符
        decode_field(Alphabet::Hash64, self.name, "checksum", checksum)?;

        let mut record = HashRecord::new(self.name, self.magic());
        record.salt = salt.as_bytes().to_vec();
        record.checksum = Alphabet::Hash64
            .decode_transposed(checksum, &TRANSPOSE)
            .map_err(|_| Error::malformed(self.name, "invalid checksum"))?;
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        let salt = std::str::from_utf8(&record.salt)
            .map_err(|_| Error::malformed(self.name, "salt is not ascii"))?;
        Ok(format!(
            "{}{}${}",
            self.magic(),
            salt,
            Alphabet::Hash64.encode_transposed(&record.checksum, &TRANSPOSE)
        ))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        super::resolve_rounds(self.name, options.rounds, config, mode)?;
        let mut record = HashRecord::new(self.name, self.magic());
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>> {
        Ok(md5_crypt_digest(
            secret.password,
            &record.salt,
            self.magic().as_bytes(),
        ))
    }

    fn generate_salt(&self, size: usize) -> Result<Vec<u8>> {
        generate_salt_chars(HASH64_CHARS, size)
    }

    fn check_salt(&self, salt: &[u8], config: &SchemeConfig) -> Result<()> {
        if salt.len() > config.max_salt_size || !salt.iter().all(|c| HASH64_CHARS.contains(c)) {
            return Err(ParamError::InvalidSalt {
                scheme: self.name.to_string(),
                reason: format!("expected at most {} hash64 characters", MAX_SALT),
            }
            .into());
        }
        Ok(())
    }
}

fn md5_crypt_digest(secret: &[u8], salt: &[u8], magic: &[u8]) -> Vec<u8> {
    let alternate = Md5::new()
        .chain_update(secret)
        .chain_update(salt)
        .chain_update(secret)
        .finalize();

    let mut ctx = Md5::new();
    ctx.update(secret);
    ctx.update(magic);
    ctx.update(salt);
    let mut remaining = secret.len();
    while remaining > 0 {
        let n = remaining.min(alternate.len());
        ctx.update(&alternate[..n]);
        remaining -= n;
    }
    // 历史遗留：奇数位混入 NUL，偶数位混入密码首字节
    let mut bits = secret.len();
    while bits > 0 {
        if bits & 1 == 1 {
            ctx.update([0u8]);
        } else {
            ctx.update(&secret[..1]);
        }
        bits >>= 1;
    }
    let mut result = ctx.finalize();

    for round in 0..1000 {
        let mut ctx = Md5::new();
        if round % 2 == 1 {
            ctx.update(secret);
        } else {
            ctx.update(&result);
        }
        if round % 3 != 0 {
            ctx.update(salt);
        }
        if round % 7 != 0 {
            ctx.update(secret);
        }
        if round % 2 == 1 {
            ctx.update(&result);
        } else {
            ctx.update(secret);
        }
        result = ctx.finalize();
    }
    result.to_vec()
}
