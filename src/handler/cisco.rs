//! Cisco PIX / ASA 的 "encrypted" 口令哈希
//!
//! 哈希字符串为 16 个 hash64 字符，没有 marker，也没有独立的 salt 字段：
//! 用户名（可选）在摘要前拼接到密码后面，起到 salt 的作用。
//!
//! - PIX：密码最多 16 字节，拼接后补齐或截断到 16 字节
//! - ASA：密码最多 32 字节，拼接后超过 16 字节时补齐到 32 字节；
//!   密码达到 28 字节时不再拼接用户名
//!
//! 取 MD5 摘要后丢弃每第 4 个字节，剩余 12 字节以 hash64 编码。

use md5::{Digest, Md5};

use crate::codec::{Alphabet, HashRecord, check_field_len, check_printable, decode_field};
use crate::error::{Error, Result};
use crate::handler::{
    BoundsMode, Handler, HashOptions, Purpose, SchemeConfig, Secret, resolve_rounds,
};

const HASH_CHARS: usize = 16;
const USER_BYTES: usize = 4;
const ASA_USER_CUTOFF: usize = 28;

/// Cisco PIX / ASA 处理器
#[derive(Debug, Clone)]
pub struct CiscoHandler {
    name: &'static str,
    asa: bool,
    config: SchemeConfig,
}

impl CiscoHandler {
    /// 旧版 PIX 防火墙
    pub fn pix() -> Self {
        Self {
            name: "cisco_pix",
            asa: false,
            config: SchemeConfig::fixed(0),
        }
    }

    /// ASA 以及 PIX 7.0 之后的版本
    pub fn asa() -> Self {
        Self {
            name: "cisco_asa",
            asa: true,
            config: SchemeConfig::fixed(0),
        }
    }

    /// 允许的最大密码字节数
    pub fn max_password_size(&self) -> usize {
        if self.asa { 32 } else { 16 }
    }

    fn digest(&self, password: &[u8], user: Option<&str>, spoil: bool) -> Vec<u8> {
        let mut secret = password.to_vec();
        if let Some(user) = user.filter(|u| !u.is_empty())
            && (!self.asa || password.len() < ASA_USER_CUTOFF)
        {
            // 用户名循环重复后截断为 4 字节
            secret.extend(user.bytes().cycle().take(USER_BYTES));
        }
        let pad_size = if self.asa && secret.len() > 16 { 32 } else { 16 };
        secret.resize(pad_size, 0);
        if spoil {
            // 超长密码在验证时混入固定字节，保证不会与截断后的密码匹配
            secret.extend_from_slice(password);
            secret.extend_from_slice(&[0xFF; 32]);
        }

        Md5::digest(&secret)
            .iter()
            .enumerate()
            .filter(|(i, _)| (i + 1) % 4 != 0)
            .map(|(_, b)| *b)
            .collect()
    }
}

impl Handler for CiscoHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn markers(&self) -> &'static [&'static str] {
        &[]
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn identify(&self, hash: &str) -> bool {
        hash.len() == HASH_CHARS && Alphabet::Hash64.find_invalid(hash).is_none()
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        check_printable(hash)?;
        check_field_len(self.name, "checksum", hash, |n| n == HASH_CHARS)?;
        let mut record = HashRecord::new(self.name, "");
        record.checksum = decode_field(Alphabet::Hash64, self.name, "checksum", hash)?;
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        if record.checksum.len() != 12 {
            return Err(Error::malformed(self.name, "checksum must be 12 bytes"));
        }
        Ok(Alphabet::Hash64.encode(&record.checksum))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        resolve_rounds(self.name, options.rounds, config, mode)?;
        self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(HashRecord::new(self.name, ""))
    }

    fn checksum(&self, secret: &Secret<'_>, _record: &HashRecord) -> Result<Vec<u8>> {
        let max = self.max_password_size();
        let too_long = secret.password.len() > max;
        if too_long && secret.purpose == Purpose::Hash {
            return Err(Error::PasswordSize {
                scheme: self.name.to_string(),
                max,
            });
        }
        Ok(self.digest(secret.password, secret.user, too_long))
    }
}
