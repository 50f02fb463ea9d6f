//! 安全随机数与常量时间比较模块
//!
//! 为所有处理器提供 salt 生成和摘要比较。随机源为操作系统 CSPRNG，
//! 可以被任意数量的并发调用方同时使用。

use rand::{Rng, TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use passrs::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(16).unwrap();
/// assert_eq!(bytes.len(), 16);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 从给定字符集中生成随机 salt 字符串
///
/// 用于 salt 以字符形式直接参与摘要计算的算法（如 md5-crypt、Django）
///
/// # Example
///
/// ```rust
/// use passrs::random::generate_salt_chars;
///
/// let salt = generate_salt_chars(b"0123456789abcdef", 5).unwrap();
/// assert_eq!(salt.len(), 5);
/// ```
pub fn generate_salt_chars(charset: &[u8], length: usize) -> Result<Vec<u8>> {
    if charset.is_empty() {
        return Err(Error::Crypto(CryptoError::RngFailed(
            "empty salt charset".to_string(),
        )));
    }
    let mut rng = OsRng.unwrap_err();
    Ok((0..length)
        .map(|_| charset[rng.random_range(0..charset.len())])
        .collect())
}

/// 常量时间比较两个字节切片
///
/// 比较耗时与第一个不同字节的位置无关，用于防止时序攻击。
/// 长度不同时直接返回 false（长度本身不是秘密）。
///
/// # Example
///
/// ```rust
/// use passrs::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"digest", b"digest"));
/// assert!(!constant_time_compare(b"digest", b"digesT"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
