//! 二进制到文本的字母表
//!
//! 每个算法自己决定 salt 和摘要使用哪种字母表，这里只提供编解码实现，
//! 不存在全局默认值。

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

/// crypt 系列使用的字符顺序（`./0-9A-Za-z`）
pub const HASH64_CHARS: &[u8] =
    b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// 小写十六进制字符
pub const HEX_LOWER_CHARS: &[u8] = b"0123456789abcdef";

/// 大写十六进制字符
pub const HEX_UPPER_CHARS: &[u8] = b"0123456789ABCDEF";

const AB64_ALPHABET: alphabet::Alphabet =
    match alphabet::Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./") {
        Ok(a) => a,
        Err(_) => panic!("invalid ab64 alphabet"),
    };

// 解码时忽略最后一个字符中未使用的填充位，编码时总是输出规范形式
const NO_PAD: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_allow_trailing_bits(true)
    .with_decode_padding_mode(DecodePaddingMode::RequireNone);

const BCRYPT64: GeneralPurpose = GeneralPurpose::new(&alphabet::BCRYPT, NO_PAD);
const AB64: GeneralPurpose = GeneralPurpose::new(&AB64_ALPHABET, NO_PAD);
const BASE64: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, NO_PAD);

/// 字母表解码错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphabetError {
    /// 出现字母表之外的字符
    InvalidCharacter(char),
    /// 长度无法对应整数个字节
    InvalidLength(usize),
}

/// 支持的二进制到文本字母表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alphabet {
    /// crypt 风格：`./0-9A-Za-z`，小端位序
    Hash64,
    /// bcrypt 风格：`./A-Za-z0-9`，大端位序
    Bcrypt64,
    /// 标准 base64，用 `.` 代替 `+`，无填充
    Ab64,
    /// 标准 base64，无填充（PHC 字符串）
    Base64,
    /// 小写十六进制
    HexLower,
    /// 大写十六进制
    HexUpper,
}

impl Alphabet {
    /// 字母表包含的全部字符
    pub fn chars(&self) -> &'static [u8] {
        match self {
            Alphabet::Hash64 => HASH64_CHARS,
            Alphabet::Bcrypt64 => {
                b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"
            }
            Alphabet::Ab64 => b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./",
            Alphabet::Base64 => b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/",
            Alphabet::HexLower => HEX_LOWER_CHARS,
            Alphabet::HexUpper => HEX_UPPER_CHARS,
        }
    }

    /// 字符是否属于该字母表
    pub fn contains(&self, c: u8) -> bool {
        match self {
            Alphabet::Hash64 | Alphabet::Bcrypt64 => c.is_ascii_alphanumeric() || c == b'.' || c == b'/',
            Alphabet::Ab64 => c.is_ascii_alphanumeric() || c == b'.' || c == b'/',
            Alphabet::Base64 => c.is_ascii_alphanumeric() || c == b'+' || c == b'/',
            Alphabet::HexLower => c.is_ascii_digit() || (b'a'..=b'f').contains(&c),
            Alphabet::HexUpper => c.is_ascii_digit() || (b'A'..=b'F').contains(&c),
        }
    }

    /// 返回第一个不属于字母表的字符
    pub fn find_invalid(&self, text: &str) -> Option<char> {
        text.chars()
            .find(|c| !c.is_ascii() || !self.contains(*c as u8))
    }

    /// 编码 `len` 个字节后的字符数
    pub fn encoded_len(&self, len: usize) -> usize {
        match self {
            Alphabet::HexLower | Alphabet::HexUpper => len * 2,
            _ => (len * 8).div_ceil(6),
        }
    }

    /// 编码字节
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            Alphabet::Hash64 => h64_encode(bytes),
            Alphabet::Bcrypt64 => BCRYPT64.encode(bytes),
            Alphabet::Ab64 => AB64.encode(bytes),
            Alphabet::Base64 => BASE64.encode(bytes),
            Alphabet::HexLower => hex::encode(bytes),
            Alphabet::HexUpper => hex::encode_upper(bytes),
        }
    }

    /// 解码字符串
    pub fn decode(&self, text: &str) -> Result<Vec<u8>, AlphabetError> {
        if let Some(c) = self.find_invalid(text) {
            return Err(AlphabetError::InvalidCharacter(c));
        }
        match self {
            Alphabet::Hash64 => h64_decode(text.as_bytes()),
            Alphabet::Bcrypt64 => decode_base64(&BCRYPT64, text),
            Alphabet::Ab64 => decode_base64(&AB64, text),
            Alphabet::Base64 => decode_base64(&BASE64, text),
            Alphabet::HexLower | Alphabet::HexUpper => {
                hex::decode(text).map_err(|_| AlphabetError::InvalidLength(text.len()))
            }
        }
    }

    /// 按给定偏移重排后编码（md5-crypt 的摘要布局）
    ///
    /// 只对 [`Alphabet::Hash64`] 有意义。
    pub fn encode_transposed(&self, bytes: &[u8], offsets: &[usize]) -> String {
        let reordered: Vec<u8> = offsets
            .iter()
            .map(|&i| bytes.get(i).copied().unwrap_or(0))
            .collect();
        self.encode(&reordered)
    }

    /// [`Alphabet::encode_transposed`] 的逆操作
    pub fn decode_transposed(
        &self,
        text: &str,
        offsets: &[usize],
    ) -> Result<Vec<u8>, AlphabetError> {
        let reordered = self.decode(text)?;
        if reordered.len() != offsets.len() {
            return Err(AlphabetError::InvalidLength(text.len()));
        }
        let mut out = vec![0u8; offsets.len()];
        for (byte, &i) in reordered.iter().zip(offsets) {
            if let Some(slot) = out.get_mut(i) {
                *slot = *byte;
            }
        }
        Ok(out)
    }
}

fn decode_base64(engine: &GeneralPurpose, text: &str) -> Result<Vec<u8>, AlphabetError> {
    engine
        .decode(text)
        .map_err(|_| AlphabetError::InvalidLength(text.len()))
}

fn h64_index(c: u8) -> Option<u32> {
    HASH64_CHARS.iter().position(|&x| x == c).map(|i| i as u32)
}

// 每 3 个字节组成一个小端 24 位整数，低 6 位先输出
fn h64_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(Alphabet::Hash64.encoded_len(bytes.len()));
    for chunk in bytes.chunks(3) {
        let value = chunk
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, b)| acc | (u32::from(*b) << (8 * i)));
        for i in 0..=chunk.len() {
            out.push(HASH64_CHARS[((value >> (6 * i)) & 0x3f) as usize] as char);
        }
    }
    out
}

fn h64_decode(text: &[u8]) -> Result<Vec<u8>, AlphabetError> {
    if text.len() % 4 == 1 {
        return Err(AlphabetError::InvalidLength(text.len()));
    }
    let mut out = Vec::with_capacity(text.len() * 3 / 4);
    for chunk in text.chunks(4) {
        let mut value = 0u32;
        for (i, &c) in chunk.iter().enumerate() {
            let idx = h64_index(c).ok_or(AlphabetError::InvalidCharacter(c as char))?;
            value |= idx << (6 * i);
        }
        let bytes = chunk.len() - 1;
        // 末尾不完整的分组中，未使用的高位必须为 0
        if value >> (8 * bytes) != 0 {
            return Err(AlphabetError::InvalidCharacter(chunk[bytes] as char));
        }
        for i in 0..bytes {
            out.push((value >> (8 * i)) as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash64_known_values() {
        assert_eq!(Alphabet::Hash64.encode(&[0x00]), "..");
        assert_eq!(Alphabet::Hash64.encode(&[0xff, 0xff, 0xff]), "zzzz");
        assert_eq!(Alphabet::Hash64.encode(&[0x01]), "/.");
    }

    #[test]
    fn test_hash64_decode_inverts_encode() {
        let data: Vec<u8> = (0u8..=40).collect();
        let text = Alphabet::Hash64.encode(&data);
        assert_eq!(text.len(), Alphabet::Hash64.encoded_len(data.len()));
        assert_eq!(Alphabet::Hash64.decode(&text).unwrap(), data);
    }

    #[test]
    fn test_hash64_rejects_single_trailing_char() {
        assert_eq!(
            Alphabet::Hash64.decode("abcde"),
            Err(AlphabetError::InvalidLength(5))
        );
    }

    #[test]
    fn test_hash64_rejects_non_canonical_tail() {
        assert_eq!(Alphabet::Hash64.decode("/.").unwrap(), vec![0x01]);
        assert_eq!(
            Alphabet::Hash64.decode("/2"),
            Err(AlphabetError::InvalidCharacter('2'))
        );
        assert_eq!(
            Alphabet::Hash64.decode("zzzzz2"),
            Err(AlphabetError::InvalidCharacter('2'))
        );
        // bcrypt64 仍然忽略填充位
        assert!(Alphabet::Bcrypt64.decode("CCCCCCCCCCCCCCCCCCCCCu").is_ok());
    }

    #[test]
    fn test_invalid_character_reported() {
        assert_eq!(
            Alphabet::Hash64.decode("ab+d"),
            Err(AlphabetError::InvalidCharacter('+'))
        );
        assert_eq!(
            Alphabet::Ab64.decode("ab+d"),
            Err(AlphabetError::InvalidCharacter('+'))
        );
        assert_eq!(
            Alphabet::HexLower.decode("abCD"),
            Err(AlphabetError::InvalidCharacter('C'))
        );
    }

    #[test]
    fn test_ab64_uses_dot_for_plus() {
        // 0xfb 0xef 在标准 base64 中为 "++8"
        assert_eq!(Alphabet::Base64.encode(&[0xfb, 0xef]), "++8");
        assert_eq!(Alphabet::Ab64.encode(&[0xfb, 0xef]), "..8");
        assert_eq!(Alphabet::Ab64.decode("..8").unwrap(), vec![0xfb, 0xef]);
    }

    #[test]
    fn test_bcrypt64_salt_length() {
        let salt = [0x5au8; 16];
        let text = Alphabet::Bcrypt64.encode(&salt);
        assert_eq!(text.len(), 22);
        assert_eq!(Alphabet::Bcrypt64.decode(&text).unwrap(), salt);
    }

    #[test]
    fn test_bcrypt64_ignores_padding_bits() {
        // 最后一个字符的低位在规范形式中为 0
        let canonical = Alphabet::Bcrypt64.decode("CCCCCCCCCCCCCCCCCCCCC.").unwrap();
        let sloppy = Alphabet::Bcrypt64.decode("CCCCCCCCCCCCCCCCCCCCC/").unwrap();
        assert_eq!(canonical, sloppy);
        assert_eq!(Alphabet::Bcrypt64.encode(&sloppy), "CCCCCCCCCCCCCCCCCCCCC.");
    }

    #[test]
    fn test_hex_cases() {
        assert_eq!(Alphabet::HexUpper.encode(&[0xab, 0x01]), "AB01");
        assert_eq!(Alphabet::HexLower.encode(&[0xab, 0x01]), "ab01");
        assert_eq!(Alphabet::HexUpper.decode("AB01").unwrap(), vec![0xab, 0x01]);
        assert!(Alphabet::HexUpper.decode("AB0").is_err());
    }

    #[test]
    fn test_transposed_round_trip() {
        let offsets = [2usize, 0, 1];
        let text = Alphabet::Hash64.encode_transposed(&[1, 2, 3], &offsets);
        assert_eq!(text, Alphabet::Hash64.encode(&[3, 1, 2]));
        assert_eq!(
            Alphabet::Hash64.decode_transposed(&text, &offsets).unwrap(),
            vec![1, 2, 3]
        );
    }
}
