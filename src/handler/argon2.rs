//! Argon2（PHC 字符串格式）
//!
//! 格式：`$argon2id$v=19$m=65536,t=3,p=4[,keyid=..][,data=..]$<salt>$<checksum>`，
//! 由 `password_hash::PasswordHash` 解析和输出。版本 0x10 的哈希不带 `v=` 字段。
//!
//! rounds 对应时间成本 `t`；内存成本 `m` 与并行度 `p` 来自策略配置。
//! `keyid` / `data` 只在解析已有哈希时出现，原样保留并参与摘要计算。

use argon2::{Algorithm, Argon2, AssociatedData, KeyId, Params, ParamsBuilder, Version};
use password_hash::{Output, ParamsString, PasswordHash, Salt};

use crate::codec::{
    Alphabet, HashRecord, ParamValue, ROUNDS, VARIANT, check_printable, decode_field,
};
use crate::error::{ConfigError, CryptoError, Error, MalformedHashError, Result};
use crate::handler::{
    BoundsMode, Handler, HashOptions, RoundsCost, RoundsPolicy, SchemeConfig, SchemePolicy,
    Secret, policy_needs_update, resolve_rounds, resolve_variant,
};

/// 参数名：版本号
pub const VERSION: &str = "version";
/// 参数名：内存成本（KiB）
pub const MEMORY_COST: &str = "memory_cost";
/// 参数名：并行度
pub const PARALLELISM: &str = "parallelism";
/// 参数名：密钥标识（base64）
pub const KEYID: &str = "keyid";
/// 参数名：关联数据（base64）
pub const DATA: &str = "data";

const VARIANTS: &[&str] = &["i", "d", "id"];
const MIN_SALT_SIZE: usize = 8;
// PHC salt 最多 64 个 base64 字符
const MAX_SALT_SIZE: usize = 48;
const DIGEST_SIZE: usize = 32;
const DEFAULT_MEMORY_COST: u32 = 65536;
const DEFAULT_PARALLELISM: u32 = 4;

/// Argon2 处理器
#[derive(Debug, Clone)]
pub struct Argon2Handler {
    config: SchemeConfig,
}

impl Default for Argon2Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl Argon2Handler {
    pub fn new() -> Self {
        let mut config = SchemeConfig::fixed(16)
            .with_salt_range(MIN_SALT_SIZE, MAX_SALT_SIZE)
            .with_rounds(RoundsPolicy::new(RoundsCost::Linear, 1, u32::MAX, 3))
            .with_variants(VARIANTS, "id");
        config.memory_cost = Some(DEFAULT_MEMORY_COST);
        config.parallelism = Some(DEFAULT_PARALLELISM);
        Self { config }
    }

    /// 由记录中的参数构建 argon2 参数
    fn params(&self, record: &HashRecord, output_len: usize) -> Result<Params> {
        let name = self.name();
        let missing = || Error::malformed(name, "missing cost parameter");
        let mut builder = ParamsBuilder::new();
        builder
            .m_cost(param_u32(record, MEMORY_COST).ok_or_else(missing)?)
            .t_cost(param_u32(record, ROUNDS).ok_or_else(missing)?)
            .p_cost(param_u32(record, PARALLELISM).ok_or_else(missing)?)
            .output_len(output_len);
        if let Some(keyid) = record.params.get_text(KEYID) {
            let bytes = decode_field(Alphabet::Base64, name, "keyid", keyid)?;
            builder.keyid(KeyId::new(&bytes).map_err(|e| Error::malformed(name, e.to_string()))?);
        }
        if let Some(data) = record.params.get_text(DATA) {
            let bytes = decode_field(Alphabet::Base64, name, "data", data)?;
            builder.data(
                AssociatedData::new(&bytes).map_err(|e| Error::malformed(name, e.to_string()))?,
            );
        }
        builder
            .build()
            .map_err(|e| Error::malformed(name, e.to_string()))
    }
}

fn algorithm(variant: &str) -> Algorithm {
    match variant {
        "i" => Algorithm::Argon2i,
        "d" => Algorithm::Argon2d,
        _ => Algorithm::Argon2id,
    }
}

fn version(value: u64) -> Version {
    if value == 0x10 {
        Version::V0x10
    } else {
        Version::V0x13
    }
}

fn param_u32(record: &HashRecord, key: &str) -> Option<u32> {
    record
        .params
        .get_int(key)
        .and_then(|v| u32::try_from(v).ok())
}

impl Handler for Argon2Handler {
    fn name(&self) -> &'static str {
        "argon2"
    }

    fn markers(&self) -> &'static [&'static str] {
        &["$argon2i$", "$argon2d$", "$argon2id$"]
    }

    fn config(&self) -> &SchemeConfig {
        &self.config
    }

    fn parse(&self, hash: &str) -> Result<HashRecord> {
        let name = self.name();
        check_printable(hash)?;
        let invalid = |e: password_hash::Error| Error::malformed(name, e.to_string());
        let phc = PasswordHash::new(hash).map_err(invalid)?;

        let variant = phc
            .algorithm
            .as_str()
            .strip_prefix("argon2")
            .and_then(|v| VARIANTS.iter().find(|known| **known == v))
            .ok_or_else(|| Error::malformed(name, "unknown argon2 variant"))?;
        let version_value = match phc.version {
            None => 0x10,
            Some(v @ (0x10 | 0x13)) => v,
            Some(v) => {
                return Err(MalformedHashError::InvalidCost {
                    scheme: name.to_string(),
                    value: format!("v={}", v),
                }
                .into());
            }
        };
        let (Some(salt), Some(output)) = (phc.salt.as_ref(), phc.hash.as_ref()) else {
            return Err(Error::malformed(name, "missing salt or checksum"));
        };

        // m >= 8p、t >= 1、未知参数名等约束交给 argon2 检查
        let params = Params::try_from(&phc).map_err(invalid)?;
        let canonical = ParamsString::try_from(&params).map_err(invalid)?;
        if canonical.to_string() != phc.params.to_string() {
            return Err(Error::malformed(name, "cost parameters out of order"));
        }

        let salt_text = salt.as_str();
        let salt = decode_field(Alphabet::Base64, name, "salt", salt_text)?;
        if salt.len() < MIN_SALT_SIZE {
            return Err(MalformedHashError::InvalidLength {
                scheme: name.to_string(),
                field: "salt",
                found: salt_text.len(),
            }
            .into());
        }

        let mut record = HashRecord::new(name, format!("${}$", phc.algorithm));
        record.params.insert(VARIANT, *variant);
        record.params.insert(VERSION, version_value);
        record.params.insert(MEMORY_COST, params.m_cost());
        record.params.insert(ROUNDS, params.t_cost());
        record.params.insert(PARALLELISM, params.p_cost());
        if !params.keyid().is_empty() {
            record
                .params
                .insert(KEYID, Alphabet::Base64.encode(params.keyid()).as_str());
        }
        if !params.data().is_empty() {
            record
                .params
                .insert(DATA, Alphabet::Base64.encode(params.data()).as_str());
        }
        record.salt = salt;
        record.checksum = output.as_bytes().to_vec();
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        let name = self.name();
        let invalid = |e: password_hash::Error| Error::malformed(name, e.to_string());
        let variant = record.variant().unwrap_or("id");
        let version_value = record
            .params
            .get_int(VERSION)
            .ok_or_else(|| Error::malformed(name, "missing version"))?;

        let params = self.params(record, record.checksum.len())?;
        let salt = Alphabet::Base64.encode(&record.salt);
        let phc = PasswordHash {
            algorithm: algorithm(variant).ident(),
            version: (version_value == 0x13).then_some(0x13),
            params: ParamsString::try_from(&params).map_err(invalid)?,
            salt: Some(Salt::from_b64(&salt).map_err(invalid)?),
            hash: Some(Output::new(&record.checksum).map_err(invalid)?),
        };
        Ok(phc.to_string())
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        let name = self.name();
        let rounds = resolve_rounds(name, options.rounds, config, mode)?.unwrap_or(3);
        let variant = resolve_variant(name, options.variant.as_deref(), config)?.unwrap_or("id");
        let mut record = HashRecord::new(name, format!("$argon2{}$", variant));
        record.params.insert(VARIANT, variant);
        record.params.insert(VERSION, 0x13u64);
        record.params.insert(
            MEMORY_COST,
            config.memory_cost.unwrap_or(DEFAULT_MEMORY_COST),
        );
        record.params.insert(ROUNDS, rounds);
        record.params.insert(
            PARALLELISM,
            config.parallelism.unwrap_or(DEFAULT_PARALLELISM),
        );
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>> {
        let output_len = if record.checksum.is_empty() {
            DIGEST_SIZE
        } else {
            record.checksum.len()
        };
        let argon2 = Argon2::new(
            algorithm(record.variant().unwrap_or("id")),
            version(record.params.get_int(VERSION).unwrap_or(0x13)),
            self.params(record, output_len)?,
        );
        let mut out = vec![0u8; output_len];
        argon2
            .hash_password_into(secret.password, &record.salt, &mut out)
            .map_err(|e| CryptoError::PrimitiveFailed(format!("argon2: {}", e)))?;
        Ok(out)
    }

    fn needs_update(&self, record: &HashRecord, policy: &SchemePolicy) -> bool {
        if policy_needs_update(record, policy) {
            return true;
        }
        let config = &policy.config;
        record.params.get(VERSION) != Some(&ParamValue::Int(0x13))
            || param_u32(record, MEMORY_COST) != config.memory_cost
            || param_u32(record, PARALLELISM) != config.parallelism
            || record.checksum.len() != DIGEST_SIZE
    }

    fn check_config(&self, config: &SchemeConfig) -> Result<()> {
        let rounds = config.rounds.map(|r| r.default).unwrap_or(3);
        Params::new(
            config.memory_cost.unwrap_or(DEFAULT_MEMORY_COST),
            rounds,
            config.parallelism.unwrap_or(DEFAULT_PARALLELISM),
            Some(DIGEST_SIZE),
        )
        .map_err(|e| ConfigError::InvalidValue {
            key: "argon2".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::VerifyOptions;

    const VECTOR: &str = "$argon2id$v=19$m=256,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE";

    fn small_config() -> SchemeConfig {
        let mut config = Argon2Handler::new().config().clone();
        config.memory_cost = Some(256);
        config.parallelism = Some(1);
        config
    }

    #[test]
    fn test_known_vector() {
        let handler = Argon2Handler::new();
        let opts = VerifyOptions::default();
        assert!(handler.verify(b"password", VECTOR, &opts).unwrap());
        assert!(!handler.verify(b"passwore", VECTOR, &opts).unwrap());
    }

    #[test]
    fn test_hash_reproducible() {
        let handler = Argon2Handler::new();
        let options = HashOptions::new()
            .with_salt("somesalt12345678")
            .with_rounds(2);
        let hash = handler
            .hash(b"password", &options, &small_config(), BoundsMode::Strict)
            .unwrap();
        assert_eq!(hash, VECTOR);
    }

    #[test]
    fn test_parse_params() {
        let record = Argon2Handler::new().parse(VECTOR).unwrap();
        assert_eq!(record.variant(), Some("id"));
        assert_eq!(record.rounds(), Some(2));
        assert_eq!(record.params.get_int(MEMORY_COST), Some(256));
        assert_eq!(record.params.get_int(PARALLELISM), Some(1));
        assert_eq!(record.params.get_int(VERSION), Some(0x13));
        assert_eq!(record.salt, b"somesalt12345678");
    }

    #[test]
    fn test_version_0x10_omits_field() {
        let handler = Argon2Handler::new();
        let legacy = "$argon2id$m=256,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE";
        let record = handler.parse(legacy).unwrap();
        assert_eq!(record.params.get_int(VERSION), Some(0x10));
        assert_eq!(handler.format(&record).unwrap(), legacy);

        let policy = SchemePolicy {
            config: small_config(),
            deprecated: false,
        };
        assert!(handler.needs_update(&record, &policy));
    }

    #[test]
    fn test_needs_update_on_memory_cost() {
        let handler = Argon2Handler::new();
        let record = handler.parse(VECTOR).unwrap();
        let mut policy = SchemePolicy {
            config: small_config(),
            deprecated: false,
        };
        assert!(!handler.needs_update(&record, &policy));
        policy.config.memory_cost = Some(512);
        assert!(handler.needs_update(&record, &policy));
    }

    #[test]
    fn test_rejects_malformed() {
        let handler = Argon2Handler::new();
        for bad in [
            "$argon2x$v=19$m=256,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE",
            "$argon2id$v=18$m=256,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE",
            "$argon2id$v=19$t=2,m=256,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE",
            "$argon2id$v=19$m=256,t=0,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE",
            "$argon2id$v=19$m=4,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE",
            "$argon2id$v=19$m=256,t=2,p=1,x=3$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE",
            "$argon2id$v=19$m=256,t=2,p=1$c29tZQ$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE",
            "$argon2id$v=19$m=256,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDh+Fl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE=",
            "$argon2id$v=19$m=256,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA",
        ] {
            assert!(handler.parse(bad).unwrap_err().is_malformed(), "{}", bad);
        }
    }

    #[test]
    fn test_associated_data_round_trips() {
        let handler = Argon2Handler::new();
        let opts = VerifyOptions::default();
        let mut record = handler.parse(VECTOR).unwrap();
        record.params.insert(DATA, "c29tZWRhdGE");
        let secret = Secret {
            password: b"password",
            user: None,
            purpose: crate::handler::Purpose::Hash,
        };
        record.checksum = handler.checksum(&secret, &record).unwrap();
        // 关联数据参与摘要计算
        assert_ne!(record.checksum, handler.parse(VECTOR).unwrap().checksum);

        let hash = handler.format(&record).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=256,t=2,p=1,data=c29tZWRhdGE$c29tZXNhbHQxMjM0NTY3OA$"));
        let parsed = handler.parse(&hash).unwrap();
        assert_eq!(parsed.params.get_text(DATA), Some("c29tZWRhdGE"));
        assert_eq!(handler.format(&parsed).unwrap(), hash);
        assert!(handler.verify(b"password", &hash, &opts).unwrap());
        assert!(!handler.verify(b"passwore", &hash, &opts).unwrap());
    }

    #[test]
    fn test_parse_keyid_and_data() {
        let handler = Argon2Handler::new();
        let hash = "$argon2i$v=19$m=256,t=2,p=1,keyid=a2V5,data=c29tZWRhdGE$c29tZXNhbHQ$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE";
        let record = handler.parse(hash).unwrap();
        assert_eq!(record.variant(), Some("i"));
        assert_eq!(record.params.get_text(KEYID), Some("a2V5"));
        assert_eq!(record.params.get_text(DATA), Some("c29tZWRhdGE"));
        assert_eq!(record.salt, b"somesalt");
        assert_eq!(handler.format(&record).unwrap(), hash);
    }

    #[test]
    fn test_check_config_rejects_tiny_memory() {
        let handler = Argon2Handler::new();
        let mut config = handler.config().clone();
        config.memory_cost = Some(4);
        assert!(matches!(
            handler.check_config(&config),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(handler.check_config(handler.config()).is_ok());
    }
}
