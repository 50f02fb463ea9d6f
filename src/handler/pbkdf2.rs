//! PBKDF2-HMAC 系列
//!
//! 格式：`$pbkdf2-sha256$<rounds>$<salt>$<checksum>`，salt 与摘要使用
//! ab64（标准 base64，以 `.` 代替 `+`，无填充）。rounds 为线性成本。

use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::codec::{Alphabet, HashRecord, McfHash, ROUNDS, decode_field, parse_decimal};
use crate::error::{Error, MalformedHashError, Result};
use crate::handler::{
    BoundsMode, Handler, HashOptions, RoundsCost, RoundsPolicy, SchemeConfig, Secret,
    resolve_rounds,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prf {
    Sha1,
    Sha256,
    Sha512,
}

impl Prf {
    fn digest_size(self) -> usize {
        match self {
            Prf::Sha1 => 20,
            Prf::Sha256 => 32,
            Prf::Sha512 => 64,
        }
    }
}

/// PBKDF2 处理器
#[derive(Debug, Clone)]
pub struct Pbkdf2Handler {
    name: &'static str,
    markers: &'static [&'static str],
    prf: Prf,
    config: SchemeConfig,
}

impl Pbkdf2Handler {
    fn build(
        name: &'static str,
        markers: &'static [&'static str],
        prf: Prf,
        default_rounds: u32,
    ) -> Self {
        Self {
            name,
            markers,
            prf,
            config: SchemeConfig::fixed(16)
                .with_salt_range(0, 1024)
                .with_rounds(RoundsPolicy::new(
                    RoundsCost::Linear,
                    1,
                    u32::MAX,
                    default_rounds,
                )),
        }
    }

    /// `$pbkdf2$`，HMAC-SHA1
    pub fn sha1() -> Self {
        Self::build("pbkdf2_sha1", &["$pbkdf2$"], Prf::Sha1, 131_000)
    }

    /// `$pbkdf2-sha256$`
    pub fn sha256() -> Self {
        Self::build("pbkdf2_sha256", &["$pbkdf2-sha256$"], Prf::Sha256, 29_000)
    }

    /// `$pbkdf2-sha512$`
    pub fn sha512() -> Self {
        Self::build("pbkdf2_sha512", &["$pbkdf2-sha512$"], Prf::Sha512, 25_000)
    }

    fn marker(&self) -> &'static str {
        self.markers[0]
    }
}

impl Handler for Pbkdf2Handler {
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
        if mcf.marker() != self.marker() {
            return Err(Error::malformed(self.name, "wrong marker"));
        }
        let fields = mcf.expect_fields(self.name, 3)?;
        let rounds = parse_decimal(self.name, fields[0], 1, u64::from(u32::MAX))?;

        let mut record = HashRecord::new(self.name, self.marker());
        record.params.insert(ROUNDS, rounds);
        record.salt = decode_field(Alphabet::Ab64, self.name, "salt", fields[1])?;
        record.checksum = decode_field(Alphabet::Ab64, self.name, "checksum", fields[2])?;
        if record.checksum.len() != self.prf.digest_size() {
            return Err(MalformedHashError::InvalidLength {
                scheme: self.name.to_string(),
                field: "checksum",
                found: fields[2].len(),
            }
            .into());
        }
        record.raw = hash.to_string();
        Ok(record)
    }

    fn format(&self, record: &HashRecord) -> Result<String> {
        let rounds = record
            .rounds()
            .ok_or_else(|| Error::malformed(self.name, "missing rounds"))?;
        Ok(format!(
            "{}{}${}${}",
            self.marker(),
            rounds,
            Alphabet::Ab64.encode(&record.salt),
            Alphabet::Ab64.encode(&record.checksum)
        ))
    }

    fn settings(
        &self,
        options: &HashOptions,
        config: &SchemeConfig,
        mode: BoundsMode,
    ) -> Result<HashRecord> {
        let rounds = resolve_rounds(self.name, options.rounds, config, mode)?
            .ok_or_else(|| Error::malformed(self.name, "missing rounds"))?;
        let mut record = HashRecord::new(self.name, self.marker());
        record.params.insert(ROUNDS, rounds);
        record.salt = self.resolve_salt(options.salt.as_deref(), config)?;
        Ok(record)
    }

    fn checksum(&self, secret: &Secret<'_>, record: &HashRecord) -> Result<Vec<u8>> {
        let rounds = record
            .rounds()
            .and_then(|r| u32::try_from(r).ok())
            .ok_or_else(|| Error::malformed(self.name, "missing rounds"))?;
        let mut out = vec![0u8; self.prf.digest_size()];
        match self.prf {
            Prf::Sha1 => pbkdf2::pbkdf2_hmac::<Sha1>(secret.password, &record.salt, rounds, &mut out),
            Prf::Sha256 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(secret.password, &record.salt, rounds, &mut out)
            }
            Prf::Sha512 => {
                pbkdf2::pbkdf2_hmac::<Sha512>(secret.password, &record.salt, rounds, &mut out)
            }
        }
        Ok(out)
    }
}
