//! Context 配置
//!
//! [`ContextConfig`] 描述启用哪些算法、默认算法、弃用集合以及每个算法的参数覆盖。
//! 可以用 `with_*` 方法逐步构建，也可以从 TOML 加载：
//!
//! ```toml
//! schemes = ["pbkdf2_sha256", "md5_crypt"]
//! default = "pbkdf2_sha256"
//! deprecated = ["md5_crypt"]
//! bounds = "strict"
//!
//! [overrides.pbkdf2_sha256]
//! min_rounds = 5000
//! ```
//!
//! 所有校验都在 [`Context::new`](super::Context::new) 中一次完成。

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::Context;
use crate::error::{ConfigError, Result};
use crate::handler::{BoundsMode, SchemeConfig};

/// Context 的构造输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// 启用的算法，顺序即识别优先级
    pub schemes: Vec<String>,

    /// 新哈希使用的算法；缺省为 `schemes` 的第一项
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// 弃用的算法：仍可验证，但总是需要升级
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub deprecated: BTreeSet<String>,

    /// rounds 越界时的处理方式
    #[serde(default)]
    pub bounds: BoundsMode,

    /// 每个算法的参数覆盖
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, SchemeOverride>,
}

impl ContextConfig {
    /// 以给定算法列表创建配置
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// 追加一个算法
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.schemes.push(scheme.into());
        self
    }

    /// 设置默认算法
    pub fn with_default(mut self, scheme: impl Into<String>) -> Self {
        self.default = Some(scheme.into());
        self
    }

    /// 将算法标记为弃用
    pub fn with_deprecated(mut self, scheme: impl Into<String>) -> Self {
        self.deprecated.insert(scheme.into());
        self
    }

    /// 弃用除默认算法之外的所有算法
    pub fn deprecate_others(mut self) -> Self {
        let default = self.effective_default().map(str::to_string);
        self.deprecated = self
            .schemes
            .iter()
            .filter(|s| Some(s.as_str()) != default.as_deref())
            .cloned()
            .collect();
        self
    }

    /// 设置某个算法的参数覆盖
    pub fn with_override(mut self, scheme: impl Into<String>, value: SchemeOverride) -> Self {
        self.overrides.insert(scheme.into(), value);
        self
    }

    /// 设置某个算法的最小 rounds，低于它的哈希需要升级
    pub fn with_min_rounds(mut self, scheme: impl Into<String>, rounds: u32) -> Self {
        self.overrides.entry(scheme.into()).or_default().min_rounds = Some(rounds);
        self
    }

    /// 设置 rounds 越界时的处理方式
    pub fn with_bounds(mut self, bounds: BoundsMode) -> Self {
        self.bounds = bounds;
        self
    }

    /// 校验并构造 [`Context`]
    pub fn build(self) -> Result<Context> {
        Context::new(self)
    }

    /// 实际生效的默认算法
    pub fn effective_default(&self) -> Option<&str> {
        self.default
            .as_deref()
            .or_else(|| self.schemes.first().map(String::as_str))
    }

    /// 从 TOML 字符串加载
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// 序列化为 TOML 字符串
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }
}

// ============================================================================
// 单个算法的覆盖
// ============================================================================

/// 单个算法的参数覆盖，未设置的字段沿用算法默认值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemeOverride {
    /// 策略最小 rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rounds: Option<u32>,
    /// 策略最大 rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    /// 新哈希使用的 rounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rounds: Option<u32>,
    /// 新生成 salt 的长度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_size: Option<usize>,
    /// 新哈希使用的变体
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// 内存成本（KiB），仅 argon2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_cost: Option<u32>,
    /// 并行度，仅 argon2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
}

impl SchemeOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_rounds(mut self, rounds: u32) -> Self {
        self.min_rounds = Some(rounds);
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn with_default_rounds(mut self, rounds: u32) -> Self {
        self.default_rounds = Some(rounds);
        self
    }

    pub fn with_salt_size(mut self, size: usize) -> Self {
        self.salt_size = Some(size);
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_memory_cost(mut self, kib: u32) -> Self {
        self.memory_cost = Some(kib);
        self
    }

    pub fn with_parallelism(mut self, lanes: u32) -> Self {
        self.parallelism = Some(lanes);
        self
    }

    /// 将覆盖应用到算法的默认配置上
    ///
    /// 只设置了 `min_rounds`（或 `max_rounds`）时，默认 rounds 会被推到范围内。
    pub fn apply(&self, scheme: &str, base: &SchemeConfig) -> Result<SchemeConfig> {
        let invalid = |field: &str, message: String| ConfigError::InvalidValue {
            key: format!("overrides.{}.{}", scheme, field),
            message,
        };
        let mut config = base.clone();

        let touches_rounds =
            self.min_rounds.is_some() || self.max_rounds.is_some() || self.default_rounds.is_some();
        match config.rounds.as_mut() {
            None if touches_rounds => {
                return Err(invalid("rounds", "scheme has a fixed cost".to_string()).into());
            }
            None => {}
            Some(rounds) => {
                for (field, value) in [
                    ("min_rounds", self.min_rounds),
                    ("max_rounds", self.max_rounds),
                    ("default_rounds", self.default_rounds),
                ] {
                    if let Some(value) = value
                        && !(rounds.hard_min..=rounds.hard_max).contains(&value)
                    {
                        return Err(invalid(
                            field,
                            format!(
                                "{} outside {}..={}",
                                value, rounds.hard_min, rounds.hard_max
                            ),
                        )
                        .into());
                    }
                }
                if let Some(min) = self.min_rounds {
                    rounds.min = min;
                }
                if let Some(max) = self.max_rounds {
                    rounds.max = max;
                }
                match self.default_rounds {
                    Some(value) => rounds.default = value,
                    None if rounds.min <= rounds.max => {
                        rounds.default = rounds.default.clamp(rounds.min, rounds.max);
                    }
                    None => {}
                }
                if !rounds.is_consistent() {
                    return Err(invalid(
                        "rounds",
                        format!(
                            "expected min_rounds <= default_rounds <= max_rounds, got {} / {} / {}",
                            rounds.min, rounds.default, rounds.max
                        ),
                    )
                    .into());
                }
            }
        }

        if let Some(size) = self.salt_size {
            if !(base.min_salt_size..=base.max_salt_size).contains(&size) {
                return Err(invalid(
                    "salt_size",
                    format!(
                        "{} outside {}..={}",
                        size, base.min_salt_size, base.max_salt_size
                    ),
                )
                .into());
            }
            config.salt_size = size;
        }

        if let Some(variant) = &self.variant {
            let known = base
                .variants
                .iter()
                .find(|v| **v == variant.as_str())
                .ok_or_else(|| invalid("variant", format!("unsupported variant {:?}", variant)))?;
            config.default_variant = Some(*known);
        }

        for (field, value, slot) in [
            ("memory_cost", self.memory_cost, &mut config.memory_cost),
            ("parallelism", self.parallelism, &mut config.parallelism),
        ] {
            if let Some(value) = value {
                if slot.is_none() {
                    return Err(invalid(field, "not supported by this scheme".to_string()).into());
                }
                *slot = Some(value);
            }
        }

        Ok(config)
    }
}
