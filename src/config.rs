//! Engine configuration: attention constants, eviction watermarks, and the
//! protected-atom policy.
//!
//! All fields have working defaults, so `SpaceConfig::default()` is a usable
//! configuration. Hosts that want to tune the attention economy load overrides
//! from TOML:
//!
//! ```toml
//! high_water = 18000
//! target_factor = 0.8
//! protected_symbols = ["Inheritance", "Implication"]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Result type for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration for an [`AtomSpace`](crate::space::AtomSpace).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Sensitivity constant `k` in `confidence = evidence / (evidence + k)`
    /// (default: 1.0).
    pub sensitivity: f32,

    /// Short-term importance assigned to a freshly interned atom (default: 0.4).
    pub initial_sti: f32,
    /// Long-term importance assigned to a freshly interned atom (default: 0.05).
    pub initial_lti: f32,

    /// Multiplicative short-term decay per maintenance tick (default: 0.90).
    pub sti_decay: f32,
    /// Multiplicative long-term decay per maintenance tick (default: 0.995).
    pub lti_decay: f32,
    /// Amount added to LTI when the probabilistic STI→LTI feed fires
    /// (default: 0.05).
    pub lti_feed: f32,

    /// Additive STI boost when an atom is read (default: 0.05).
    pub boost_access: f32,
    /// Additive STI boost when an atom's truth is revised (default: 0.20).
    pub boost_revision: f32,
    /// Additive STI boost on a perception event (default: 0.30).
    pub boost_perception: f32,
    /// Additive STI boost when an atom becomes a chaining goal (default: 0.25).
    pub boost_goal: f32,

    /// Weight of the (time-discounted) short-term component in the eviction
    /// score (default: 0.6).
    pub sti_weight: f32,
    /// Weight of the long-term component in the eviction score (default: 0.4).
    pub lti_weight: f32,
    /// Rate at which the short-term component is discounted per tick of age:
    /// `1 / (1 + age * recency_rate)` (default: 0.1).
    pub recency_rate: f32,

    /// Eviction starts when the space holds more than this many atoms
    /// (default: 100_000).
    pub high_water: usize,
    /// One sweep evicts down toward `high_water * target_factor`
    /// (default: 0.8).
    pub target_factor: f32,
    /// Atoms scoring below this floor are eviction candidates even when the
    /// space is under the high-water mark (default: 0.02).
    pub score_floor: f32,
    /// Fraction of tracked atoms that must sit below `score_floor` before the
    /// low-score trigger fires (default: 0.25).
    pub low_score_fraction: f32,

    /// Relation tags whose expressions canonicalize child order on interning.
    pub commutative_tags: HashSet<String>,
    /// Reserved symbol names that eviction must never remove. Variables are
    /// always protected regardless of this list.
    pub protected_symbols: HashSet<String>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            initial_sti: 0.4,
            initial_lti: 0.05,
            sti_decay: 0.90,
            lti_decay: 0.995,
            lti_feed: 0.05,
            boost_access: 0.05,
            boost_revision: 0.20,
            boost_perception: 0.30,
            boost_goal: 0.25,
            sti_weight: 0.6,
            lti_weight: 0.4,
            recency_rate: 0.1,
            high_water: 100_000,
            target_factor: 0.8,
            score_floor: 0.02,
            low_score_fraction: 0.25,
            commutative_tags: ["Similarity", "And", "Or"]
                .into_iter()
                .map(String::from)
                .collect(),
            protected_symbols: [
                "Inheritance",
                "Implication",
                "Similarity",
                "And",
                "Or",
                "Not",
                "Rule",
                "ForAll",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl SpaceConfig {
    /// Parse a config from a TOML string. Absent fields keep their defaults.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io { source })?;
        Self::from_toml_str(&text)
    }

    /// Check field ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sensitivity <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "sensitivity",
                message: "must be > 0".into(),
            });
        }
        if self.high_water == 0 {
            return Err(ConfigError::InvalidValue {
                field: "high_water",
                message: "must be > 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.target_factor) || self.target_factor == 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "target_factor",
                message: "must be in (0, 1]".into(),
            });
        }
        for (field, value) in [
            ("sti_decay", self.sti_decay),
            ("lti_decay", self.lti_decay),
            ("low_score_fraction", self.low_score_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: "must be in [0, 1]".into(),
                });
            }
        }
        if self.sti_weight < 0.0 || self.lti_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "sti_weight/lti_weight",
                message: "must be >= 0".into(),
            });
        }
        Ok(())
    }

    /// Eviction target size for a sweep that fired.
    pub fn target_size(&self) -> usize {
        (self.high_water as f32 * self.target_factor) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SpaceConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_overrides_keep_defaults() {
        let config = SpaceConfig::from_toml_str("high_water = 500\ntarget_factor = 0.5").unwrap();
        assert_eq!(config.high_water, 500);
        assert_eq!(config.target_factor, 0.5);
        // Untouched fields keep defaults.
        assert_eq!(config.sensitivity, 1.0);
        assert!(config.protected_symbols.contains("Inheritance"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = SpaceConfig::from_toml_str("high_water = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn out_of_range_field_is_rejected() {
        let err = SpaceConfig::from_toml_str("target_factor = 1.5").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "target_factor",
                ..
            }
        ));
    }

    #[test]
    fn target_size_uses_factor() {
        let config = SpaceConfig {
            high_water: 18_000,
            target_factor: 0.8,
            ..Default::default()
        };
        assert_eq!(config.target_size(), 14_400);
    }
}
