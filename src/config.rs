//! Training and codec configuration.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Vocabulary training parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VocabConfig {
    /// Minimum corpus count for a token to enter the vocabulary
    #[serde(default = "default_min_frequency")]
    pub min_frequency: u64,

    /// Maximum number of symbols, escape included
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            min_frequency: default_min_frequency(),
            max_size: default_max_size(),
        }
    }
}

impl VocabConfig {
    /// Check that the parameters can produce a vocabulary.
    pub fn validate(&self) -> Result<()> {
        if self.min_frequency == 0 {
            return Err(Error::InvalidConfig("min_frequency must be at least 1".into()));
        }
        if self.max_size == 0 {
            return Err(Error::InvalidConfig(
                "max_size must leave room for the escape symbol".into(),
            ));
        }
        Ok(())
    }
}

/// What the codec does with a token that is not in the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapePolicy {
    /// Code the escape symbol and carry the raw bytes in the sidecar.
    #[default]
    Escape,
    /// Frozen model: fail with `Error::UnknownToken`.
    Reject,
}

/// Codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct CodecConfig {
    /// Parameters used by training and refits
    #[serde(default)]
    pub vocab: VocabConfig,

    /// Out-of-vocabulary handling
    #[serde(default)]
    pub escape: EscapePolicy,
}

impl CodecConfig {
    /// Parse a configuration from JSON, filling unset fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.vocab.validate()?;
        Ok(config)
    }
}

fn default_min_frequency() -> u64 {
    2
}

fn default_max_size() -> usize {
    16384
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.vocab.min_frequency, 2);
        assert_eq!(config.vocab.max_size, 16384);
        assert_eq!(config.escape, EscapePolicy::Escape);
    }

    #[test]
    fn test_from_json_partial() {
        let config = CodecConfig::from_json(r#"{"escape": "reject", "vocab": {"max_size": 64}}"#)
            .unwrap();
        assert_eq!(config.escape, EscapePolicy::Reject);
        assert_eq!(config.vocab.max_size, 64);
        assert_eq!(config.vocab.min_frequency, 2);
        assert_eq!(CodecConfig::from_json("{}").unwrap(), CodecConfig::default());
    }

    #[test]
    fn test_validation() {
        let res = CodecConfig::from_json(r#"{"vocab": {"min_frequency": 0}}"#);
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
        let bad = VocabConfig {
            min_frequency: 1,
            max_size: 0,
        };
        assert!(bad.validate().is_err());
    }
}
