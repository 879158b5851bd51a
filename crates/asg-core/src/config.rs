//! Engine configuration.
//!
//! [`EngineConfig`] groups the tunables of similarity scoring, traversal and
//! the codec. Every section has defaults; a JSON file only needs to name the
//! values it changes. Unknown keys are rejected.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub similarity: SimilarityConfig,
    pub traversal: TraversalConfig,
    pub codec: CodecConfig,
}

/// Similarity scoring constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimilarityConfig {
    /// Floor of the score for two nodes of the same kind.
    pub minimum: f64,
    /// A string field scoring below this makes the whole result `0.0`.
    pub min_for_strings: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig {
            minimum: 0.1,
            min_for_strings: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraversalConfig {
    pub safe_mode: bool,
    pub skip_special_nodes: bool,
}

/// Which strings a save writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringSelection {
    /// Every non-temporary string.
    #[default]
    All,
    /// Strings referenced by live nodes, plus strings marked to save.
    Referenced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    pub strings: StringSelection,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        EngineConfig::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.similarity.minimum) {
            return Err(ConfigError::Invalid {
                key: "similarity.minimum",
                reason: format!("{} is outside [0, 1]", self.similarity.minimum),
            });
        }
        if !unit.contains(&self.similarity.min_for_strings) {
            return Err(ConfigError::Invalid {
                key: "similarity.min_for_strings",
                reason: format!("{} is outside [0, 1]", self.similarity.min_for_strings),
            });
        }
        Ok(())
    }
}
