//! Analysis configuration: parsing, validation, loading
//!
//! Configuration documents arrive as JSON or YAML. They are deserialized into
//! a permissive wire shape and then validated into [`AnalysisConfig`], which
//! is immutable for the duration of a run.

mod raw;
mod types;

pub use types::{AnalysisConfig, FilterOption, UnitFilter, UnitOfAnalysis};

use crate::equivalence::UnknownEquivalenceTest;
use raw::RawAnalysisConfig;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required key: {0}")]
    MissingKey(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error(transparent)]
    UnknownEquivalence(#[from] UnknownEquivalenceTest),

    #[error("Invalid filter option: {0}")]
    UnknownFilterOption(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisConfig {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawAnalysisConfig = serde_json::from_str(input)?;
        raw.validate()
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawAnalysisConfig = serde_yaml::from_str(input)?;
        raw.validate()
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let raw: RawAnalysisConfig = serde_json::from_value(value)?;
        raw.validate()
    }

    /// Load a configuration file, picking YAML for `.yaml`/`.yml` and JSON otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }
}
