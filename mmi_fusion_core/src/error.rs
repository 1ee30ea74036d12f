//! Error taxonomy for catalog loading and event normalization.
//!
//! Configuration errors are fatal at startup. A rejected event is a terminal,
//! per-event outcome: the caller logs and counts it, nothing is retried.

use thiserror::Error;

/// Catalog configuration could not be loaded or failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate modality id: {0}")]
    DuplicateModality(String),

    #[error("duplicate modality wire label: {0}")]
    DuplicateLabel(String),

    #[error("duplicate output id: {0}")]
    DuplicateOutput(String),

    #[error("modality {modality} has a negative validity window ({window_ms}ms)")]
    NegativeWindow { modality: String, window_ms: i64 },

    #[error("output {action} references unknown modality {modality}")]
    UnknownModality { action: String, modality: String },

    /// A complementary set is empty, or a bare `redundant` rule matched no modality.
    #[error("output {0} is fed by no modality")]
    EmptyRule(String),

    #[error("modality {0} does not feed any enabled output")]
    UnroutedModality(String),

    #[error("output {action} has an invalid fusion rule {rule:?}: {reason}")]
    InvalidRule {
        action: String,
        rule: String,
        #[source]
        reason: RuleParseError,
    },

    #[error("catalog parse error: {0}")]
    Parse(String),

    #[error("cannot read catalog file {path}: {message}")]
    Io { path: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Rule text that is neither `redundant[:{..}]` nor `complementary:{..}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("unknown rule kind {0:?}")]
    UnknownKind(String),

    #[error("complementary rule without a modality list")]
    MissingModalities,
}

/// A raw event the normalizer refused to turn into evidence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectedEvent {
    #[error("unknown modality event: {0}")]
    UnknownModality(String),
}
