//! Error types for Kiln

use thiserror::Error;

/// The main error type for Kiln operations
#[derive(Debug, Error)]
pub enum KilnError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("No matching sources for {pipeline} pipeline")]
    NoMatchingSources { pipeline: String },

    #[error("Importer failure for '{path}': {reason}")]
    ImporterFailure { path: String, reason: String },

    #[error("Audio transcode error for '{path}': {reason}")]
    AudioTranscodeError { path: String, reason: String },

    #[error("Invalid transform at index {index}: {reason}")]
    InvalidTransform { index: usize, reason: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid material override filter at index {index}: ByName filter requires a non-empty name")]
    InvalidOverrideFilter { index: usize },

    #[error("collider_type is set but the collider is None")]
    ColliderTypeWithoutCollider,

    #[error("Aggregate build failed (failed sources: {}): {reason}", failed.join(", "))]
    PartialAggregateFailure { failed: Vec<String>, reason: String },

    #[error("Texture error: {0}")]
    TextureError(String),

    #[error("Asset error: {0}")]
    AssetError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),

    #[error("Build cancelled")]
    Cancelled,
}

impl KilnError {
    /// Errors raised while validating a config, before any source is touched
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            KilnError::ConfigError(_)
                | KilnError::InvalidTransform { .. }
                | KilnError::InvalidOverrideFilter { .. }
                | KilnError::ColliderTypeWithoutCollider
        )
    }
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        KilnError::JsonError(err.to_string())
    }
}

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        KilnError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for KilnError {
    fn from(err: toml::ser::Error) -> Self {
        KilnError::TomlSerError(err.to_string())
    }
}
