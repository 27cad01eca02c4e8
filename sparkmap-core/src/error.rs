//! Error types for the lineage engine.

use thiserror::Error;

/// Top-level extraction error. Only whole-run failures end up here; problems
/// with a single call node are reported as [`crate::extract::SkipReason`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("parse error: {0}")]
    Parse(#[from] AstError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from the parser front end.
#[derive(Debug, Error)]
pub enum AstError {
    #[error("syntax error at line {line}: {message}")]
    ParseError { line: usize, message: String },
    #[error("grammar could not be loaded: {0}")]
    GrammarLoad(String),
}

/// Errors while loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
