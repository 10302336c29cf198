use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogitError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unknown level: {0}")]
    InvalidLevel(String),

    #[error("Invalid path '{}': {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Refusing symlinked path '{}'", .0.display())]
    SymlinkedPath(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LogitResult<T> = std::result::Result<T, LogitError>;
