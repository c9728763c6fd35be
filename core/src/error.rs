use crate::BatchId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Missing or unreadable batch file, or a document record that does not parse.
    #[error("batch #{batch}: {reason}")]
    Input { batch: BatchId, reason: String },

    /// Statistics and index disagree (missing IDF, vocabulary size mismatch, ...).
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl IndexError {
    pub fn input(batch: BatchId, reason: impl Into<String>) -> Self {
        IndexError::Input { batch, reason: reason.into() }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        IndexError::Io { path: path.as_ref().display().to_string(), source }
    }

    pub fn json(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        IndexError::Json { path: path.as_ref().display().to_string(), source }
    }
}
