//! Crate-wide error type and `Result` alias.
//!
//! Every failure is fatal to the operation that raised it; nothing is
//! retried and there is no partial-success mode. A build either finishes
//! with all nodes registered or it fails.

use thiserror::Error;

/// Errors surfaced by index construction, querying, and persistence.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Bad or unknown parameter, or a parameter outside its valid range.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested operation is not provided by this index.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// An internal invariant does not hold. Indicates a bug or a graph that
    /// was corrupted outside this crate's control.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The index file does not describe the dataset it is being loaded
    /// against. The dataset changed since the index was saved.
    #[error("index/dataset mismatch: {0}")]
    DataMutation(String),

    /// The index file is syntactically malformed.
    #[error("malformed index file (line {line}): {msg}")]
    Format { line: usize, msg: String },

    /// Underlying I/O failure while reading or writing an index file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
