//! Crate-level error type.
//!
//! Only configuration and I/O problems surface as errors. Problems with
//! individual input files (unparsable sources, unmapped or malformed
//! change ranges) are reported as [`crate::AnalysisDiagnostic`] values so
//! that a partial report is always producible.

use std::path::PathBuf;

/// Result alias used by every fallible public operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an analysis before or while it is set up.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Depth bound was negative
    #[error("invalid depth {0}: depth must be a non-negative integer")]
    InvalidDepth(i64),

    /// A changed range was constructed with `start > end` or a zero line
    #[error("invalid changed range {start}-{end} in {}", file.display())]
    InvalidRange {
        /// File the range refers to
        file: PathBuf,
        /// First changed line (1-indexed)
        start: usize,
        /// Last changed line (1-indexed, inclusive)
        end: usize,
    },

    /// Configuration could not be read or decoded
    #[error("config error in {}: {message}", path.display())]
    Config {
        /// Config file path, or `<inline>` for string input
        path: PathBuf,
        /// Decoder or reader message
        message: String,
    },

    /// The tree-sitter C grammar could not be loaded
    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    /// Directory walk failed at the root
    #[error("cannot scan {}: {message}", root.display())]
    Walk {
        /// Root that was being scanned
        root: PathBuf,
        /// Underlying walkdir message
        message: String,
    },

    /// Underlying I/O error
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config {
            path: PathBuf::from("<inline>"),
            message: err.to_string(),
        }
    }
}
