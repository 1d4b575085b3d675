//! Error types for shard merging.
//!
//! All failures of a merge run are represented by [`ShardMergeError`]. A
//! malformed shard line is fatal to the run and always carries the shard path
//! and the 1-based line number so the offending input can be located.
//!
//! # Examples
//!
//! ```
//! use shard_merge::error::{ShardMergeError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ShardMergeError::invalid_config("buffer capacity must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for merge operations.
#[derive(Error, Debug)]
pub enum ShardMergeError {
    /// I/O errors outside of shard reads and output writes (directory listing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A shard line does not match `term,count,id_1,...,id_count`.
    #[error("Format error in {} at line {line}: {message}", .shard.display())]
    Format {
        shard: PathBuf,
        line: usize,
        message: String,
    },

    /// Reading a shard failed.
    #[error("Failed to read {} at line {line}: {source}", .shard.display())]
    ShardRead {
        shard: PathBuf,
        line: usize,
        #[source]
        source: io::Error,
    },

    /// Writing the merged index failed.
    #[error("Failed to write merged index to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was cancelled because a peer worker failed.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Thread join errors
    #[error("Thread join error: {0}")]
    ThreadJoin(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with ShardMergeError.
pub type Result<T> = std::result::Result<T, ShardMergeError>;

impl ShardMergeError {
    /// Create a new format error for a shard line.
    pub fn format<P: Into<PathBuf>, S: Into<String>>(shard: P, line: usize, msg: S) -> Self {
        ShardMergeError::Format {
            shard: shard.into(),
            line,
            message: msg.into(),
        }
    }

    /// Create a new shard read error.
    pub fn shard_read<P: Into<PathBuf>>(shard: P, line: usize, source: io::Error) -> Self {
        ShardMergeError::ShardRead {
            shard: shard.into(),
            line,
            source,
        }
    }

    /// Create a new output write error.
    pub fn write<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        ShardMergeError::Write {
            path: path.into(),
            source,
        }
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        ShardMergeError::Cancelled(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        ShardMergeError::InvalidConfig(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ShardMergeError::Other(msg.into())
    }

    /// Whether this error is only the echo of a failure in the peer worker.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShardMergeError::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = ShardMergeError::format("/data/a.txt", 3, "count 2 but 1 ids");
        assert_eq!(
            error.to_string(),
            "Format error in /data/a.txt at line 3: count 2 but 1 ids"
        );

        let error = ShardMergeError::invalid_config("slot capacity must be positive");
        assert_eq!(
            error.to_string(),
            "Invalid configuration: slot capacity must be positive"
        );

        let error = ShardMergeError::cancelled("producer failed");
        assert!(error.is_cancelled());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let merge_error = ShardMergeError::from(io_error);

        match merge_error {
            ShardMergeError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }
}
