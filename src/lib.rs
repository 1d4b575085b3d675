//! # Shard Merge
//!
//! Builds one global inverted index by merging pre-partitioned shard files.
//!
//! ## Features
//!
//! - One parser thread reading shards round-robin into bounded slots
//! - One merger thread folding slots into a sorted, deduplicated index
//! - Bounded slot buffer with cancellation, so a corrupted shard aborts the
//!   whole run instead of stalling it
//! - Atomic output through a temporary file and rename

pub mod cli;
pub mod config;
pub mod error;
pub mod inverted;
pub mod parser;
pub mod pipeline;
pub mod shard;

pub mod prelude {
    pub use crate::config::{MergeConfig, ReadFailurePolicy};
    pub use crate::error::{Result, ShardMergeError};
    pub use crate::inverted::{IndexWriter, MergedIndex, PostingList, Slot};
    pub use crate::pipeline::{MergeSummary, ShardMerger};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
