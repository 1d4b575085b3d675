//! Configuration for a merge run.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardMergeError};

/// Default output file name.
pub const DEFAULT_OUTPUT_PATH: &str = "inverted_index.txt";

/// Default number of slots the buffer holds before the producer blocks.
pub const DEFAULT_BUFFER_CAPACITY: usize = 5;

/// Default number of distinct terms per slot.
pub const DEFAULT_SLOT_CAPACITY: usize = 5;

/// What the producer does when reading a shard fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "policy")]
pub enum ReadFailurePolicy {
    /// Abort the whole run.
    #[default]
    Abort,

    /// Mark the shard exhausted and drop its remaining lines.
    Skip,

    /// Reopen the shard and retry from the same cursor, sleeping
    /// `backoff_ms * attempt` between attempts.
    Retry { max_attempts: u32, backoff_ms: u64 },
}

/// Configuration for a merge run. Fixed once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Directory holding the shard files.
    pub input_dir: PathBuf,

    /// Path of the merged index.
    pub output_path: PathBuf,

    /// Slots held concurrently before the producer blocks.
    pub buffer_capacity: usize,

    /// Distinct terms collected into one slot.
    pub slot_capacity: usize,

    /// Behaviour on shard read failures.
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

impl MergeConfig {
    /// Create a configuration for the given input directory.
    pub fn new<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: MergeConfig = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Set the output path.
    pub fn with_output_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_path = path.into();
        self
    }

    /// Set the buffer capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the slot capacity.
    pub fn with_slot_capacity(mut self, capacity: usize) -> Self {
        self.slot_capacity = capacity;
        self
    }

    /// Set the read failure policy.
    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure_policy = policy;
        self
    }

    /// Check the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(ShardMergeError::invalid_config(
                "buffer capacity must be at least 1",
            ));
        }
        if self.slot_capacity == 0 {
            return Err(ShardMergeError::invalid_config(
                "slot capacity must be at least 1",
            ));
        }
        if let ReadFailurePolicy::Retry { max_attempts: 0, .. } = self.read_failure_policy {
            return Err(ShardMergeError::invalid_config(
                "retry policy needs at least one attempt",
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ShardMergeError::invalid_config("output path is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MergeConfig::default();
        assert_eq!(config.buffer_capacity, 5);
        assert_eq!(config.slot_capacity, 5);
        assert_eq!(config.output_path, PathBuf::from("inverted_index.txt"));
        assert_eq!(config.read_failure_policy, ReadFailurePolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacities() {
        let config = MergeConfig::new("shards").with_buffer_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(ShardMergeError::InvalidConfig(_))
        ));

        let config = MergeConfig::new("shards").with_slot_capacity(0);
        assert!(config.validate().is_err());

        let config = MergeConfig::new("shards").with_read_failure_policy(
            ReadFailurePolicy::Retry {
                max_attempts: 0,
                backoff_ms: 10,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"input_dir": "/tmp/shards", "buffer_capacity": 8,
                "read_failure_policy":
                    {{"policy": "retry", "max_attempts": 3, "backoff_ms": 50}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = MergeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/tmp/shards"));
        assert_eq!(config.buffer_capacity, 8);
        // Missing fields fall back to defaults.
        assert_eq!(config.slot_capacity, DEFAULT_SLOT_CAPACITY);
        assert_eq!(
            config.read_failure_policy,
            ReadFailurePolicy::Retry {
                max_attempts: 3,
                backoff_ms: 50
            }
        );
    }
}
