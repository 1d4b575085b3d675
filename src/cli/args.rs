//! Command line argument parsing for the shard-merge CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::{MergeConfig, ReadFailurePolicy};
use crate::error::Result;

/// shard-merge - Merge inverted index shards into one sorted index
#[derive(Parser, Debug, Clone)]
#[command(name = "shard-merge")]
#[command(about = "Merge pre-partitioned inverted index shards into one sorted index")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct ShardMergeArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl ShardMergeArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Merge every shard of a directory into one index file
    Merge(MergeArgs),

    /// Check every shard line without writing an index
    Validate(ValidateArgs),
}

/// Arguments for merging shards
#[derive(Parser, Debug, Clone)]
pub struct MergeArgs {
    /// Directory holding the shard files
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Output file for the merged index
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Slots held in the buffer before the parser blocks
    #[arg(long, value_name = "N")]
    pub buffer_capacity: Option<usize>,

    /// Distinct terms per slot
    #[arg(long, value_name = "N")]
    pub slot_capacity: Option<usize>,

    /// What to do when a shard cannot be read
    #[arg(long, value_name = "POLICY")]
    pub on_read_error: Option<ReadErrorMode>,

    /// Attempts before giving up with --on-read-error retry
    #[arg(long, default_value = "3")]
    pub retry_attempts: u32,

    /// Base backoff between retries in milliseconds
    #[arg(long, default_value = "100")]
    pub retry_backoff_ms: u64,

    /// JSON configuration file; flags override its values
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

impl MergeArgs {
    /// Build the run configuration from the optional config file and flags.
    pub fn to_config(&self) -> Result<MergeConfig> {
        let mut config = match &self.config {
            Some(path) => MergeConfig::from_json_file(path)?,
            None => MergeConfig::default(),
        };
        config.input_dir = self.input_dir.clone();
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        if let Some(capacity) = self.slot_capacity {
            config.slot_capacity = capacity;
        }
        if let Some(mode) = self.on_read_error {
            config.read_failure_policy = match mode {
                ReadErrorMode::Abort => ReadFailurePolicy::Abort,
                ReadErrorMode::Skip => ReadFailurePolicy::Skip,
                ReadErrorMode::Retry => ReadFailurePolicy::Retry {
                    max_attempts: self.retry_attempts,
                    backoff_ms: self.retry_backoff_ms,
                },
            };
        }
        config.validate()?;
        Ok(config)
    }
}

/// Read failure handling selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorMode {
    /// Abort the run
    Abort,
    /// Drop the rest of the shard with a warning
    Skip,
    /// Retry with backoff
    Retry,
}

/// Arguments for shard validation
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Directory holding the shard files
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_merge_args() {
        let args = ShardMergeArgs::parse_from([
            "shard-merge",
            "-vv",
            "merge",
            "shards",
            "--output",
            "out.txt",
            "--buffer-capacity",
            "8",
            "--on-read-error",
            "retry",
            "--retry-attempts",
            "4",
        ]);
        assert_eq!(args.verbosity(), 2);

        let Command::Merge(merge) = args.command else {
            panic!("expected merge command");
        };
        let config = merge.to_config().unwrap();
        assert_eq!(config.input_dir, PathBuf::from("shards"));
        assert_eq!(config.output_path, PathBuf::from("out.txt"));
        assert_eq!(config.buffer_capacity, 8);
        assert_eq!(config.slot_capacity, 5);
        assert_eq!(
            config.read_failure_policy,
            ReadFailurePolicy::Retry {
                max_attempts: 4,
                backoff_ms: 100
            }
        );
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let args = ShardMergeArgs::parse_from(["shard-merge", "-q", "-v", "validate", "shards"]);
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_invalid_capacity_rejected() {
        let args =
            ShardMergeArgs::parse_from(["shard-merge", "merge", "shards", "--slot-capacity", "0"]);
        let Command::Merge(merge) = args.command else {
            panic!("expected merge command");
        };
        assert!(merge.to_config().is_err());
    }
}
