//! Concurrent merge pipeline.
//!
//! One parser thread turns shard lines into bounded slots, one merger thread
//! folds them into the merged index. They share only the [`MergeCoordinator`]
//! and the slot buffer. A fatal error on either side cancels the run, wakes the
//! peer and is returned from [`ShardMerger::run`].

pub mod buffer;
pub mod coordinator;
pub mod merger;
pub mod producer;

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::MergeConfig;
use crate::error::{Result, ShardMergeError};
use crate::inverted::writer::IndexWriter;
use crate::pipeline::coordinator::MergeCoordinator;
use crate::pipeline::merger::{MergerStats, MergerWorker};
use crate::pipeline::producer::{ParserStats, ParserWorker};
use crate::shard::ShardCursorTable;

pub use buffer::{CancelToken, SlotReceiver, SlotSender, slot_buffer};

/// Outcome of a completed merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSummary {
    pub shards: usize,
    pub skipped_shards: Vec<PathBuf>,
    pub lines_parsed: u64,
    pub read_retries: u64,
    pub slots_produced: u64,
    pub slots_folded: u64,
    pub merge_rounds: u64,
    pub terms: usize,
    pub postings: usize,
    pub output_path: PathBuf,
    pub duration_ms: u64,
}

/// Merges every shard of a directory into one inverted index file.
#[derive(Debug, Clone)]
pub struct ShardMerger {
    config: MergeConfig,
}

impl ShardMerger {
    /// Create a merger for a validated configuration.
    pub fn new(config: MergeConfig) -> Result<Self> {
        config.validate()?;
        Ok(ShardMerger { config })
    }

    /// Configuration of this merger.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Discover the shards and run the parser and merger to completion.
    pub fn run(&self) -> Result<MergeSummary> {
        let table = ShardCursorTable::discover(
            &self.config.input_dir,
            Some(self.config.output_path.as_path()),
        )?;
        self.run_with(table)
    }

    /// Run the pipeline over an explicit shard table.
    pub fn run_with(&self, table: ShardCursorTable) -> Result<MergeSummary> {
        let start = Instant::now();
        let shards = table.len();
        info!(
            "Merging {} shards from {} (buffer capacity {}, slot capacity {})",
            shards,
            self.config.input_dir.display(),
            self.config.buffer_capacity,
            self.config.slot_capacity
        );

        let (coordinator, sender, receiver) =
            MergeCoordinator::with_buffer(table, self.config.buffer_capacity);
        let parser = ParserWorker::new(
            &coordinator,
            sender,
            self.config.slot_capacity,
            self.config.read_failure_policy,
        );
        let merger = MergerWorker::new(
            &coordinator,
            receiver,
            IndexWriter::new(&self.config.output_path),
        );

        let (parsed, merged) = thread::scope(|scope| {
            let parser_handle = thread::Builder::new()
                .name("shard-parser".to_string())
                .spawn_scoped(scope, move || parser.run());
            let merger_handle = thread::Builder::new()
                .name("shard-merger".to_string())
                .spawn_scoped(scope, move || merger.run());

            if parser_handle.is_err() || merger_handle.is_err() {
                coordinator.cancel("failed to spawn worker thread");
            }
            (
                join_worker("parser", parser_handle),
                join_worker("merger", merger_handle),
            )
        });

        let (parser_stats, merger_stats) = pick_outcome(parsed, merged)?;
        let summary = MergeSummary {
            shards,
            skipped_shards: parser_stats.skipped_shards,
            lines_parsed: parser_stats.lines_parsed,
            read_retries: parser_stats.read_retries,
            slots_produced: parser_stats.slots_produced,
            slots_folded: merger_stats.slots_folded,
            merge_rounds: merger_stats.rounds,
            terms: merger_stats.terms,
            postings: merger_stats.postings,
            output_path: self.config.output_path.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Merged {} terms from {} shards into {} in {}ms",
            summary.terms,
            summary.shards,
            summary.output_path.display(),
            summary.duration_ms
        );
        Ok(summary)
    }
}

fn join_worker<T>(
    name: &str,
    handle: std::io::Result<thread::ScopedJoinHandle<'_, Result<T>>>,
) -> Result<T> {
    let handle = handle.map_err(|e| {
        ShardMergeError::ThreadJoin(format!("failed to spawn {name} worker: {e}"))
    })?;
    handle
        .join()
        .map_err(|_| ShardMergeError::ThreadJoin(format!("{name} worker panicked")))?
}

/// Prefer the root cause over the cancellation it caused in the peer.
fn pick_outcome(
    parsed: Result<ParserStats>,
    merged: Result<MergerStats>,
) -> Result<(ParserStats, MergerStats)> {
    match (parsed, merged) {
        (Ok(p), Ok(m)) => Ok((p, m)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(p), Err(m)) => {
            if p.is_cancelled() && !m.is_cancelled() {
                Err(m)
            } else {
                Err(p)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_run_end_to_end() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), "apple,2,d1,d3\ncherry,1,d5\n").unwrap();
        fs::write(dir.path().join("b"), "apple,1,d2\nbanana,1,d4\n").unwrap();
        let output = dir.path().join("inverted_index.txt");

        let config = MergeConfig::new(dir.path()).with_output_path(&output);
        let summary = ShardMerger::new(config).unwrap().run().unwrap();

        assert_eq!(summary.shards, 2);
        assert_eq!(summary.terms, 3);
        assert_eq!(summary.postings, 5);
        assert_eq!(summary.slots_produced, summary.slots_folded);
        assert!(summary.merge_rounds >= 1 && summary.merge_rounds <= summary.slots_folded);
        assert_eq!(summary.read_retries, 0);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "apple,3,d1,d2,d3\nbanana,1,d4\ncherry,1,d5\n"
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MergeConfig::new(".").with_buffer_capacity(0);
        assert!(ShardMerger::new(config).is_err());
    }

    #[test]
    fn test_pick_outcome_prefers_root_cause() {
        let root = ShardMergeError::format("a", 1, "bad");
        let echo = ShardMergeError::cancelled("bad");

        let picked = pick_outcome(Err(echo), Err(root)).unwrap_err();
        assert!(matches!(picked, ShardMergeError::Format { .. }));
    }
}
