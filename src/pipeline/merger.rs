//! The merger worker.
//!
//! Drains the slot buffer, folds only the newly drained slots into its own
//! [`MergedIndex`], and writes the index once the parser has closed the buffer
//! with every shard exhausted.

use log::debug;

use crate::error::{Result, ShardMergeError};
use crate::inverted::merged::MergedIndex;
use crate::inverted::writer::IndexWriter;
use crate::pipeline::buffer::SlotReceiver;
use crate::pipeline::coordinator::MergeCoordinator;

/// Counters reported by the merger worker.
#[derive(Debug, Clone, Default)]
pub struct MergerStats {
    /// Slots folded into the index.
    pub slots_folded: u64,

    /// Drain rounds.
    pub rounds: u64,

    /// Distinct terms written.
    pub terms: usize,

    /// Postings written across all terms.
    pub postings: usize,
}

/// Single consumer of slots.
pub struct MergerWorker<'a> {
    coordinator: &'a MergeCoordinator,
    receiver: SlotReceiver,
    writer: IndexWriter,
    index: MergedIndex,
    stats: MergerStats,
}

impl<'a> MergerWorker<'a> {
    /// Create a merger worker writing through `writer`.
    pub fn new(
        coordinator: &'a MergeCoordinator,
        receiver: SlotReceiver,
        writer: IndexWriter,
    ) -> Self {
        MergerWorker {
            coordinator,
            receiver,
            writer,
            index: MergedIndex::new(),
            stats: MergerStats::default(),
        }
    }

    /// Run until the index is written. Any failure cancels the run so the
    /// parser stops as well.
    pub fn run(mut self) -> Result<MergerStats> {
        match self.merge() {
            Ok(()) => Ok(self.stats),
            Err(e) => {
                if !e.is_cancelled() {
                    self.coordinator.cancel(e.to_string());
                }
                Err(e)
            }
        }
    }

    fn merge(&mut self) -> Result<()> {
        while let Some(slots) = self.receiver.drain()? {
            self.stats.rounds += 1;
            self.stats.slots_folded += slots.len() as u64;
            for slot in slots {
                self.index.fold(slot);
            }
            debug!(
                "Round {}: {} slots folded, {} terms",
                self.stats.rounds,
                self.stats.slots_folded,
                self.index.len()
            );
        }

        // The buffer is closed and empty. It only closes early when the parser
        // stopped without exhausting every shard.
        if !self.coordinator.all_exhausted() {
            let reason = self.coordinator.cancel_token().reason().unwrap_or_else(|| {
                "parser stopped before every shard was exhausted".to_string()
            });
            return Err(ShardMergeError::cancelled(reason));
        }

        self.writer.write(&self.index)?;
        self.stats.terms = self.index.len();
        self.stats.postings = self.index.total_postings();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverted::posting::Slot;
    use crate::shard::ShardCursorTable;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_folds_and_writes_after_close() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("index.txt");
        let (coordinator, tx, rx) = MergeCoordinator::with_buffer(ShardCursorTable::default(), 4);

        let mut a = Slot::new("a");
        a.add_postings("apple".to_string(), ["d3", "d1"]);
        let mut b = Slot::new("b");
        b.add_postings("apple".to_string(), ["d2", "d1"]);
        tx.put(a).unwrap();
        tx.put(b).unwrap();
        drop(tx);

        let stats = MergerWorker::new(&coordinator, rx, IndexWriter::new(&output))
            .run()
            .unwrap();
        assert_eq!(stats.slots_folded, 2);
        assert_eq!(stats.terms, 1);
        assert_eq!(fs::read_to_string(&output).unwrap(), "apple,3,d1,d2,d3\n");
    }

    #[test]
    fn test_early_close_does_not_write() {
        let dir = TempDir::new().unwrap();
        let shard = dir.path().join("a");
        fs::write(&shard, "apple,1,d1\n").unwrap();
        let output = dir.path().join("index.txt");
        let (coordinator, tx, rx) =
            MergeCoordinator::with_buffer(ShardCursorTable::new([shard]), 4);
        drop(tx);

        let err = MergerWorker::new(&coordinator, rx, IndexWriter::new(&output))
            .run()
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!output.exists());
    }

    #[test]
    fn test_write_failure_cancels_run() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("taken");
        fs::create_dir(&output).unwrap();
        let (coordinator, tx, rx) = MergeCoordinator::with_buffer(ShardCursorTable::default(), 1);
        drop(tx);

        let err = MergerWorker::new(&coordinator, rx, IndexWriter::new(&output))
            .run()
            .unwrap_err();
        assert!(matches!(err, ShardMergeError::Write { .. }));
        assert!(coordinator.is_cancelled());
    }
}
