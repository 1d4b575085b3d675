//! Shared state of a merge run.
//!
//! The [`MergeCoordinator`] owns the shard cursor table behind a single lock
//! and the cancellation token of the run. Workers reach the cursors only
//! through the operations below, each of which takes the lock for its
//! duration.

use std::io;
use std::path::PathBuf;

use log::error;
use parking_lot::Mutex;

use crate::pipeline::buffer::{CancelToken, SlotReceiver, SlotSender, slot_buffer};
use crate::shard::{NextLine, ShardCursor, ShardCursorTable};

/// Coordinator for one parser and one merger.
#[derive(Debug)]
pub struct MergeCoordinator {
    cursors: Mutex<ShardCursorTable>,
    cancel: CancelToken,
    shard_paths: Vec<PathBuf>,
}

impl MergeCoordinator {
    /// Create a coordinator over `table` together with both ends of a slot
    /// buffer holding at most `buffer_capacity` slots.
    pub fn with_buffer(
        table: ShardCursorTable,
        buffer_capacity: usize,
    ) -> (Self, SlotSender, SlotReceiver) {
        let cancel = CancelToken::new();
        let (sender, receiver) = slot_buffer(buffer_capacity, cancel.clone());
        let coordinator = MergeCoordinator {
            shard_paths: table.paths(),
            cursors: Mutex::new(table),
            cancel,
        };
        (coordinator, sender, receiver)
    }

    /// Read the next line of a shard and advance its cursor.
    pub fn next_line(&self, shard: usize) -> io::Result<NextLine> {
        self.cursors.lock().next_line(shard)
    }

    /// Close a shard's file until the parser visits it again.
    pub fn release(&self, shard: usize) {
        self.cursors.lock().release(shard);
    }

    /// Number of shard files currently open.
    pub fn open_shards(&self) -> usize {
        self.cursors.lock().open_count()
    }

    /// Mark a shard exhausted.
    pub fn mark_exhausted(&self, shard: usize) {
        self.cursors.lock().mark_exhausted(shard);
    }

    /// Check whether every shard is exhausted.
    pub fn all_exhausted(&self) -> bool {
        self.cursors.lock().all_exhausted()
    }

    /// Check whether a shard is exhausted.
    pub fn is_exhausted(&self, shard: usize) -> bool {
        self.cursors.lock().is_exhausted(shard)
    }

    /// Current cursor of a shard.
    pub fn cursor(&self, shard: usize) -> ShardCursor {
        self.cursors
            .lock()
            .shard(shard)
            .map(|s| s.cursor())
            .unwrap_or(ShardCursor::Exhausted)
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shard_paths.len()
    }

    /// Path of a shard.
    pub fn shard_path(&self, shard: usize) -> Option<&PathBuf> {
        self.shard_paths.get(shard)
    }

    /// Abort the run, waking any worker blocked on the slot buffer.
    pub fn cancel<S: Into<String>>(&self, reason: S) {
        let reason = reason.into();
        if !self.cancel.is_cancelled() {
            error!("Aborting merge: {reason}");
        }
        self.cancel.cancel(reason);
    }

    /// Check whether the run was aborted.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation token of the run.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}
