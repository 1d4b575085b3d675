//! The parser worker.
//!
//! Visits every shard that still has lines, round-robin in enumeration order,
//! fills one slot per shard per round and hands it to the slot buffer. Stops
//! once every shard is exhausted.

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};

use crate::config::ReadFailurePolicy;
use crate::error::{Result, ShardMergeError};
use crate::inverted::posting::Slot;
use crate::parser::parse_line;
use crate::pipeline::buffer::SlotSender;
use crate::pipeline::coordinator::MergeCoordinator;
use crate::shard::{NextLine, ShardCursor};

/// Lifecycle of the parser worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Running,
    Done,
}

/// Counters reported by the parser worker.
#[derive(Debug, Clone, Default)]
pub struct ParserStats {
    /// Shard lines parsed into slots.
    pub lines_parsed: u64,

    /// Slots handed to the buffer, empty ones included.
    pub slots_produced: u64,

    /// Read failures recovered by retrying.
    pub read_retries: u64,

    /// Shards dropped after a read failure.
    pub skipped_shards: Vec<PathBuf>,
}

/// Single producer of slots.
pub struct ParserWorker<'a> {
    coordinator: &'a MergeCoordinator,
    sender: SlotSender,
    slot_capacity: usize,
    policy: ReadFailurePolicy,
    state: ParserState,
    stats: ParserStats,
}

impl<'a> ParserWorker<'a> {
    /// Create a parser worker.
    pub fn new(
        coordinator: &'a MergeCoordinator,
        sender: SlotSender,
        slot_capacity: usize,
        policy: ReadFailurePolicy,
    ) -> Self {
        ParserWorker {
            coordinator,
            sender,
            slot_capacity,
            policy,
            state: ParserState::Running,
            stats: ParserStats::default(),
        }
    }

    /// Run until every shard is exhausted. Any failure cancels the run so the
    /// merger stops as well. The slot buffer is closed when this returns.
    pub fn run(mut self) -> Result<ParserStats> {
        match self.produce() {
            Ok(()) => {
                self.state = ParserState::Done;
                debug!(
                    "Parser done: {} lines in {} slots",
                    self.stats.lines_parsed, self.stats.slots_produced
                );
                Ok(self.stats)
            }
            Err(e) => {
                if !e.is_cancelled() {
                    self.coordinator.cancel(e.to_string());
                }
                Err(e)
            }
        }
    }

    fn produce(&mut self) -> Result<()> {
        while self.state == ParserState::Running {
            if self.coordinator.all_exhausted() {
                self.state = ParserState::Done;
                break;
            }
            for shard in 0..self.coordinator.shard_count() {
                if self.coordinator.is_exhausted(shard) {
                    continue;
                }
                // Only the shard being filled holds an open file.
                let filled = self.fill_slot(shard);
                self.coordinator.release(shard);
                let slot = filled?;
                debug!(
                    "Slot of {} terms from {}",
                    slot.len(),
                    slot.shard().display()
                );
                self.sender.put(slot)?;
                self.stats.slots_produced += 1;
            }
        }
        Ok(())
    }

    /// Build one slot from a shard, stopping at the slot capacity or the end
    /// of the shard.
    fn fill_slot(&mut self, shard: usize) -> Result<Slot> {
        let path = self
            .coordinator
            .shard_path(shard)
            .cloned()
            .ok_or_else(|| ShardMergeError::other(format!("unknown shard {shard}")))?;
        let mut slot = Slot::new(path.clone());
        let mut failures = 0u32;

        while !slot.is_full(self.slot_capacity) {
            match self.coordinator.next_line(shard) {
                Ok(NextLine::Line { number, text }) => {
                    failures = 0;
                    if text.trim().is_empty() {
                        continue;
                    }
                    let parsed = parse_line(&path, number, &text)?;
                    slot.add_postings(parsed.term, parsed.doc_ids);
                    self.stats.lines_parsed += 1;
                }
                Ok(NextLine::Eof) => {
                    self.coordinator.mark_exhausted(shard);
                    debug!("Shard {} exhausted", path.display());
                    break;
                }
                Err(e) => {
                    let line = match self.coordinator.cursor(shard) {
                        ShardCursor::Next(line) => line + 1,
                        ShardCursor::Exhausted => 0,
                    };
                    match self.policy {
                        ReadFailurePolicy::Abort => {
                            return Err(ShardMergeError::shard_read(path, line, e));
                        }
                        ReadFailurePolicy::Skip => {
                            warn!(
                                "Dropping remaining lines of {} after read failure at line {}: {}",
                                path.display(),
                                line,
                                e
                            );
                            self.coordinator.mark_exhausted(shard);
                            self.stats.skipped_shards.push(path);
                            break;
                        }
                        ReadFailurePolicy::Retry {
                            max_attempts,
                            backoff_ms,
                        } => {
                            failures += 1;
                            if failures >= max_attempts {
                                return Err(ShardMergeError::shard_read(path, line, e));
                            }
                            warn!(
                                "Read failure {}/{} on {} at line {}: {}",
                                failures,
                                max_attempts,
                                path.display(),
                                line,
                                e
                            );
                            self.stats.read_retries += 1;
                            self.coordinator
                                .cancel_token()
                                .sleep(retry_delay(backoff_ms, failures))?;
                        }
                    }
                }
            }
        }
        Ok(slot)
    }
}

/// Linear backoff before retry number `attempt`, saturating on overflow.
fn retry_delay(backoff_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(backoff_ms.saturating_mul(u64::from(attempt)))
}
