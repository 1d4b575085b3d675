//! Bounded slot buffer between the parser and the merger.
//!
//! The buffer is a capacity-limited channel. [`SlotSender::put`] blocks while
//! `capacity` slots are pending and [`SlotReceiver::drain`] blocks until at
//! least one slot is pending, then takes every pending slot at once. Each slot
//! is delivered exactly once.
//!
//! Both ends also watch a shared [`CancelToken`]. Cancelling wakes a peer that
//! is blocked on either side so a failed run terminates instead of hanging.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use parking_lot::Mutex;

use crate::error::{Result, ShardMergeError};
use crate::inverted::posting::Slot;

#[derive(Debug)]
struct CancelInner {
    /// Dropped on cancellation, which disconnects `signal`.
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    reason: Mutex<Option<String>>,
}

/// Run-wide cancellation signal shared by both workers.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        CancelToken {
            inner: Arc::new(CancelInner {
                trigger: Mutex::new(Some(trigger)),
                signal,
                reason: Mutex::new(None),
            }),
        }
    }

    /// Cancel the run. Only the first reason is kept.
    pub fn cancel<S: Into<String>>(&self, reason: S) {
        let mut trigger = self.inner.trigger.lock();
        if trigger.is_some() {
            *self.inner.reason.lock() = Some(reason.into());
            trigger.take();
        }
    }

    /// Check whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.trigger.lock().is_none()
    }

    /// Reason given to the first `cancel` call.
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Sleep for `duration` unless cancelled first.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        select! {
            recv(self.inner.signal) -> _ => Err(self.to_error()),
            default(duration) => Ok(()),
        }
    }

    fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    fn to_error(&self) -> ShardMergeError {
        ShardMergeError::cancelled(
            self.reason()
                .unwrap_or_else(|| "merge run cancelled".to_string()),
        )
    }
}

/// Create a slot buffer holding at most `capacity` slots.
pub fn slot_buffer(capacity: usize, cancel: CancelToken) -> (SlotSender, SlotReceiver) {
    let (tx, rx) = bounded(capacity);
    (
        SlotSender {
            tx,
            cancel: cancel.clone(),
        },
        SlotReceiver { rx, cancel },
    )
}

/// Producer end of the slot buffer. Dropping it closes the buffer.
#[derive(Debug)]
pub struct SlotSender {
    tx: Sender<Slot>,
    cancel: CancelToken,
}

impl SlotSender {
    /// Insert a slot, blocking while the buffer is full.
    pub fn put(&self, slot: Slot) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(self.cancel.to_error());
        }
        select! {
            send(self.tx, slot) -> res => res.map_err(|_| {
                ShardMergeError::cancelled("slot buffer closed by the merger")
            }),
            recv(self.cancel.signal()) -> _ => Err(self.cancel.to_error()),
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.tx.len()
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

/// Consumer end of the slot buffer.
#[derive(Debug)]
pub struct SlotReceiver {
    rx: Receiver<Slot>,
    cancel: CancelToken,
}

impl SlotReceiver {
    /// Remove and return every pending slot, blocking while none is pending.
    ///
    /// Returns `Ok(None)` once the sender is gone and every slot was drained.
    pub fn drain(&self) -> Result<Option<Vec<Slot>>> {
        if self.cancel.is_cancelled() {
            return Err(self.cancel.to_error());
        }
        let first = select! {
            recv(self.rx) -> msg => match msg {
                Ok(slot) => slot,
                Err(_) => return Ok(None),
            },
            recv(self.cancel.signal()) -> _ => return Err(self.cancel.to_error()),
        };

        let mut slots = vec![first];
        slots.extend(self.rx.try_iter());
        Ok(Some(slots))
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn slot(term: &str) -> Slot {
        let mut slot = Slot::new("shard");
        slot.add_postings(term.to_string(), ["d1"]);
        slot
    }

    #[test]
    fn test_drain_takes_all_pending_slots() {
        let (tx, rx) = slot_buffer(3, CancelToken::new());
        tx.put(slot("a")).unwrap();
        tx.put(slot("b")).unwrap();
        tx.put(slot("c")).unwrap();
        assert_eq!(tx.pending(), 3);

        let drained = rx.drain().unwrap().unwrap();
        assert_eq!(drained.len(), 3);
        assert_eq!(rx.pending(), 0);

        // Drained slots are never presented again.
        drop(tx);
        assert!(rx.drain().unwrap().is_none());
    }

    #[test]
    fn test_put_blocks_at_capacity() {
        let (tx, rx) = slot_buffer(2, CancelToken::new());

        let producer = thread::spawn(move || {
            for term in ["a", "b", "c", "d", "e"] {
                tx.put(slot(term)).unwrap();
                assert!(tx.pending() <= tx.capacity());
            }
        });

        let mut received = 0;
        while let Some(slots) = rx.drain().unwrap() {
            assert!(slots.len() <= 2);
            received += slots.len();
        }
        producer.join().unwrap();
        assert_eq!(received, 5);
    }

    #[test]
    fn test_cancel_wakes_blocked_producer() {
        let cancel = CancelToken::new();
        let (tx, _rx) = slot_buffer(1, cancel.clone());
        tx.put(slot("a")).unwrap();

        let blocked = thread::spawn(move || tx.put(slot("b")));
        thread::sleep(Duration::from_millis(20));
        cancel.cancel("merger failed");

        let err = blocked.join().unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("merger failed"));
    }

    #[test]
    fn test_cancel_wakes_blocked_consumer() {
        let cancel = CancelToken::new();
        let (_tx, rx) = slot_buffer(1, cancel.clone());

        let blocked = thread::spawn(move || rx.drain());
        thread::sleep(Duration::from_millis(20));
        cancel.cancel("parser failed");

        assert!(blocked.join().unwrap().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_dropped_receiver_unblocks_sender() {
        let (tx, rx) = slot_buffer(1, CancelToken::new());
        drop(rx);
        assert!(tx.put(slot("a")).is_err());
    }

    #[test]
    fn test_cancel_keeps_first_reason() {
        let cancel = CancelToken::new();
        assert!(!cancel.is_cancelled());
        cancel.cancel("first");
        cancel.cancel("second");
        assert!(cancel.is_cancelled());
        assert_eq!(cancel.reason().as_deref(), Some("first"));
    }

    #[test]
    fn test_sleep_interrupted_by_cancel() {
        let cancel = CancelToken::new();
        let sleeper = cancel.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        cancel.cancel("stop");

        assert!(handle.join().unwrap().is_err());
        assert!(start.elapsed() < Duration::from_secs(30));
    }
}
