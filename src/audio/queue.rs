//! Playback dispatch queue
//!
//! Bounded handoff between the receive context and the playback worker.
//! Items carry their buffer by value, so a buffer is owned by exactly one
//! of: the reassembler, the queue, or the worker.

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::PlaybackError;
use crate::protocol::Payload;

/// A completed audio transfer on its way to the speaker
#[derive(Debug, PartialEq, Eq)]
pub struct PlaybackItem {
    /// Transfer sequence number, for logs
    pub sequence: u64,
    pub buffer: Box<[u8]>,
}

impl PlaybackItem {
    pub fn new(sequence: u64, buffer: Box<[u8]>) -> Self {
        Self { sequence, buffer }
    }

    pub fn length(&self) -> usize {
        self.buffer.len()
    }
}

impl From<Payload> for PlaybackItem {
    fn from(payload: Payload) -> Self {
        Self::new(payload.sequence, payload.data)
    }
}

#[derive(Default)]
struct Counters {
    pushed: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
}

/// Producer side, held by the session
pub struct PlaybackQueue {
    tx: Sender<PlaybackItem>,
    /// Second receiver used only to drain on reset
    drain_rx: Receiver<PlaybackItem>,
    push_timeout: Duration,
    counters: Counters,
}

/// Consumer side, held by the playback worker
pub struct PlaybackConsumer {
    rx: Receiver<PlaybackItem>,
}

impl PlaybackQueue {
    /// Create a queue and its consumer
    pub fn new(capacity: usize, push_timeout: Duration) -> (Self, PlaybackConsumer) {
        let (tx, rx) = bounded(capacity);
        let queue = Self {
            tx,
            drain_rx: rx.clone(),
            push_timeout,
            counters: Counters::default(),
        };
        (queue, PlaybackConsumer { rx })
    }

    /// Enqueue an item, waiting at most the push timeout for a free slot.
    /// On failure the item is dropped here and its buffer freed.
    pub fn push(&self, item: PlaybackItem) -> Result<(), PlaybackError> {
        match self.tx.send_timeout(item, self.push_timeout) {
            Ok(()) => {
                self.counters.pushed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(SendTimeoutError::Timeout(item)) | Err(SendTimeoutError::Disconnected(item)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Failed to queue transfer {} ({} bytes), freeing buffer",
                    item.sequence,
                    item.length()
                );
                Err(PlaybackError::QueueFull)
            }
        }
    }

    /// Discard every item that has not been picked up by the worker.
    /// Returns how many were dropped.
    pub fn reset(&self) -> usize {
        let mut dropped = 0;
        while let Ok(item) = self.drain_rx.try_recv() {
            tracing::debug!("Discarding queued transfer {}", item.sequence);
            dropped += 1;
        }
        self.counters.discarded.fetch_add(dropped as u64, Ordering::Relaxed);
        tracing::info!("Playback queue reset ({} pending discarded)", dropped);
        dropped
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }
}

impl PlaybackConsumer {
    /// Block until the next item arrives.
    /// Returns None once the producer side has been dropped.
    pub fn pop_blocking(&self) -> Option<PlaybackItem> {
        self.rx.recv().ok()
    }

    pub fn try_pop(&self) -> Option<PlaybackItem> {
        self.rx.try_recv().ok()
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pushed: u64,
    pub rejected: u64,
    pub discarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn item(sequence: u64, len: usize) -> PlaybackItem {
        PlaybackItem::new(sequence, vec![0u8; len].into_boxed_slice())
    }

    fn queue() -> (PlaybackQueue, PlaybackConsumer) {
        PlaybackQueue::new(2, Duration::from_millis(20))
    }

    #[test]
    fn test_fifo_order() {
        let (queue, consumer) = queue();
        queue.push(item(1, 4)).unwrap();
        queue.push(item(2, 4)).unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(consumer.pop_blocking().unwrap().sequence, 1);
        assert_eq!(consumer.pop_blocking().unwrap().sequence, 2);
        assert!(consumer.try_pop().is_none());
    }

    #[test]
    fn test_third_push_times_out() {
        let (queue, _consumer) = queue();
        queue.push(item(1, 8)).unwrap();
        queue.push(item(2, 8)).unwrap();

        let start = Instant::now();
        assert_eq!(queue.push(item(3, 8)), Err(PlaybackError::QueueFull));
        assert!(start.elapsed() >= Duration::from_millis(20));

        assert_eq!(queue.len(), 2);
        let stats = queue.stats();
        assert_eq!(stats.pushed, 2);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_reset_drains_pending() {
        let (queue, consumer) = queue();
        queue.push(item(1, 8)).unwrap();
        queue.push(item(2, 8)).unwrap();

        assert_eq!(queue.reset(), 2);
        assert!(queue.is_empty());
        assert!(consumer.try_pop().is_none());
        assert_eq!(queue.stats().discarded, 2);

        // Still usable after reset
        queue.push(item(3, 8)).unwrap();
        assert_eq!(consumer.pop_blocking().unwrap().sequence, 3);
    }

    #[test]
    fn test_consumer_unblocks_when_producer_dropped() {
        let (queue, consumer) = queue();
        let handle = std::thread::spawn(move || consumer.pop_blocking());
        drop(queue);
        assert!(handle.join().unwrap().is_none());
    }

    #[test]
    fn test_item_from_payload() {
        let payload = Payload {
            sequence: 7,
            data: vec![1, 2, 3].into_boxed_slice(),
        };
        let address = payload.data.as_ptr();
        let item = PlaybackItem::from(payload);
        assert_eq!(item.sequence, 7);
        assert_eq!(item.length(), 3);
        // Moved, not copied
        assert_eq!(item.buffer.as_ptr(), address);
    }

    #[test]
    fn test_capacity() {
        let (queue, _consumer) = queue();
        assert_eq!(queue.capacity(), 2);
    }
}
