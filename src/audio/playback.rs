//! Playback worker
//!
//! A single long-lived thread that takes completed transfers off the
//! dispatch queue and plays them one at a time. Every iteration, whether
//! playback succeeded or not, ends with the buffer freed and the readiness
//! flag raised, so a failed clip can never leave the device stuck busy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::queue::{PlaybackConsumer, PlaybackItem};
use crate::audio::sink::AudioSink;
use crate::error::PlaybackError;
use crate::session::Readiness;

#[derive(Default)]
struct Counters {
    played: AtomicU64,
    failed: AtomicU64,
}

/// Handle to the running playback thread
pub struct PlaybackWorker {
    thread_handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl PlaybackWorker {
    /// Start the worker thread.
    ///
    /// `make_sink` runs on the worker thread, so sinks that are not `Send`
    /// (audio streams usually are not) can still be used.
    pub fn spawn<F, S>(
        consumer: PlaybackConsumer,
        readiness: Readiness,
        make_sink: F,
    ) -> Result<Self, PlaybackError>
    where
        F: FnOnce() -> S + Send + 'static,
        S: AudioSink,
    {
        let counters = Arc::new(Counters::default());
        let thread_counters = counters.clone();

        let handle = thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let mut sink = make_sink();
                run(&consumer, &mut sink, &readiness, &thread_counters);
            })
            .map_err(|e| PlaybackError::DeviceInitFailure(e.to_string()))?;

        Ok(Self {
            thread_handle: Some(handle),
            counters,
        })
    }

    /// Wait for the worker to exit. It exits once the queue's producer side
    /// has been dropped and every pending item has been played.
    pub fn join(mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("Playback thread panicked");
            }
        }
    }

    pub fn stats(&self) -> PlaybackStats {
        self.counters.snapshot()
    }
}

impl Counters {
    fn snapshot(&self) -> PlaybackStats {
        PlaybackStats {
            played: self.played.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Worker loop body; returns when the queue closes
fn run<S: AudioSink + ?Sized>(
    consumer: &PlaybackConsumer,
    sink: &mut S,
    readiness: &Readiness,
    counters: &Counters,
) {
    tracing::info!("Audio task started");

    while let Some(item) = consumer.pop_blocking() {
        tracing::info!("Audio task received transfer {}", item.sequence);

        match play_item(sink, item) {
            Ok(()) => {
                counters.played.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Playback failed: {}", e);
            }
        }

        readiness.release();
        tracing::info!("Audio task finished");
    }

    tracing::info!("Playback queue closed, audio task exiting");
}

/// Play a single item. The item's buffer is dropped before this returns.
pub fn play_item<S: AudioSink + ?Sized>(sink: &mut S, item: PlaybackItem) -> Result<(), PlaybackError> {
    if item.length() == 0 {
        return Err(PlaybackError::InvalidItem);
    }

    sink.open()?;

    tracing::info!("Playing {} bytes of audio", item.length());
    let result = sink.write(&item.buffer);
    sink.close();

    if result.is_ok() {
        tracing::info!("Playback of transfer {} finished", item.sequence);
    }
    result
}

/// Playback statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub played: u64,
    pub failed: u64,
}
