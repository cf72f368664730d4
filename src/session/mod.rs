//! Session / readiness state machine
//!
//! ```text
//!                connect                trigger (ready)
//!  Disconnected ─────────► Connected-Idle ──────────────► Connected-Busy
//!        ▲                      ▲   ▲                            │
//!        │    disconnect        │   └────── send finished ───────┘
//!        └──────────────────────┴─────── (from any state)
//! ```
//!
//! The session runs on the receive/event context and owns everything that
//! context touches: the open channel, the reassembler, the producer side of
//! the playback queue, and the image sender. The only state it shares with
//! the playback worker is the [`Readiness`] flag.

mod readiness;

pub use readiness::Readiness;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{PlaybackItem, PlaybackQueue, QueueStats};
use crate::capture::{ImageSender, SendStats};
use crate::config::AppConfig;
use crate::constants::HEADER_LEN;
use crate::error::{LinkError, TransferError};
use crate::link::{Advertiser, DataChannel, KeepAwake};
use crate::protocol::{FrameReassembler, Ingest, ReassemblyStats};
use crate::trigger::{self, ButtonInput, TriggerSource};

/// Connection/readiness state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    ConnectedIdle,
    ConnectedBusy,
}

/// Everything the event context reacts to
pub enum LinkEvent {
    /// A data channel opened
    Connected {
        channel: Box<dyn DataChannel>,
        mtu: u16,
    },
    /// The data channel closed
    Disconnected,
    /// One inbound chunk
    ChunkReceived(Vec<u8>),
    /// Button or command
    Trigger(TriggerSource),
}

impl fmt::Debug for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Connected { mtu, .. } => f.debug_struct("Connected").field("mtu", mtu).finish(),
            LinkEvent::Disconnected => f.write_str("Disconnected"),
            LinkEvent::ChunkReceived(chunk) => write!(f, "ChunkReceived({} bytes)", chunk.len()),
            LinkEvent::Trigger(source) => f.debug_tuple("Trigger").field(source).finish(),
        }
    }
}

/// Result of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Image written to the channel
    Sent,
    /// Capture or write failed; the device is idle again
    Failed,
    /// Not connected, or a send/playback is still in progress
    Ignored,
}

/// Session timing knobs
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Stay busy after a send until the reply has played
    pub await_reply: bool,
    /// Give up waiting for a reply after this long
    pub reply_timeout: Option<Duration>,
    /// Largest inbound payload
    pub max_payload: usize,
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            await_reply: config.capture.await_reply,
            reply_timeout: config.capture.reply_timeout(),
            max_payload: config.transfer.max_payload_bytes,
        }
    }
}

/// The device's connection state machine
pub struct Session {
    state: SessionState,
    channel: Option<Box<dyn DataChannel>>,
    mtu: u16,
    reassembler: FrameReassembler,
    queue: PlaybackQueue,
    readiness: Readiness,
    keep_awake: Arc<dyn KeepAwake>,
    advertiser: Box<dyn Advertiser>,
    sender: ImageSender,
    options: SessionOptions,
    awaiting_reply_since: Option<Instant>,
}

impl Session {
    pub fn new(
        options: SessionOptions,
        queue: PlaybackQueue,
        readiness: Readiness,
        keep_awake: Arc<dyn KeepAwake>,
        advertiser: Box<dyn Advertiser>,
        sender: ImageSender,
    ) -> Self {
        Self {
            state: SessionState::Disconnected,
            channel: None,
            mtu: 0,
            reassembler: FrameReassembler::new(options.max_payload),
            queue,
            readiness,
            keep_awake,
            advertiser,
            sender,
            options,
            awaiting_reply_since: None,
        }
    }

    /// Dispatch one event
    pub fn handle(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected { channel, mtu } => self.on_connect(channel, mtu),
            LinkEvent::Disconnected => self.on_disconnect(),
            LinkEvent::ChunkReceived(chunk) => self.on_chunk(&chunk),
            LinkEvent::Trigger(source) => {
                self.on_trigger(source);
            }
        }
    }

    pub fn on_connect(&mut self, channel: Box<dyn DataChannel>, mtu: u16) {
        if self.channel.is_some() {
            tracing::warn!("New channel replaces an open one");
        }
        tracing::info!("Channel established (MTU {})", mtu);

        self.channel = Some(channel);
        self.mtu = mtu;
        self.state = SessionState::ConnectedIdle;
        self.advertiser.stop_advertising();

        if let Some(bytes) = self.reassembler.reset() {
            tracing::warn!("{} ({} bytes)", TransferError::StaleTransferDiscarded, bytes);
        }
    }

    pub fn on_disconnect(&mut self) {
        let was = self.state;
        self.state = SessionState::Disconnected;
        self.channel = None;
        self.mtu = 0;

        if let Some(bytes) = self.reassembler.reset() {
            tracing::info!("Freed partial audio buffer ({} bytes)", bytes);
        }
        self.queue.reset();
        self.awaiting_reply_since = None;
        self.readiness.release();

        tracing::info!("Channel disconnected (was {:?})", was);
        self.log_stats();
        self.advertiser.start_advertising();
    }

    pub fn on_chunk(&mut self, chunk: &[u8]) {
        if self.state == SessionState::Disconnected {
            tracing::warn!("Dropping {} byte chunk received while disconnected", chunk.len());
            return;
        }

        if self.reassembler.is_awaiting_header() && chunk.len() >= HEADER_LEN {
            // Keep the host awake for the duration of the transfer
            self.keep_awake.notify();
        }

        match self.reassembler.ingest(chunk) {
            Ok(Ingest::Incomplete) => {}
            Ok(Ingest::Completed(payload)) => self.dispatch(PlaybackItem::from(payload)),
            Err(e @ TransferError::OutOfMemory { .. }) => tracing::error!("{}", e),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn dispatch(&mut self, item: PlaybackItem) {
        tracing::info!(
            "Full audio data ({} bytes) received, sending to audio task",
            item.length()
        );
        match self.queue.push(item) {
            Ok(()) => {
                // The worker raises readiness once this plays
                self.awaiting_reply_since = None;
            }
            Err(e) => {
                tracing::error!("Failed to queue audio data playback: {}", e);
                if self.awaiting_reply_since.take().is_some() {
                    self.readiness.release();
                }
            }
        }
    }

    pub fn on_trigger(&mut self, source: TriggerSource) -> TriggerOutcome {
        if self.state != SessionState::ConnectedIdle {
            tracing::warn!("Cannot send image: {:?}", self.state);
            return TriggerOutcome::Ignored;
        }
        if !self.readiness.try_acquire() {
            tracing::debug!("Cannot send image: device busy");
            return TriggerOutcome::Ignored;
        }
        let Some(channel) = self.channel.as_mut() else {
            tracing::error!("Cannot send image: {}", LinkError::NotConnected);
            self.readiness.release();
            return TriggerOutcome::Ignored;
        };

        tracing::info!("Sending image ({:?})", source);
        self.state = SessionState::ConnectedBusy;
        let result = self.sender.send(channel.as_mut());
        self.state = SessionState::ConnectedIdle;

        match result {
            Ok(_) if self.options.await_reply => {
                self.awaiting_reply_since = Some(Instant::now());
                TriggerOutcome::Sent
            }
            Ok(_) => {
                self.readiness.release();
                TriggerOutcome::Sent
            }
            Err(e) => {
                tracing::error!("Image send failed: {}", e);
                self.readiness.release();
                TriggerOutcome::Failed
            }
        }
    }

    /// Sample a level-sensitive button. A held button triggers on every poll
    /// that finds the device connected and ready.
    pub fn poll_button(&mut self, input: &dyn ButtonInput) -> Option<TriggerOutcome> {
        let source = trigger::poll_button(input)?;
        if self.state != SessionState::ConnectedIdle || !self.readiness.is_ready() {
            return None;
        }
        Some(self.on_trigger(source))
    }

    /// Periodic housekeeping; re-arms readiness if a reply never came
    pub fn tick(&mut self, now: Instant) {
        let (Some(since), Some(timeout)) = (self.awaiting_reply_since, self.options.reply_timeout)
        else {
            return;
        };
        if now.saturating_duration_since(since) >= timeout {
            tracing::warn!("No reply within {:?}, ready for next capture", timeout);
            self.awaiting_reply_since = None;
            self.readiness.release();
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply_since.is_some()
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn reassembler(&self) -> &FrameReassembler {
        &self.reassembler
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            reassembly: self.reassembler.stats(),
            queue: self.queue.stats(),
            send: self.sender.stats(),
        }
    }

    fn log_stats(&self) {
        let stats = self.stats();
        tracing::info!(
            "Session stats: {} transfers in ({} aborted, {} bytes), {} queued, {} rejected, {} images sent",
            stats.reassembly.transfers_completed,
            stats.reassembly.transfers_aborted,
            stats.reassembly.bytes_received,
            stats.queue.pushed,
            stats.queue.rejected,
            stats.send.images_sent
        );
    }
}

/// Combined statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub reassembly: ReassemblyStats,
    pub queue: QueueStats,
    pub send: SendStats,
}
