//! Wireless link seams
//!
//! The radio stack is outside this crate. These traits are the only way the
//! core touches it: a connection-oriented data channel for outbound writes,
//! a fire-and-forget keep-awake notification, and advertising control.
//! Inbound data and connection changes arrive as [`crate::session::LinkEvent`]s.

pub mod tcp;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::LinkError;

pub use tcp::{spawn_listener, TcpAdvertiser, TcpChannel};

/// The currently open data channel
pub trait DataChannel: Send {
    /// Write `bytes` as one packet. Returns the number of bytes written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError>;
}

/// Best-effort "stay awake" hint to the peer
pub trait KeepAwake: Send + Sync {
    fn notify(&self);
}

/// Control over whether the device accepts new connections
pub trait Advertiser: Send {
    fn start_advertising(&mut self);
    fn stop_advertising(&mut self);
}

/// Keep-awake that only reports on the log channel. Stands in for the
/// notify-only GATT characteristic when there is no radio.
#[derive(Debug, Default)]
pub struct LoggedKeepAwake {
    sent: AtomicU64,
}

impl LoggedKeepAwake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl KeepAwake for LoggedKeepAwake {
    fn notify(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Keep alive notification sent");
    }
}
