//! # Glimpse Glass
//!
//! Transfer protocol and concurrency core for a wearable camera/audio gadget.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        RECEIVE / EVENT CONTEXT                              │
//! │                                                                             │
//! │   Button / "send" ──► Trigger ──┐        Connect / Disconnect / Chunk       │
//! │                                 ▼                      │                    │
//! │  ┌─────────────────────────────────────────────────────┴───────────────┐    │
//! │  │                     Session (session::Session)                      │    │
//! │  │   Disconnected ⇄ Connected-Idle ⇄ Connected-Busy                    │    │
//! │  │  ┌──────────────────────┐          ┌─────────────────────────────┐  │    │
//! │  │  │  Image Send Path     │          │  Frame Reassembler          │  │    │
//! │  │  │  (capture::sender)   │          │  (protocol::reassembly)     │  │    │
//! │  │  │  keep-awake, capture,│          │  [len u32 LE][payload ...]  │  │    │
//! │  │  │  [len][jpeg] write   │          └──────────────┬──────────────┘  │    │
//! │  │  └──────────────────────┘                         │ PlaybackItem    │    │
//! │  └───────────────────────────────────────────────────┼─────────────────┘    │
//! │                                                      ▼                      │
//! │                        ┌───────────────────────────────────────────┐        │
//! │                        │ Playback Dispatch Queue (capacity 2,      │        │
//! │                        │ 100 ms push timeout)  (audio::queue)      │        │
//! │                        └─────────────────────┬─────────────────────┘        │
//! └──────────────────────────────────────────────┼──────────────────────────────┘
//!                                                ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                 PLAYBACK CONTEXT (audio::playback worker thread)            │
//! │    pop_blocking ──► open sink ──► write PCM ──► close ──► readiness = true  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two contexts share only the [`session::Readiness`] flag and the
//! queue. Payload buffers move through the queue by value, so exactly one
//! side owns each buffer at any time.

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod session;
pub mod trigger;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Size of the little-endian length prefix on every transfer
    pub const HEADER_LEN: usize = 4;

    /// Playback dispatch queue capacity
    pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

    /// Time the receiver waits for a queue slot before dropping a payload
    pub const DEFAULT_PUSH_TIMEOUT_MS: u64 = 100;

    /// Delay between keep-awake notification and capture
    pub const DEFAULT_KEEP_AWAKE_DELAY_MS: u64 = 50;

    /// Link MTU; the host sends audio in chunks of this size
    pub const DEFAULT_MTU: u16 = 1251;

    /// L2CAP protocol/service multiplexer
    pub const DEFAULT_PSM: u16 = 150;

    /// Upper bound on a single inbound payload (PSRAM budget)
    pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 8 * 1024 * 1024;

    /// Playback sample rate for inbound PCM
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Playback channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Number of frame buffers owned by the camera
    pub const DEFAULT_FRAME_POOL_SIZE: usize = 2;

    /// How long the device waits for an audio reply after sending an image
    pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 30_000;

    /// Main loop / button poll interval
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

    /// Advertised device name
    pub const DEVICE_NAME: &str = "Glimpse Glass";

    /// GATT service advertised for discovery
    pub const SERVICE_UUID: &str = "dcbc7255-1e9e-49a0-a360-b0430b6c6905";

    /// Notify-only characteristic used to keep the host awake
    pub const KEEP_AWAKE_UUID: &str = "371a55c8-f251-4ad2-90b3-c7c195b049be";
}
