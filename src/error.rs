//! Error types for the device core
//!
//! Every error here is recoverable. Subsystems report them on the log
//! channel and fall back to an idle state; nothing halts the device.

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbound reassembly errors. Each one aborts only the current transfer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Chunk too short for length header: {len} bytes")]
    HeaderTooShort { len: usize },

    #[error("Zero-length payload announced")]
    ZeroLengthPayload,

    #[error("Failed to allocate {requested} bytes for payload")]
    OutOfMemory { requested: usize },

    #[error("Previous incomplete transfer discarded")]
    StaleTransferDiscarded,

    #[error("Payload overrun: expected {expected} bytes, got {received}")]
    Overrun { expected: usize, received: usize },

    #[error("Payload too large for length prefix: {len} bytes")]
    PayloadTooLarge { len: usize },
}

/// Playback dispatch and output errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Playback queue full")]
    QueueFull,

    #[error("Audio device init failed: {0}")]
    DeviceInitFailure(String),

    #[error("Invalid playback item")]
    InvalidItem,

    #[error("Audio write failed: {0}")]
    WriteFailed(String),
}

/// Camera errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera capture failed: {0}")]
    CaptureFailure(String),

    #[error("Frame pool exhausted")]
    PoolExhausted,
}

/// Wireless data channel errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Data channel not connected")]
    NotConnected,

    #[error("Write failed: {0}")]
    WriteFailure(String),

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
