//! Camera seam and the outbound image path

pub mod camera;
pub mod sender;

pub use camera::{CaptureDevice, CapturedFrame, FrameGuard, FrameSource, PooledCamera};
pub use sender::{ImageSender, SendStats};
