//! Image send path
//!
//! Wake the host, give it a moment to prepare, grab one frame, and write it
//! as a single length-prefixed packet. The frame always goes back to the
//! camera pool, whether or not the write succeeded. Nothing is retried.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::capture::camera::{CaptureDevice, FrameGuard};
use crate::error::{Error, LinkError, Result};
use crate::link::{DataChannel, KeepAwake};
use crate::protocol::encode_frame;

/// Captures and transmits images over the open channel
pub struct ImageSender {
    camera: Box<dyn CaptureDevice>,
    keep_awake: Arc<dyn KeepAwake>,
    /// Pause between keep-awake and capture
    delay: Duration,
    images_sent: u64,
    capture_failures: u64,
    write_failures: u64,
}

impl ImageSender {
    pub fn new(camera: Box<dyn CaptureDevice>, keep_awake: Arc<dyn KeepAwake>, delay: Duration) -> Self {
        Self {
            camera,
            keep_awake,
            delay,
            images_sent: 0,
            capture_failures: 0,
            write_failures: 0,
        }
    }

    /// Capture one frame and write it to `channel`.
    /// Returns the number of bytes written, header included.
    pub fn send(&mut self, channel: &mut dyn DataChannel) -> Result<usize> {
        self.keep_awake.notify();
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let frame = match FrameGuard::acquire(self.camera.as_mut()) {
            Ok(frame) => frame,
            Err(e) => {
                self.capture_failures += 1;
                return Err(e.into());
            }
        };
        tracing::info!("Captured image of size {}", frame.data().len());

        let packet = encode_frame(frame.data())?;
        let result = channel.write(&packet);
        drop(frame);

        match result {
            Ok(written) if written == packet.len() => {
                self.images_sent += 1;
                tracing::info!("Image sent ({} bytes)", written);
                Ok(written)
            }
            Ok(written) => {
                self.write_failures += 1;
                Err(Error::Link(LinkError::ShortWrite {
                    written,
                    expected: packet.len(),
                }))
            }
            Err(e) => {
                self.write_failures += 1;
                Err(e.into())
            }
        }
    }

    pub fn stats(&self) -> SendStats {
        SendStats {
            images_sent: self.images_sent,
            capture_failures: self.capture_failures,
            write_failures: self.write_failures,
        }
    }
}

/// Image send statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendStats {
    pub images_sent: u64,
    pub capture_failures: u64,
    pub write_failures: u64,
}
