//! Audio subsystem module

pub mod device;
pub mod playback;
pub mod queue;
pub mod sink;

pub use device::{get_output_device, list_output_devices, OutputDeviceInfo};
pub use playback::{PlaybackStats, PlaybackWorker};
pub use queue::{PlaybackConsumer, PlaybackItem, PlaybackQueue, QueueStats};
pub use sink::{AudioSink, CpalSink};
