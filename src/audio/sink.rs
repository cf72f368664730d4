//! Audio output seam and the cpal-backed speaker
//!
//! Payloads are raw interleaved signed 16-bit little-endian PCM. Each
//! playback opens the device, writes the whole buffer, and closes it again,
//! the way the firmware brings its I2S peripheral up and down per clip.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::device::get_output_device;
use crate::config::AudioConfig;
use crate::error::PlaybackError;

/// Something that can play a complete PCM buffer
pub trait AudioSink {
    /// Bring the output device up
    fn open(&mut self) -> Result<(), PlaybackError>;

    /// Play `pcm` to completion
    fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError>;

    /// Tear the output device down. Called after every `open`, even on failure.
    fn close(&mut self);
}

/// Convert s16le bytes to f32 samples. A trailing odd byte is ignored.
pub fn pcm16_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect()
}

struct Playhead {
    samples: Vec<f32>,
    position: usize,
}

struct Shared {
    playhead: Mutex<Playhead>,
    drained: Condvar,
}

/// Speaker output through cpal
pub struct CpalSink {
    device_id: Option<String>,
    config: StreamConfig,
    shared: Arc<Shared>,
    stream: Option<cpal::Stream>,
    error_rx: Option<Receiver<PlaybackError>>,
}

impl CpalSink {
    pub fn new(audio: &AudioConfig) -> Self {
        Self {
            device_id: audio.output_device.clone(),
            config: StreamConfig {
                channels: audio.channels,
                sample_rate: cpal::SampleRate(audio.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            },
            shared: Arc::new(Shared {
                playhead: Mutex::new(Playhead {
                    samples: Vec::new(),
                    position: 0,
                }),
                drained: Condvar::new(),
            }),
            stream: None,
            error_rx: None,
        }
    }

    /// Expected wall-clock duration of `sample_count` interleaved samples
    fn duration_of(&self, sample_count: usize) -> Duration {
        let frames = sample_count as u64 / self.config.channels.max(1) as u64;
        Duration::from_micros(frames * 1_000_000 / self.config.sample_rate.0.max(1) as u64)
    }
}

impl AudioSink for CpalSink {
    fn open(&mut self) -> Result<(), PlaybackError> {
        let device = get_output_device(self.device_id.as_deref())?;
        let (error_tx, error_rx) = bounded::<PlaybackError>(16);
        let shared = self.shared.clone();

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Never block the audio thread; output silence on contention
                    let Some(mut playhead) = shared.playhead.try_lock() else {
                        data.fill(0.0);
                        return;
                    };
                    let start = playhead.position;
                    let available = playhead.samples.len().saturating_sub(start);
                    let n = available.min(data.len());
                    data[..n].copy_from_slice(&playhead.samples[start..start + n]);
                    data[n..].fill(0.0);
                    playhead.position += n;
                    if n > 0 && playhead.position >= playhead.samples.len() {
                        shared.drained.notify_all();
                    }
                },
                move |err| {
                    let _ = error_tx.try_send(PlaybackError::WriteFailed(err.to_string()));
                },
                None,
            )
            .map_err(|e| PlaybackError::DeviceInitFailure(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PlaybackError::DeviceInitFailure(e.to_string()))?;

        self.stream = Some(stream);
        self.error_rx = Some(error_rx);
        tracing::debug!(
            "Output stream open: {} Hz, {} channels",
            self.config.sample_rate.0,
            self.config.channels
        );
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        if self.stream.is_none() {
            return Err(PlaybackError::DeviceInitFailure("Output stream not open".into()));
        }

        let samples = pcm16_to_f32(pcm);
        let deadline = self.duration_of(samples.len()) + Duration::from_secs(2);

        let mut playhead = self.shared.playhead.lock();
        playhead.samples = samples;
        playhead.position = 0;

        while playhead.position < playhead.samples.len() {
            if self.shared.drained.wait_for(&mut playhead, deadline).timed_out() {
                playhead.samples.clear();
                return Err(PlaybackError::WriteFailed("Playback stalled".into()));
            }
            if let Some(err) = self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok()) {
                playhead.samples.clear();
                return Err(err);
            }
        }

        playhead.samples.clear();
        playhead.position = 0;
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the stream stops it
        self.stream = None;
        self.error_rx = None;
    }
}
