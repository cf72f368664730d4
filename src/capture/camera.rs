//! Capture device seam and a pooled software camera
//!
//! The camera owns a small fixed pool of frame buffers. Every acquired frame
//! must go back through `release_frame`; [`FrameGuard`] does that on drop.

use std::path::{Path, PathBuf};

use crate::error::CaptureError;

/// One captured JPEG frame
#[derive(Debug)]
pub struct CapturedFrame {
    data: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A camera with a fixed frame-buffer pool
pub trait CaptureDevice: Send {
    fn acquire_frame(&mut self) -> Result<CapturedFrame, CaptureError>;

    /// Hand a frame buffer back to the pool
    fn release_frame(&mut self, frame: CapturedFrame);
}

/// Acquired frame that is released back to its device when dropped
pub struct FrameGuard<'a, D: CaptureDevice + ?Sized> {
    device: &'a mut D,
    frame: Option<CapturedFrame>,
}

impl<'a, D: CaptureDevice + ?Sized> FrameGuard<'a, D> {
    pub fn acquire(device: &'a mut D) -> Result<Self, CaptureError> {
        let frame = device.acquire_frame()?;
        Ok(Self {
            device,
            frame: Some(frame),
        })
    }

    pub fn data(&self) -> &[u8] {
        self.frame.as_ref().map(|f| f.data()).unwrap_or(&[])
    }
}

impl<D: CaptureDevice + ?Sized> Drop for FrameGuard<'_, D> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.device.release_frame(frame);
        }
    }
}

/// Where the software camera gets its pictures
#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Synthetic JPEG-framed test pattern
    Pattern,
    /// Cycle through the JPEG files in a directory
    Directory(PathBuf),
}

/// Software camera with a bounded frame pool
pub struct PooledCamera {
    source: FrameSource,
    files: Vec<PathBuf>,
    pool_size: usize,
    outstanding: usize,
    frames_captured: u64,
}

impl PooledCamera {
    pub fn new(source: FrameSource, pool_size: usize) -> Result<Self, CaptureError> {
        let files = match &source {
            FrameSource::Pattern => Vec::new(),
            FrameSource::Directory(dir) => list_jpegs(dir)?,
        };
        tracing::info!("Camera initialized ({:?}, pool of {})", source, pool_size);
        Ok(Self {
            source,
            files,
            pool_size,
            outstanding: 0,
            frames_captured: 0,
        })
    }

    /// Frames currently checked out of the pool
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn next_image(&self) -> Result<Vec<u8>, CaptureError> {
        match self.source {
            FrameSource::Pattern => Ok(test_pattern(self.frames_captured)),
            FrameSource::Directory(_) => {
                if self.files.is_empty() {
                    return Err(CaptureError::CaptureFailure("No images available".into()));
                }
                let path = &self.files[(self.frames_captured as usize) % self.files.len()];
                std::fs::read(path).map_err(|e| {
                    CaptureError::CaptureFailure(format!("{}: {}", path.display(), e))
                })
            }
        }
    }
}

impl CaptureDevice for PooledCamera {
    fn acquire_frame(&mut self) -> Result<CapturedFrame, CaptureError> {
        if self.outstanding >= self.pool_size {
            return Err(CaptureError::PoolExhausted);
        }
        let data = self.next_image()?;
        self.outstanding += 1;
        self.frames_captured += 1;
        Ok(CapturedFrame::new(data))
    }

    fn release_frame(&mut self, frame: CapturedFrame) {
        drop(frame);
        self.outstanding = self.outstanding.saturating_sub(1);
    }
}

fn list_jpegs(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CaptureError::CaptureFailure(format!("{}: {}", dir.display(), e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Deterministic stand-in image: SOI marker, a counter-seeded body, EOI marker
pub fn test_pattern(seed: u64) -> Vec<u8> {
    const BODY_LEN: usize = 4096;
    let mut data = Vec::with_capacity(BODY_LEN + 4);
    data.extend_from_slice(&[0xFF, 0xD8]);
    data.extend((0..BODY_LEN).map(|i| (i as u64).wrapping_add(seed) as u8 & 0x7F));
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}
