use ndarray::{Array3, ArrayView3};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(String),
}

/// One RGB image sample in HWC layout, owned by the pipeline for a single
/// tick. The reclaim hook runs exactly once when the frame is dropped, so
/// the source's buffer is returned on every exit path.
pub struct Frame {
    pixels: Array3<u8>,
    reclaim: Option<Box<dyn FnOnce() + Send>>,
}

impl Frame {
    pub fn new(pixels: Array3<u8>) -> Self {
        Self {
            pixels,
            reclaim: None,
        }
    }

    pub fn with_reclaim(pixels: Array3<u8>, reclaim: impl FnOnce() + Send + 'static) -> Self {
        Self {
            pixels,
            reclaim: Some(Box::new(reclaim)),
        }
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    pub fn height(&self) -> u32 {
        self.pixels.dim().0 as u32
    }

    pub fn width(&self) -> u32 {
        self.pixels.dim().1 as u32
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(reclaim) = self.reclaim.take() {
            reclaim();
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("height", &self.height())
            .field("width", &self.width())
            .finish()
    }
}

/// Pull-based frame supplier. `open` is the permission gate: it must succeed
/// before `next_frame` yields data, and its failure is surfaced to the
/// caller without automatic retry.
pub trait FrameSource: Send + Sync + 'static {
    fn open(&self) -> Result<(), CameraError>;

    fn next_frame(&self) -> Result<Option<Frame>, CameraError>;
}

/// Synthetic stand-in for a camera device: emits a scrolling gradient so the
/// pipeline can run end to end without real capture hardware.
pub struct TestPatternCamera {
    width: u32,
    height: u32,
    frame_count: AtomicU64,
}

impl TestPatternCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count: AtomicU64::new(0),
        }
    }
}

impl FrameSource for TestPatternCamera {
    fn open(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn next_frame(&self) -> Result<Option<Frame>, CameraError> {
        let shift = self.frame_count.fetch_add(1, Ordering::Relaxed);
        let pixels = Array3::from_shape_fn(
            (self.height as usize, self.width as usize, 3),
            |(y, x, c)| ((x as u64 + y as u64 + shift) % 256) as u8 >> (c as u8),
        );
        Ok(Some(Frame::new(pixels)))
    }
}
