//! Video frame sources.
//!
//! A source is opened once by the capture loop, polled for one frame per
//! iteration, and closed when the loop stops. Read failures on a single frame
//! are reported as errors and treated as drops by the caller; only `open`
//! failures are fatal.
//!
//! Sources:
//! - Local camera devices (feature: ingest-v4l2)
//! - Synthetic `stub://` source (testing, demos)

mod camera;

pub use camera::{CameraConfig, CameraSource};

use anyhow::Result;

use crate::frame::Frame;

/// A video source driven by the capture loop.
pub trait FrameSource {
    /// Human-readable identifier for logs.
    fn describe(&self) -> String;

    /// Acquire the underlying device. Failure here is fatal to the loop.
    fn open(&mut self) -> Result<()>;

    /// Read the next frame. An error drops this frame only.
    fn next_frame(&mut self) -> Result<Frame>;

    /// False once the source has been closed or has permanently ended.
    fn is_open(&self) -> bool;

    /// Release the underlying device. Must be idempotent.
    fn close(&mut self);

    /// Whether the source is still delivering frames. Reported by the
    /// capture loop's periodic health line.
    fn is_healthy(&self) -> bool {
        true
    }
}
