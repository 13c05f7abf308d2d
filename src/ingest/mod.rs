//! Frame acquisition.
//!
//! This module provides the sources that feed the gesture loop:
//! - Camera devices (V4L2, feature: ingest-v4l2)
//! - Synthetic camera (`stub://` device paths)
//! - Scripted frames (tests and demo runs)
//!
//! Every source hands out one `Frame` per `capture` call and keeps nothing
//! once the frame is returned. Capture failures are not recovered locally;
//! they propagate to the loop, which shuts down.

pub mod camera;
pub(crate) mod normalize;
pub mod scripted;

use anyhow::Result;

use crate::frame::Frame;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use scripted::ScriptedSource;

/// Blocking frame source.
pub trait FrameSource {
    /// Block until the most recent frame is available and return it.
    fn capture(&mut self) -> Result<Frame>;

    /// Release the underlying device. Called once, during cleanup.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn capture(&mut self) -> Result<Frame> {
        (**self).capture()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}
