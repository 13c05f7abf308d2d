//! Camera frame source.
//!
//! This module provides `CameraSource` for capturing frames from the attached
//! camera. The camera source is responsible for:
//! - Opening the device node (e.g., /dev/video0) at the configured size
//! - Capturing frames in-memory in the configured channel order
//! - Releasing the device when the loop shuts down
//!
//! Device paths starting with `stub://` select a synthetic camera so the
//! daemon can run without hardware.

use anyhow::{anyhow, Result};
#[cfg(feature = "ingest-v4l2")]
use anyhow::Context;
#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;

use super::FrameSource;
use crate::frame::{ChannelOrder, Frame};

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://<name>`.
    pub device: String,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Channel order frames are delivered in.
    pub order: ChannelOrder,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 320,
            height: 640,
            order: ChannelOrder::Bgr,
        }
    }
}

/// Camera frame source.
///
/// Uses V4L2 for real devices, with a synthetic fallback for `stub://` paths.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "camera frame size must be non-zero (got {}x{})",
                config.width,
                config.height
            ));
        }
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::Device(DeviceCamera::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(anyhow!(
                    "camera device {} requires the ingest-v4l2 feature",
                    config.device
                ))
            }
        }
    }

    /// Open the device and start streaming.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

impl FrameSource for CameraSource {
    fn capture(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.capture(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.capture(),
        }
    }

    fn release(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.release(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
    pub streaming: bool,
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    streaming: bool,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            streaming: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.streaming = true;
        log::info!("CameraSource: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        if !self.streaming {
            return Err(anyhow!("camera {} not connected", self.config.device));
        }
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::new(pixels, self.config.width, self.config.height, self.config.order)
    }

    /// Gradient that shifts by one step per frame.
    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn release(&mut self) -> Result<()> {
        if self.streaming {
            log::info!("CameraSource: released {} (synthetic)", self.config.device);
        }
        self.streaming = false;
        Ok(())
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            streaming: self.streaming,
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2 device camera
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceCameraState>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceCameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open camera device {}", self.config.device))?;
        let mut format = device.format().context("read camera format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = match self.config.order {
            ChannelOrder::Bgr => v4l::FourCC::new(b"BGR3"),
            ChannelOrder::Rgb => v4l::FourCC::new(b"RGB3"),
        };

        let format = device
            .set_format(&format)
            .with_context(|| format!("set camera format on {}", self.config.device))?;
        let delivered = format.fourcc.repr;
        if &delivered != b"BGR3" && &delivered != b"RGB3" {
            return Err(anyhow!(
                "camera {} does not deliver packed 24-bit frames (fourcc {})",
                self.config.device,
                String::from_utf8_lossy(&delivered)
            ));
        }
        if format.width != self.config.width || format.height != self.config.height {
            log::warn!(
                "CameraSource: {} negotiated {}x{} instead of {}x{}",
                self.config.device,
                format.width,
                format.height,
                self.config.width,
                self.config.height
            );
        }
        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceCameraStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create camera buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{} {})",
            self.config.device,
            self.active_width,
            self.active_height,
            String::from_utf8_lossy(&delivered)
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("camera device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| anyhow::Error::new(err).context("capture camera frame"))?;

        let pixels = super::normalize::normalize_packed(
            buf,
            self.active_width,
            self.active_height,
            self.config.order,
            self.config.order,
        )?;
        self.frame_count += 1;
        Frame::new(pixels, self.active_width, self.active_height, self.config.order)
    }

    fn release(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            log::info!("CameraSource: released {}", self.config.device);
        }
        Ok(())
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            streaming: self.state.is_some(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            width: 32,
            height: 64,
            order: ChannelOrder::Bgr,
        }
    }

    #[test]
    fn camera_source_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.capture()?;
        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 64);
        assert_eq!(frame.order, ChannelOrder::Bgr);
        assert_eq!(source.stats().frames_captured, 1);

        Ok(())
    }

    #[test]
    fn camera_source_requires_connect() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        assert!(source.capture().is_err());
        Ok(())
    }

    #[test]
    fn released_camera_stops_capturing() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;
        source.capture()?;
        source.release()?;

        assert!(!source.stats().streaming);
        assert!(source.capture().is_err());
        Ok(())
    }

    #[test]
    fn zero_sized_camera_is_rejected() {
        let config = CameraConfig {
            width: 0,
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }
}
