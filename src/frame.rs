//! Frame container handed from the frame source to the pose estimator.
//!
//! - `Frame`: one captured image. Pixel bytes are private; callers read them
//!   through `pixels()` and never mutate them in place.
//! - `ChannelOrder`: byte order of each 3-byte pixel.
//!
//! A frame is produced fresh each cycle and dropped once the cycle ends.

use anyhow::{anyhow, Result};

use crate::ingest::normalize::swap_red_blue;

/// Bytes per pixel for every supported channel order.
pub const BYTES_PER_PIXEL: usize = 3;

/// Byte order of a packed 24-bit pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    /// Camera-native order on the reference hardware.
    #[default]
    Bgr,
}

impl ChannelOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelOrder::Rgb => "rgb",
            ChannelOrder::Bgr => "bgr",
        }
    }
}

impl std::str::FromStr for ChannelOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" => Ok(ChannelOrder::Rgb),
            "bgr" => Ok(ChannelOrder::Bgr),
            other => Err(anyhow!("unknown channel order '{}' (expected rgb or bgr)", other)),
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// A single captured image.
///
/// There is no `Clone`: a frame is consumed by the cycle that captured it.
/// `annotated_copy` exists for the overlay, which draws on its own buffer.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
}

impl Frame {
    /// Wrap a packed pixel buffer. Fails when the length does not match
    /// `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, order: ChannelOrder) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            order,
        })
    }

    /// Uniformly filled frame. Used by synthetic sources.
    pub fn filled(width: u32, height: u32, order: ChannelOrder, value: u8) -> Result<Self> {
        let len = expected_len(width, height)?;
        Self::new(vec![value; len], width, height, order)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Convert to RGB order. Frames already in RGB are returned unchanged.
    pub fn into_rgb(mut self) -> Self {
        if self.order == ChannelOrder::Bgr {
            swap_red_blue(&mut self.data);
            self.order = ChannelOrder::Rgb;
        }
        self
    }

    /// RGB pixel at `(x, y)`, or `None` outside the frame.
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = &self.data[idx..idx + BYTES_PER_PIXEL];
        Some(match self.order {
            ChannelOrder::Rgb => [px[0], px[1], px[2]],
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        })
    }

    /// RGB copy whose pixels the overlay may draw on.
    pub fn annotated_copy(&self) -> Frame {
        let mut data = self.data.clone();
        if self.order == ChannelOrder::Bgr {
            swap_red_blue(&mut data);
        }
        Frame {
            data,
            width: self.width,
            height: self.height,
            order: ChannelOrder::Rgb,
        }
    }

    /// Write one RGB pixel. Out-of-bounds writes are ignored.
    pub(crate) fn put_rgb(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = match self.order {
            ChannelOrder::Rgb => color,
            ChannelOrder::Bgr => [color[2], color[1], color[0]],
        };
        self.data[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&px);
    }
}

impl std::fmt::Debug for Frame {
    // Pixel content stays out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_length_mismatch() {
        assert!(Frame::new(vec![0u8; 5], 1, 2, ChannelOrder::Rgb).is_err());
        assert!(Frame::new(vec![0u8; 6], 1, 2, ChannelOrder::Rgb).is_ok());
    }

    #[test]
    fn bgr_frame_converts_to_rgb() -> Result<()> {
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, ChannelOrder::Bgr)?;
        assert_eq!(frame.rgb_at(0, 0), Some([3, 2, 1]));

        let rgb = frame.into_rgb();
        assert_eq!(rgb.order, ChannelOrder::Rgb);
        assert_eq!(rgb.pixels(), &[3, 2, 1, 6, 5, 4]);
        assert_eq!(rgb.rgb_at(1, 0), Some([6, 5, 4]));
        assert_eq!(rgb.rgb_at(2, 0), None);
        Ok(())
    }

    #[test]
    fn annotated_copy_leaves_source_untouched() -> Result<()> {
        let frame = Frame::filled(2, 2, ChannelOrder::Bgr, 0)?;
        let mut copy = frame.annotated_copy();
        copy.put_rgb(1, 1, [255, 0, 0]);
        copy.put_rgb(-1, 9, [255, 0, 0]);

        assert_eq!(copy.rgb_at(1, 1), Some([255, 0, 0]));
        assert!(frame.pixels().iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn channel_order_parses() {
        assert_eq!("BGR".parse::<ChannelOrder>().unwrap(), ChannelOrder::Bgr);
        assert_eq!(" rgb ".parse::<ChannelOrder>().unwrap(), ChannelOrder::Rgb);
        assert!("yuyv".parse::<ChannelOrder>().is_err());
    }
}
