use anyhow::{anyhow, Result};

use crate::frame::{ChannelOrder, BYTES_PER_PIXEL};

/// Swap the first and third byte of every packed pixel (BGR <-> RGB).
pub(crate) fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }
}

/// Validate a packed 24-bit buffer from a capture device and return it in
/// the requested channel order.
pub(crate) fn normalize_packed(
    pixels: &[u8],
    width: u32,
    height: u32,
    from: ChannelOrder,
    to: ChannelOrder,
) -> Result<Vec<u8>> {
    let expected = width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(BYTES_PER_PIXEL as u32))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
    if pixels.len() < expected {
        return Err(anyhow!(
            "{} frame too short: expected {}, got {}",
            from.as_str(),
            expected,
            pixels.len()
        ));
    }

    // Drivers may pad the mmap buffer past the image payload.
    let mut out = pixels[..expected].to_vec();
    if from != to {
        swap_red_blue(&mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_to_rgb_swaps_outer_channels() -> Result<()> {
        let bgr = vec![10u8, 20, 30, 40, 50, 60];
        let rgb = normalize_packed(&bgr, 2, 1, ChannelOrder::Bgr, ChannelOrder::Rgb)?;
        assert_eq!(rgb, vec![30, 20, 10, 60, 50, 40]);
        Ok(())
    }

    #[test]
    fn same_order_truncates_driver_padding() -> Result<()> {
        let padded = vec![1u8; 9 + 4];
        let out = normalize_packed(&padded, 1, 3, ChannelOrder::Bgr, ChannelOrder::Bgr)?;
        assert_eq!(out, vec![1u8; 9]);
        Ok(())
    }

    #[test]
    fn short_buffer_is_rejected() {
        let short = vec![0u8; 5];
        assert!(normalize_packed(&short, 1, 2, ChannelOrder::Rgb, ChannelOrder::Rgb).is_err());
    }
}
