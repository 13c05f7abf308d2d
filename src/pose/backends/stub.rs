use anyhow::Result;
use std::time::Instant;

use crate::frame::Frame;
use crate::pose::estimator::{PoseEstimator, PoseInference};
use crate::pose::keypoint::PoseDetectionSet;

/// Stub backend for hardware-free runs. Never detects anyone.
#[derive(Default)]
pub struct StubEstimator {
    frames_seen: u64,
}

impl StubEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl PoseEstimator for StubEstimator {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame) -> Result<PoseInference> {
        let started = Instant::now();
        // Touch the frame so latency reflects a pass over the pixels.
        let _checksum = frame
            .pixels()
            .iter()
            .step_by(97)
            .fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
        self.frames_seen += 1;

        Ok(PoseInference {
            detections: PoseDetectionSet::empty(),
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;

    #[test]
    fn stub_backend_reports_no_people() -> Result<()> {
        let mut backend = StubEstimator::new();
        let frame = Frame::filled(4, 4, ChannelOrder::Rgb, 9)?;

        let out = backend.infer(&frame)?;
        assert!(out.detections.is_empty());
        assert!(out.latency_ms >= 0.0);
        assert_eq!(backend.frames_seen(), 1);
        Ok(())
    }
}
