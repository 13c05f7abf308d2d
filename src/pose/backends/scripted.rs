use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::frame::Frame;
use crate::pose::estimator::{PoseEstimator, PoseInference};
use crate::pose::keypoint::PoseDetectionSet;

/// Backend that returns a queued detection set per call.
///
/// Fails once the queue is drained, which the loop treats as an inference
/// fault.
pub struct ScriptedEstimator {
    script: VecDeque<PoseDetectionSet>,
    latency_ms: f64,
    calls: u64,
}

impl ScriptedEstimator {
    pub fn new(script: impl IntoIterator<Item = PoseDetectionSet>) -> Self {
        Self {
            script: script.into_iter().collect(),
            latency_ms: 25.0,
            calls: 0,
        }
    }

    /// Latency reported for every call.
    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl PoseEstimator for ScriptedEstimator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn infer(&mut self, _frame: &Frame) -> Result<PoseInference> {
        let detections = self
            .script
            .pop_front()
            .ok_or_else(|| anyhow!("scripted estimator exhausted after {} calls", self.calls))?;
        self.calls += 1;
        Ok(PoseInference {
            detections,
            latency_ms: self.latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;
    use crate::pose::keypoint::PersonPose;

    #[test]
    fn scripted_backend_replays_in_order() -> Result<()> {
        let frame = Frame::filled(1, 1, ChannelOrder::Rgb, 0)?;
        let mut backend = ScriptedEstimator::new([
            PoseDetectionSet::empty(),
            PoseDetectionSet::new(vec![PersonPose::empty()]),
        ])
        .with_latency_ms(40.0);

        assert!(backend.infer(&frame)?.detections.is_empty());
        let second = backend.infer(&frame)?;
        assert_eq!(second.detections.len(), 1);
        assert_eq!(second.latency_ms, 40.0);
        assert!(backend.infer(&frame).is_err());
        assert_eq!(backend.calls(), 2);
        Ok(())
    }
}
