use anyhow::Result;

use super::keypoint::PoseDetectionSet;
use crate::frame::Frame;

/// Inference parameters handed to every backend.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorSettings {
    /// Square model input size in pixels.
    pub image_size: u32,
    /// Minimum person score for a detection to be reported.
    pub min_confidence: f32,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            image_size: 320,
            min_confidence: 0.5,
        }
    }
}

/// Output of one inference call.
#[derive(Clone, Debug, Default)]
pub struct PoseInference {
    pub detections: PoseDetectionSet,
    /// Time spent in the model itself, excluding capture and rendering.
    pub latency_ms: f64,
}

/// Pose estimation backend.
///
/// Backends are purely functional with respect to the loop's resources: they
/// read the frame and return detections, nothing else. A failing call is a
/// fault the loop does not retry.
pub trait PoseEstimator {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on an RGB frame.
    fn infer(&mut self, frame: &Frame) -> Result<PoseInference>;

    /// Optional warm-up hook, run once before the loop starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<E: PoseEstimator + ?Sized> PoseEstimator for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&mut self, frame: &Frame) -> Result<PoseInference> {
        (**self).infer(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
