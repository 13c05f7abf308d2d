mod backends;
mod estimator;
mod keypoint;

pub use backends::{open_estimator, ScriptedEstimator, StubEstimator};
#[cfg(feature = "backend-tract")]
pub use backends::TractPoseEstimator;
pub use estimator::{EstimatorSettings, PoseEstimator, PoseInference};
pub use keypoint::{Keypoint, KeypointKind, PersonPose, PoseDetectionSet, POSE_KEYPOINTS, SKELETON};
