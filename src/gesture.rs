//! Wrist-raise gesture classification.
//!
//! The decision is a pure function of the current detection set: no history,
//! no smoothing. Only the primary (first) detection is inspected.
//!
//! A gesture is active when the nose is confidently located and at least one
//! wrist is confidently located above it (smaller image `y`). Malformed poses
//! never escape this module: `classify` logs them and reports "inactive".

use serde::Serialize;
use thiserror::Error;

use crate::pose::{Keypoint, KeypointKind, PersonPose, PoseDetectionSet, POSE_KEYPOINTS};

/// Confidence thresholds for the wrist-raise rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureThresholds {
    /// The nose is usable when its confidence is at least this value.
    pub nose: f32,
    /// A wrist is usable when its confidence is strictly above this value.
    pub wrist: f32,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            nose: 0.5,
            wrist: 0.5,
        }
    }
}

/// Why a pose could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GestureError {
    #[error("pose has {found} keypoints, expected {expected}")]
    KeypointCount { expected: usize, found: usize },

    #[error("{kind} has a non-finite height or confidence")]
    NonFinite { kind: &'static str },

    #[error("{kind} confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange { kind: &'static str, value: f32 },
}

/// Outcome of evaluating a detection set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Nobody in frame.
    NoDetections,
    /// Nose below the confidence threshold, so there is no head reference.
    NoseUncertain,
    /// At least one wrist above the nose.
    WristRaised { left: bool, right: bool },
    /// Head located, neither wrist raised.
    WristsLowered,
}

impl Verdict {
    pub fn is_active(&self) -> bool {
        matches!(self, Verdict::WristRaised { .. })
    }
}

/// Per-cycle diagnostic record of the keypoints the rule reads.
#[derive(Debug, Serialize)]
struct KeypointDiagnostics<'a> {
    people: usize,
    nose: &'a Keypoint,
    left_wrist: &'a Keypoint,
    right_wrist: &'a Keypoint,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GestureClassifier {
    thresholds: GestureThresholds,
}

impl GestureClassifier {
    pub fn new(thresholds: GestureThresholds) -> Self {
        Self { thresholds }
    }

    /// Gesture state for this cycle. Never fails: every evaluation error maps
    /// to `false` so the actuator falls back to off.
    pub fn classify(&self, detections: &PoseDetectionSet) -> bool {
        match self.evaluate(detections) {
            Ok(verdict) => {
                log::debug!("gesture verdict: {:?}", verdict);
                verdict.is_active()
            }
            Err(err) => {
                log::warn!("gesture classification failed, treating as inactive: {}", err);
                false
            }
        }
    }

    /// Evaluate the wrist-raise rule on the primary detection.
    pub fn evaluate(&self, detections: &PoseDetectionSet) -> Result<Verdict, GestureError> {
        let Some(subject) = detections.primary() else {
            return Ok(Verdict::NoDetections);
        };

        let nose = checked_keypoint(subject, KeypointKind::Nose)?;
        let left = checked_keypoint(subject, KeypointKind::LeftWrist)?;
        let right = checked_keypoint(subject, KeypointKind::RightWrist)?;

        if log::log_enabled!(log::Level::Debug) {
            let record = KeypointDiagnostics {
                people: detections.len(),
                nose,
                left_wrist: left,
                right_wrist: right,
            };
            if let Ok(json) = serde_json::to_string(&record) {
                log::debug!("keypoints: {}", json);
            }
        }

        if nose.confidence < self.thresholds.nose {
            return Ok(Verdict::NoseUncertain);
        }

        let left_raised = self.wrist_raised(left, nose);
        let right_raised = self.wrist_raised(right, nose);
        if left_raised || right_raised {
            Ok(Verdict::WristRaised {
                left: left_raised,
                right: right_raised,
            })
        } else {
            Ok(Verdict::WristsLowered)
        }
    }

    fn wrist_raised(&self, wrist: &Keypoint, nose: &Keypoint) -> bool {
        wrist.confidence > self.thresholds.wrist && wrist.y < nose.y
    }
}

fn checked_keypoint(pose: &PersonPose, kind: KeypointKind) -> Result<&Keypoint, GestureError> {
    if !pose.has_canonical_shape() {
        return Err(GestureError::KeypointCount {
            expected: POSE_KEYPOINTS,
            found: pose.len(),
        });
    }
    let keypoint = pose.get(kind).ok_or(GestureError::KeypointCount {
        expected: POSE_KEYPOINTS,
        found: pose.len(),
    })?;
    // The rule reads only `y` and the confidence; `x` may be anything.
    if !keypoint.y.is_finite() || !keypoint.confidence.is_finite() {
        return Err(GestureError::NonFinite {
            kind: kind.as_str(),
        });
    }
    if !(0.0..=1.0).contains(&keypoint.confidence) {
        return Err(GestureError::ConfidenceOutOfRange {
            kind: kind.as_str(),
            value: keypoint.confidence,
        });
    }
    Ok(keypoint)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
