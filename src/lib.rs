//! Gesture Trigger
//!
//! This crate turns a live camera feed into a digital output: a pose model
//! runs on every frame, a wrist-raise rule decides whether the gesture is
//! active, and an indicator pin follows the decision.
//!
//! # Architecture
//!
//! One synchronous loop owns every hardware resource:
//!
//! 1. **Capture**: a `FrameSource` returns the latest frame (BGR on the
//!    reference camera, converted to RGB before inference).
//! 2. **Inference**: a `PoseEstimator` returns the people it found and the
//!    model latency.
//! 3. **Classification**: `GestureClassifier` inspects the first person only
//!    and never fails; malformed poses read as "inactive".
//! 4. **Actuation**: `ActuatorController` drives the indicator pin.
//! 5. **Overlay** (optional): annotated frame, FPS, quit key.
//!
//! Whatever ends the loop (interrupt, quit key, cycle limit, fault), cleanup
//! forces every output off and releases the camera and the display.
//!
//! # Module Structure
//!
//! - `frame`: `Frame` and channel order
//! - `ingest`: frame sources (camera, scripted)
//! - `pose`: keypoint data model and estimator backends
//! - `gesture`: the wrist-raise classifier
//! - `actuator`: output pins and their controller
//! - `overlay`: annotation, telemetry, quit input
//! - `runtime`: the loop state machine
//! - `config`: startup constants and command-line flags

pub mod actuator;
pub mod config;
pub mod frame;
pub mod gesture;
pub mod ingest;
pub mod overlay;
pub mod pose;
pub mod runtime;

pub use actuator::{
    open_pin, ActuatorController, MemoryPin, OutputPin, PinHistory, PinId, PinRole, SysfsPin,
};
pub use config::{CliArgs, TriggerConfig};
pub use frame::{ChannelOrder, Frame};
pub use gesture::{GestureClassifier, GestureError, GestureThresholds, Verdict};
pub use ingest::{CameraConfig, CameraSource, FrameSource, ScriptedSource};
pub use overlay::{annotate, AnnotatedFrame, HeadlessOverlay, Overlay, Telemetry};
#[cfg(feature = "backend-tract")]
pub use pose::TractPoseEstimator;
pub use pose::{
    open_estimator, EstimatorSettings, Keypoint, KeypointKind, PersonPose, PoseDetectionSet,
    PoseEstimator, PoseInference, ScriptedEstimator, StubEstimator, POSE_KEYPOINTS,
};
pub use runtime::{
    CleanupReport, CleanupStep, CycleOutcome, ExitReason, GestureLoop, LoopSettings, LoopState,
    RunReport, ShutdownSignal, Stage,
};
