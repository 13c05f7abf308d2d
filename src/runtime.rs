//! The gesture loop.
//!
//! `GestureLoop` owns the camera, the pose estimator, the actuators and the
//! optional overlay for the whole run and moves through
//! `Init -> Running -> Cleanup -> Terminated`.
//!
//! Each cycle runs, in order: capture, inference, classification, actuation,
//! then (with an overlay) rendering and the quit poll. Cycles never overlap.
//!
//! The loop leaves `Running` on an interrupt (checked at the top of each
//! cycle), a quit request (checked at the end), the optional cycle limit, or
//! the first fault from capture, inference, actuation or rendering. A panic
//! inside a stage is caught and treated as that stage's fault. Faults are
//! not retried. Cleanup then forces every output off and releases the camera
//! and the display; every step is attempted even if an earlier one failed.
//! A loop dropped before it terminates (never run, or unwinding) cleans up in
//! `Drop`.

use anyhow::{anyhow, Context, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::actuator::{ActuatorController, PinId, PinRole};
use crate::frame::Frame;
use crate::gesture::GestureClassifier;
use crate::ingest::FrameSource;
use crate::overlay::{annotate, AnnotatedFrame, Overlay, Telemetry};
use crate::pose::{PoseEstimator, PoseInference};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    Cleanup,
    Terminated,
}

/// Cycle stage that raised a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Inference,
    Actuation,
    Render,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Capture => "capture",
            Stage::Inference => "inference",
            Stage::Actuation => "actuation",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// Why the loop left `Running`.
#[derive(Debug)]
pub enum ExitReason {
    /// External interrupt (SIGINT, SIGTERM or SIGHUP).
    Interrupted,
    /// Operator pressed the quit key.
    QuitRequested,
    /// Configured number of cycles completed.
    CycleLimit,
    /// A stage failed.
    Fault { stage: Stage, error: anyhow::Error },
}

impl ExitReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, ExitReason::Fault { .. })
    }
}

/// Cooperative shutdown flag shared with signal handlers.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler for SIGINT, SIGTERM and SIGHUP that triggers this
    /// signal. Can only be done once per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.trigger()).context("error setting Ctrl-C handler")
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct LoopSettings {
    /// Pin mirroring the gesture state.
    pub indicator: PinId,
    /// Keypoint confidence used when drawing the overlay.
    pub overlay_min_confidence: f32,
    /// How long the quit poll may wait each cycle.
    pub quit_poll: Duration,
    /// Stop after this many cycles.
    pub max_cycles: Option<u64>,
    /// Interval between `info` health lines.
    pub health_every: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            indicator: PinId(17),
            overlay_min_confidence: 0.5,
            quit_poll: Duration::from_millis(1),
            max_cycles: None,
            health_every: Duration::from_secs(5),
        }
    }
}

/// Result of one completed cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleOutcome {
    pub cycle: u64,
    pub people: usize,
    pub gesture: bool,
    pub telemetry: Telemetry,
    pub quit_requested: bool,
}

/// Cleanup step that can fail independently of the others.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanupStep {
    OutputsOff,
    ReleaseOutputs,
    ReleaseCamera,
    ReleaseDisplay,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub failures: Vec<(CleanupStep, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, step: CleanupStep, result: Result<()>) {
        if let Err(err) = result {
            log::error!("cleanup step {:?} failed: {:#}", step, err);
            self.failures.push((step, format!("{:#}", err)));
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub cycles: u64,
    pub activations: u64,
    pub exit: ExitReason,
    pub cleanup: CleanupReport,
    /// Last commanded level of every output after cleanup.
    pub final_outputs: Vec<(PinId, bool)>,
}

pub struct GestureLoop<S: FrameSource, E: PoseEstimator> {
    source: S,
    estimator: E,
    classifier: GestureClassifier,
    actuators: ActuatorController,
    overlay: Option<Box<dyn Overlay>>,
    shutdown: ShutdownSignal,
    settings: LoopSettings,
    state: LoopState,
    stage: Stage,
    cycles: u64,
    activations: u64,
}

impl<S: FrameSource, E: PoseEstimator> GestureLoop<S, E> {
    /// Take ownership of every resource. From here on the loop is responsible
    /// for releasing them. An indicator that is not attached to `actuators`
    /// surfaces as an actuation fault on the first cycle.
    pub fn new(
        source: S,
        estimator: E,
        classifier: GestureClassifier,
        actuators: ActuatorController,
        settings: LoopSettings,
    ) -> Self {
        Self {
            source,
            estimator,
            classifier,
            actuators,
            overlay: None,
            shutdown: ShutdownSignal::new(),
            settings,
            state: LoopState::Init,
            stage: Stage::Capture,
            cycles: 0,
            activations: 0,
        }
    }

    pub fn with_overlay(mut self, overlay: Box<dyn Overlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run until an exit condition fires, then clean up.
    pub fn run(mut self) -> RunReport {
        self.transition(LoopState::Running);
        let started = Instant::now();
        let mut last_health = Instant::now();

        let exit = loop {
            if let Some(reason) = self.exit_requested() {
                break reason;
            }
            let cycle = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()))
                .unwrap_or_else(|payload| {
                    Err((
                        self.stage,
                        anyhow!("panicked: {}", panic_message(payload.as_ref())),
                    ))
                });
            match cycle {
                Ok(outcome) => {
                    if last_health.elapsed() >= self.settings.health_every {
                        log::info!(
                            "health: cycles={} activations={} {} uptime={}s",
                            self.cycles,
                            self.activations,
                            outcome.telemetry.fps_label(),
                            started.elapsed().as_secs()
                        );
                        last_health = Instant::now();
                    }
                    if outcome.quit_requested {
                        break ExitReason::QuitRequested;
                    }
                }
                Err((stage, error)) => break ExitReason::Fault { stage, error },
            }
        };

        match &exit {
            ExitReason::Interrupted => log::info!("stopped by interrupt"),
            ExitReason::QuitRequested => log::info!("stopped by quit key"),
            ExitReason::CycleLimit => log::info!("stopped after {} cycles", self.cycles),
            ExitReason::Fault { stage, error } => {
                log::error!("{} failed, shutting down: {:#}", stage, error)
            }
        }

        self.transition(LoopState::Cleanup);
        let cleanup = self.cleanup();
        self.transition(LoopState::Terminated);

        RunReport {
            cycles: self.cycles,
            activations: self.activations,
            exit,
            cleanup,
            final_outputs: self.actuators.states(),
        }
    }

    fn exit_requested(&self) -> Option<ExitReason> {
        if self.shutdown.is_triggered() {
            return Some(ExitReason::Interrupted);
        }
        match self.settings.max_cycles {
            Some(limit) if self.cycles >= limit => Some(ExitReason::CycleLimit),
            _ => None,
        }
    }

    /// One pass through every stage.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, (Stage, anyhow::Error)> {
        self.stage = Stage::Capture;
        let frame = self.capture().map_err(|e| (Stage::Capture, e))?;
        self.stage = Stage::Inference;
        let inference = self.infer(&frame).map_err(|e| (Stage::Inference, e))?;
        self.stage = Stage::Actuation;
        let gesture = self.classifier.classify(&inference.detections);
        self.actuate(gesture).map_err(|e| (Stage::Actuation, e))?;

        self.stage = Stage::Render;
        let telemetry = Telemetry::new(inference.latency_ms);
        self.render(&frame, &inference, telemetry)
            .map_err(|e| (Stage::Render, e))?;
        let quit_requested = match self.overlay.as_mut() {
            Some(overlay) => overlay.poll_quit(self.settings.quit_poll),
            None => false,
        };

        self.cycles += 1;
        if gesture {
            self.activations += 1;
        }
        Ok(CycleOutcome {
            cycle: self.cycles,
            people: inference.detections.len(),
            gesture,
            telemetry,
            quit_requested,
        })
    }

    fn capture(&mut self) -> Result<Frame> {
        let frame = self.source.capture()?;
        Ok(frame.into_rgb())
    }

    fn infer(&mut self, frame: &Frame) -> Result<PoseInference> {
        let inference = self.estimator.infer(frame)?;
        log::debug!(
            "{}: {} people in {:.1}ms",
            self.estimator.name(),
            inference.detections.len(),
            inference.latency_ms
        );
        Ok(inference)
    }

    fn actuate(&mut self, gesture: bool) -> Result<()> {
        self.actuators.set_output(self.settings.indicator, gesture)?;
        log::debug!("LED {}", if gesture { "ON" } else { "OFF" });
        Ok(())
    }

    fn render(&mut self, frame: &Frame, inference: &PoseInference, telemetry: Telemetry) -> Result<()> {
        let Some(overlay) = self.overlay.as_mut() else {
            return Ok(());
        };
        let annotated = if overlay.draws_pixels() {
            annotate(
                frame,
                &inference.detections,
                self.settings.overlay_min_confidence,
                telemetry,
            )
        } else {
            AnnotatedFrame::summary(&inference.detections, telemetry)
        };
        overlay.show(&annotated)
    }

    fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        report.record(CleanupStep::OutputsOff, guarded(|| self.actuators.all_off()));
        report.record(CleanupStep::ReleaseOutputs, guarded(|| self.actuators.release()));
        report.record(CleanupStep::ReleaseCamera, guarded(|| self.source.release()));
        if let Some(overlay) = self.overlay.as_mut() {
            report.record(CleanupStep::ReleaseDisplay, guarded(|| overlay.release()));
        }
        if let Some(alarm) = self.actuators.pin_for(PinRole::Alarm) {
            log::debug!("alarm {} left off", alarm);
        }
        if report.is_clean() {
            log::info!("cleanup completed");
        } else {
            log::warn!("cleanup completed with {} failures", report.failures.len());
        }
        report
    }

    fn transition(&mut self, next: LoopState) {
        log::debug!("loop state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

impl<S: FrameSource, E: PoseEstimator> Drop for GestureLoop<S, E> {
    fn drop(&mut self) {
        if self.state != LoopState::Terminated {
            log::warn!("gesture loop dropped in state {:?}, cleaning up", self.state);
            self.transition(LoopState::Cleanup);
            self.cleanup();
            self.transition(LoopState::Terminated);
        }
    }
}

/// Run one cleanup step, turning a panic into an error so the remaining
/// steps still run.
fn guarded(step: impl FnOnce() -> Result<()>) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(step))
        .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
