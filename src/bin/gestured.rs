//! gestured - gesture trigger daemon
//!
//! This daemon:
//! 1. Opens the camera, the pose model and the output pins
//! 2. Runs the capture -> inference -> classification -> actuation loop
//! 3. Stops on Ctrl-C, the quit key, or the first hardware/model fault
//! 4. Forces every output off and releases the camera on the way out

use anyhow::{Context, Result};
use clap::Parser;

use gesture_trigger::{
    open_estimator, ActuatorController, CameraSource, CliArgs, ExitReason,
    FrameSource, GestureClassifier, GestureLoop, HeadlessOverlay, PinId, PinRole, PoseEstimator,
    ShutdownSignal, TriggerConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = CliArgs::parse().into_config()?;
    log::info!(
        "gestured {} starting: camera={} {}x{} model={} imgsz={} conf={}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.device,
        cfg.camera.width,
        cfg.camera.height,
        cfg.model.path,
        cfg.model.image_size,
        cfg.model.min_confidence
    );

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrlc()?;

    // Outputs first so they are low before anything else can fail.
    let mut actuators = ActuatorController::open_all(
        &cfg.pins.gpio_root,
        &[
            (PinId(cfg.pins.indicator), PinRole::Indicator),
            (PinId(cfg.pins.alarm), PinRole::Alarm),
        ],
    )?;
    let (estimator, camera) = match open_pipeline(&cfg) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            actuators.shutdown();
            return Err(err);
        }
    };

    let mut gesture_loop = GestureLoop::new(
        camera,
        estimator,
        GestureClassifier::new(cfg.gesture),
        actuators,
        cfg.loop_settings(),
    )
    .with_shutdown(shutdown);
    if cfg.display.enabled {
        match HeadlessOverlay::new().with_stdin_quit() {
            Ok(overlay) => {
                log::info!("type q + Enter to quit");
                gesture_loop = gesture_loop.with_overlay(Box::new(overlay));
            }
            Err(err) => log::warn!("overlay disabled: {:#}", err),
        }
    }

    log::info!(
        "gestured running: indicator=gpio{} alarm=gpio{}",
        cfg.pins.indicator,
        cfg.pins.alarm
    );
    let report = gesture_loop.run();
    log::info!(
        "gestured stopped after {} cycles ({} activations)",
        report.cycles,
        report.activations
    );

    match report.exit {
        ExitReason::Fault { stage, error } => {
            Err(error.context(format!("{} stage failed", stage)))
        }
        _ => Ok(()),
    }
}

/// Load and warm up the model, then open the camera. A camera that fails to
/// connect is released before the error is returned.
fn open_pipeline(cfg: &TriggerConfig) -> Result<(Box<dyn PoseEstimator>, CameraSource)> {
    let mut estimator = open_estimator(&cfg.model.path, &cfg.estimator_settings())?;
    estimator.warm_up().context("model warm-up")?;

    let mut camera = CameraSource::new(cfg.camera_config())?;
    if let Err(err) = camera.connect() {
        if let Err(release_err) = camera.release() {
            log::warn!("camera release after failed connect: {:#}", release_err);
        }
        return Err(err);
    }
    Ok((estimator, camera))
}
