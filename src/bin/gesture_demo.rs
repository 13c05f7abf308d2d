//! gesture_demo - end-to-end synthetic run of the gesture loop

use anyhow::{anyhow, Result};
use clap::Parser;

use gesture_trigger::{
    ActuatorController, ChannelOrder, ExitReason, Frame, GestureClassifier, GestureLoop,
    HeadlessOverlay, Keypoint, KeypointKind, LoopSettings, MemoryPin, PersonPose, PinId, PinRole,
    PoseDetectionSet, ScriptedEstimator, ScriptedSource,
};

const INDICATOR: PinId = PinId(17);
const ALARM: PinId = PinId(18);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames.
    #[arg(long, default_value_t = 12)]
    frames: usize,
    /// Raise a wrist every N-th frame.
    #[arg(long, default_value_t = 3)]
    raise_every: usize,
    /// Reported model latency in milliseconds.
    #[arg(long, default_value_t = 40.0)]
    latency_ms: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.raise_every == 0 {
        return Err(anyhow!("raise-every must be >= 1"));
    }

    stage("build synthetic frames + detections");
    let frames = (0..args.frames)
        .map(|_| Frame::filled(320, 640, ChannelOrder::Bgr, 32))
        .collect::<Result<Vec<_>>>()?;
    let script = (1..=args.frames).map(|i| {
        if i % args.raise_every == 0 {
            PoseDetectionSet::new(vec![raised_pose()])
        } else if i % 2 == 0 {
            PoseDetectionSet::new(vec![lowered_pose()])
        } else {
            PoseDetectionSet::empty()
        }
    });

    stage("attach in-memory outputs");
    let indicator = MemoryPin::new();
    let indicator_history = indicator.history();
    let mut actuators = ActuatorController::new();
    actuators.attach(INDICATOR, PinRole::Indicator, Box::new(indicator))?;
    actuators.attach(ALARM, PinRole::Alarm, Box::new(MemoryPin::new()))?;

    stage("run loop");
    let settings = LoopSettings {
        indicator: INDICATOR,
        max_cycles: Some(args.frames as u64),
        ..LoopSettings::default()
    };
    let report = GestureLoop::new(
        ScriptedSource::new(frames),
        ScriptedEstimator::new(script).with_latency_ms(args.latency_ms),
        GestureClassifier::default(),
        actuators,
        settings,
    )
    .with_overlay(Box::new(HeadlessOverlay::new()))
    .run();

    // Skip the initial low written on attach and the cleanup write.
    let levels = indicator_history.levels();
    let per_cycle: Vec<&str> = levels
        .iter()
        .skip(1)
        .take(report.cycles as usize)
        .map(|&on| if on { "on" } else { "off" })
        .collect();

    println!("demo summary:");
    println!("  cycles: {}", report.cycles);
    println!("  activations: {}", report.activations);
    println!("  indicator: [{}]", per_cycle.join(", "));
    println!("  exit: {:?}", report.exit);
    println!("  cleanup clean: {}", report.cleanup.is_clean());
    println!("  final outputs: {:?}", report.final_outputs);

    match report.exit {
        ExitReason::Fault { stage, error } => Err(error.context(format!("{} stage failed", stage))),
        _ => Ok(()),
    }
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}

fn base_pose() -> PersonPose {
    PersonPose::empty().with(KeypointKind::Nose, Keypoint::new(160.0, 200.0, 0.9))
}

fn raised_pose() -> PersonPose {
    base_pose()
        .with(KeypointKind::LeftWrist, Keypoint::new(120.0, 120.0, 0.8))
        .with(KeypointKind::RightWrist, Keypoint::new(200.0, 320.0, 0.9))
}

fn lowered_pose() -> PersonPose {
    base_pose()
        .with(KeypointKind::LeftWrist, Keypoint::new(120.0, 330.0, 0.8))
        .with(KeypointKind::RightWrist, Keypoint::new(200.0, 320.0, 0.9))
}
