use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use gesture_trigger::{
    open_estimator, open_pin, ActuatorController, CameraSource, ChannelOrder, CliArgs,
    ExitReason, GestureClassifier, GestureLoop, PinId, PinRole,
};

#[test]
fn defaults_come_from_reference_constants() -> Result<()> {
    let cfg = CliArgs::try_parse_from(["gestured"])?.into_config()?;

    assert_eq!(cfg.camera.device, "/dev/video0");
    assert_eq!((cfg.camera.width, cfg.camera.height), (320, 640));
    assert_eq!(cfg.camera.order, ChannelOrder::Bgr);
    assert_eq!(cfg.model.image_size, 320);
    assert_eq!(cfg.model.min_confidence, 0.5);
    assert_eq!((cfg.gesture.nose, cfg.gesture.wrist), (0.5, 0.5));
    assert_eq!((cfg.pins.indicator, cfg.pins.alarm), (17, 18));
    assert!(cfg.display.enabled);
    assert_eq!(cfg.display.quit_poll, Duration::from_millis(1));
    assert_eq!(cfg.max_cycles, None);
    Ok(())
}

#[test]
fn flags_override_defaults() -> Result<()> {
    let args = CliArgs::try_parse_from([
        "gestured",
        "--camera",
        "stub://bench",
        "--channel-order",
        "rgb",
        "--imgsz",
        "640",
        "--wrist-conf",
        "0.7",
        "--indicator-pin",
        "22",
        "--alarm-pin",
        "23",
        "--headless",
        "--max-cycles",
        "10",
    ])?;
    let cfg = args.into_config()?;

    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!(cfg.camera.order, ChannelOrder::Rgb);
    assert_eq!(cfg.model.image_size, 640);
    assert_eq!(cfg.gesture.wrist, 0.7);
    assert!(!cfg.display.enabled);

    let settings = cfg.loop_settings();
    assert_eq!(settings.indicator, PinId(22));
    assert_eq!(settings.max_cycles, Some(10));
    Ok(())
}

#[test]
fn invalid_values_are_rejected_at_startup() {
    let parsed = CliArgs::try_parse_from(["gestured", "--imgsz", "321"]).unwrap();
    assert!(parsed.into_config().is_err());

    let parsed =
        CliArgs::try_parse_from(["gestured", "--indicator-pin", "5", "--alarm-pin", "5"]).unwrap();
    assert!(parsed.into_config().is_err());

    let parsed = CliArgs::try_parse_from(["gestured", "--nose-conf", "-0.1"]).unwrap();
    assert!(parsed.into_config().is_err());

    assert!(CliArgs::try_parse_from(["gestured", "--channel-order", "yuv"]).is_err());
}

#[test]
fn stub_stack_runs_to_cycle_limit() -> Result<()> {
    let cfg = CliArgs::try_parse_from([
        "gestured",
        "--camera",
        "stub://cam",
        "--model",
        "stub://pose",
        "--gpio-root",
        "stub://gpio",
        "--headless",
        "--max-cycles",
        "3",
    ])?
    .into_config()?;

    let mut actuators = ActuatorController::new();
    let indicator = PinId(cfg.pins.indicator);
    let alarm = PinId(cfg.pins.alarm);
    actuators.attach(indicator, PinRole::Indicator, open_pin(&cfg.pins.gpio_root, indicator)?)?;
    actuators.attach(alarm, PinRole::Alarm, open_pin(&cfg.pins.gpio_root, alarm)?)?;

    let mut estimator = open_estimator(&cfg.model.path, &cfg.estimator_settings())?;
    estimator.warm_up()?;
    let mut camera = CameraSource::new(cfg.camera_config())?;
    camera.connect()?;

    let report = GestureLoop::new(
        camera,
        estimator,
        GestureClassifier::new(cfg.gesture),
        actuators,
        cfg.loop_settings(),
    )
    .run();

    assert!(matches!(report.exit, ExitReason::CycleLimit));
    assert_eq!(report.cycles, 3);
    assert_eq!(report.activations, 0);
    assert!(report.cleanup.is_clean());
    assert_eq!(report.final_outputs, vec![(indicator, false), (alarm, false)]);
    Ok(())
}
