use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;

use crate::actuator::{PinId, DEFAULT_GPIO_ROOT};
use crate::frame::ChannelOrder;
use crate::gesture::GestureThresholds;
use crate::ingest::CameraConfig;
use crate::pose::EstimatorSettings;
use crate::runtime::LoopSettings;

const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_FRAME_WIDTH: u32 = 320;
const DEFAULT_FRAME_HEIGHT: u32 = 640;
const DEFAULT_MODEL_PATH: &str = "yolov8n-pose.onnx";
const DEFAULT_IMAGE_SIZE: u32 = 320;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const DEFAULT_NOSE_CONFIDENCE: f32 = 0.5;
const DEFAULT_WRIST_CONFIDENCE: f32 = 0.5;
const DEFAULT_INDICATOR_PIN: u32 = 17;
const DEFAULT_ALARM_PIN: u32 = 18;
const DEFAULT_QUIT_POLL_MS: u64 = 1;

/// Model input sizes must be a multiple of the detector stride.
const MODEL_STRIDE: u32 = 32;

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub gesture: GestureThresholds,
    pub pins: PinSettings,
    pub display: DisplaySettings,
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: String,
    pub image_size: u32,
    pub min_confidence: f32,
}

#[derive(Debug, Clone)]
pub struct PinSettings {
    pub gpio_root: String,
    pub indicator: u32,
    pub alarm: u32,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub enabled: bool,
    pub quit_poll: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings {
                device: DEFAULT_CAMERA_DEVICE.to_string(),
                width: DEFAULT_FRAME_WIDTH,
                height: DEFAULT_FRAME_HEIGHT,
                order: ChannelOrder::Bgr,
            },
            model: ModelSettings {
                path: DEFAULT_MODEL_PATH.to_string(),
                image_size: DEFAULT_IMAGE_SIZE,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
            },
            gesture: GestureThresholds {
                nose: DEFAULT_NOSE_CONFIDENCE,
                wrist: DEFAULT_WRIST_CONFIDENCE,
            },
            pins: PinSettings {
                gpio_root: DEFAULT_GPIO_ROOT.to_string(),
                indicator: DEFAULT_INDICATOR_PIN,
                alarm: DEFAULT_ALARM_PIN,
            },
            display: DisplaySettings {
                enabled: true,
                quit_poll: Duration::from_millis(DEFAULT_QUIT_POLL_MS),
            },
            max_cycles: None,
        }
    }
}

impl TriggerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "frame size must be non-zero (got {}x{})",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.model.image_size == 0 || self.model.image_size % MODEL_STRIDE != 0 {
            return Err(anyhow!(
                "image size must be a positive multiple of {} (got {})",
                MODEL_STRIDE,
                self.model.image_size
            ));
        }
        check_unit("minimum detection confidence", self.model.min_confidence)?;
        check_unit("nose confidence threshold", self.gesture.nose)?;
        check_unit("wrist confidence threshold", self.gesture.wrist)?;
        if self.pins.indicator == self.pins.alarm {
            return Err(anyhow!(
                "indicator and alarm must use different pins (both {})",
                self.pins.indicator
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(anyhow!("cycle limit must be greater than zero"));
        }
        Ok(())
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.camera.device.clone(),
            width: self.camera.width,
            height: self.camera.height,
            order: self.camera.order,
        }
    }

    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            image_size: self.model.image_size,
            min_confidence: self.model.min_confidence,
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            indicator: PinId(self.pins.indicator),
            overlay_min_confidence: self.model.min_confidence,
            quit_poll: self.display.quit_poll,
            max_cycles: self.max_cycles,
            ..LoopSettings::default()
        }
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(anyhow!("{} must be within [0, 1] (got {})", name, value))
    }
}

/// Startup flags for `gestured`. Every flag defaults to the reference
/// constants.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Camera device path, or stub://<name> for a synthetic camera.
    #[arg(long, default_value = DEFAULT_CAMERA_DEVICE)]
    pub camera: String,
    /// Frame width in pixels.
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    pub width: u32,
    /// Frame height in pixels.
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    pub height: u32,
    /// Camera channel order (bgr or rgb).
    #[arg(long, default_value = "bgr")]
    pub channel_order: ChannelOrder,
    /// ONNX pose model path, or stub://<name> for the stub backend.
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    pub model: String,
    /// Model input size.
    #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE)]
    pub imgsz: u32,
    /// Minimum person detection confidence.
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    pub conf: f32,
    /// Minimum nose confidence for the gesture rule.
    #[arg(long, default_value_t = DEFAULT_NOSE_CONFIDENCE)]
    pub nose_conf: f32,
    /// Wrist confidence the gesture rule must exceed.
    #[arg(long, default_value_t = DEFAULT_WRIST_CONFIDENCE)]
    pub wrist_conf: f32,
    /// GPIO sysfs root, or stub://<name> for in-memory pins.
    #[arg(long, default_value = DEFAULT_GPIO_ROOT)]
    pub gpio_root: String,
    /// Indicator output pin.
    #[arg(long, default_value_t = DEFAULT_INDICATOR_PIN)]
    pub indicator_pin: u32,
    /// Alarm output pin.
    #[arg(long, default_value_t = DEFAULT_ALARM_PIN)]
    pub alarm_pin: u32,
    /// Run without the overlay and quit key.
    #[arg(long)]
    pub headless: bool,
    /// Quit-key poll timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_QUIT_POLL_MS)]
    pub quit_poll_ms: u64,
    /// Stop after this many cycles.
    #[arg(long)]
    pub max_cycles: Option<u64>,
}

impl CliArgs {
    pub fn into_config(self) -> Result<TriggerConfig> {
        let cfg = TriggerConfig {
            camera: CameraSettings {
                device: self.camera,
                width: self.width,
                height: self.height,
                order: self.channel_order,
            },
            model: ModelSettings {
                path: self.model,
                image_size: self.imgsz,
                min_confidence: self.conf,
            },
            gesture: GestureThresholds {
                nose: self.nose_conf,
                wrist: self.wrist_conf,
            },
            pins: PinSettings {
                gpio_root: self.gpio_root,
                indicator: self.indicator_pin,
                alarm: self.alarm_pin,
            },
            display: DisplaySettings {
                enabled: !self.headless,
                quit_poll: Duration::from_millis(self.quit_poll_ms),
            },
            max_cycles: self.max_cycles,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() -> Result<()> {
        let cfg = TriggerConfig::default();
        cfg.validate()?;

        assert_eq!((cfg.camera.width, cfg.camera.height), (320, 640));
        assert_eq!(cfg.camera.order, ChannelOrder::Bgr);
        assert_eq!(cfg.estimator_settings(), EstimatorSettings::default());
        assert_eq!(cfg.gesture, GestureThresholds::default());
        assert_eq!(cfg.loop_settings().indicator, PinId(17));
        assert_eq!(cfg.pins.alarm, 18);
        Ok(())
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = TriggerConfig::default();
        cfg.model.image_size = 300;
        assert!(cfg.validate().is_err());

        let mut cfg = TriggerConfig::default();
        cfg.gesture.wrist = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = TriggerConfig::default();
        cfg.pins.alarm = cfg.pins.indicator;
        assert!(cfg.validate().is_err());

        let mut cfg = TriggerConfig::default();
        cfg.max_cycles = Some(0);
        assert!(cfg.validate().is_err());

        let mut cfg = TriggerConfig::default();
        cfg.camera.height = 0;
        assert!(cfg.validate().is_err());
    }
}
