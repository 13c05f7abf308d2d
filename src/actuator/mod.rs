//! Digital outputs driven by the gesture loop.
//!
//! - `OutputPin`: one hardware output (sysfs GPIO or in-memory).
//! - `ActuatorController`: owns every pin, remembers the last commanded
//!   level, and forces everything off during cleanup.
//!
//! Writes are synchronous and not retried; a failed write is a loop fault.

mod memory;
mod sysfs;

use anyhow::{anyhow, Context, Result};

pub use memory::{MemoryPin, PinHistory};
pub use sysfs::{SysfsPin, DEFAULT_GPIO_ROOT};

/// Hardware pin number (BCM numbering on the reference board).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(pub u32);

impl std::fmt::Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}

/// What a pin is wired to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinRole {
    /// Indicator light mirroring the gesture state.
    Indicator,
    /// Buzzer. Wired and forced off at cleanup; no code path turns it on.
    Alarm,
}

/// A single digital output.
pub trait OutputPin: Send {
    /// Drive the output high (`true`) or low (`false`).
    fn write(&mut self, level: bool) -> Result<()>;

    /// Give the pin back to the system. Called once, during cleanup.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Open a pin under `gpio_root`. `stub://` roots give in-memory pins.
pub fn open_pin(gpio_root: &str, id: PinId) -> Result<Box<dyn OutputPin>> {
    if gpio_root.starts_with("stub://") {
        return Ok(Box::new(MemoryPin::new()));
    }
    let pin = SysfsPin::open(gpio_root, id.0)
        .with_context(|| format!("open {} under {}", id, gpio_root))?;
    Ok(Box::new(pin))
}

struct Actuator {
    id: PinId,
    role: PinRole,
    pin: Box<dyn OutputPin>,
    state: bool,
}

/// Owner of every output pin.
///
/// `set_output` always reaches the hardware, so repeating a command is
/// harmless and the recorded state is the last level successfully written.
#[derive(Default)]
pub struct ActuatorController {
    actuators: Vec<Actuator>,
}

impl ActuatorController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every pin under `gpio_root` and attach it low. When one fails,
    /// the pins already attached are shut down before the error returns.
    pub fn open_all(gpio_root: &str, pins: &[(PinId, PinRole)]) -> Result<Self> {
        let mut controller = Self::new();
        for &(id, role) in pins {
            let attached = open_pin(gpio_root, id).and_then(|pin| controller.attach(id, role, pin));
            if let Err(err) = attached {
                controller.shutdown();
                return Err(err);
            }
        }
        Ok(controller)
    }

    /// Register a pin and drive it low. A pin that cannot be driven low is
    /// released and not registered.
    pub fn attach(&mut self, id: PinId, role: PinRole, mut pin: Box<dyn OutputPin>) -> Result<()> {
        if self.actuators.iter().any(|a| a.id == id) {
            return Err(anyhow!("{} already attached", id));
        }
        if let Err(err) = pin.write(false) {
            if let Err(release_err) = pin.release() {
                log::warn!("release {} after failed init: {:#}", id, release_err);
            }
            return Err(err.context(format!("initialize {} ({:?}) low", id, role)));
        }
        self.actuators.push(Actuator {
            id,
            role,
            pin,
            state: false,
        });
        Ok(())
    }

    pub fn set_output(&mut self, id: PinId, state: bool) -> Result<()> {
        let actuator = self
            .actuators
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow!("{} is not attached", id))?;
        actuator
            .pin
            .write(state)
            .with_context(|| format!("write {} to {}", level_str(state), id))?;
        if actuator.state != state {
            log::debug!("{} ({:?}) -> {}", id, actuator.role, level_str(state));
        }
        actuator.state = state;
        Ok(())
    }

    /// Last commanded level, or `None` for unknown pins.
    pub fn state(&self, id: PinId) -> Option<bool> {
        self.actuators.iter().find(|a| a.id == id).map(|a| a.state)
    }

    pub fn pin_for(&self, role: PinRole) -> Option<PinId> {
        self.actuators.iter().find(|a| a.role == role).map(|a| a.id)
    }

    /// Snapshot of every pin's last commanded level.
    pub fn states(&self) -> Vec<(PinId, bool)> {
        self.actuators.iter().map(|a| (a.id, a.state)).collect()
    }

    /// Drive every pin low. Every pin is attempted even when an earlier one
    /// fails; the failures are returned together.
    pub fn all_off(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for actuator in &mut self.actuators {
            match actuator.pin.write(false) {
                Ok(()) => actuator.state = false,
                Err(err) => failures.push(format!("{}: {:#}", actuator.id, err)),
            }
        }
        joined(failures, "force outputs off")
    }

    /// Drive every pin low, then release them all, logging failures. For
    /// teardown paths that have nowhere to report errors.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.all_off() {
            log::error!("{:#}", err);
        }
        if let Err(err) = self.release() {
            log::error!("{:#}", err);
        }
    }

    /// Release every pin, attempting all of them.
    pub fn release(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for actuator in &mut self.actuators {
            if let Err(err) = actuator.pin.release() {
                failures.push(format!("{}: {:#}", actuator.id, err));
            }
        }
        joined(failures, "release outputs")
    }
}

fn joined(failures: Vec<String>, what: &str) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} failed: {}", what, failures.join("; ")))
    }
}

fn level_str(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPin;

    impl OutputPin for BrokenPin {
        fn write(&mut self, level: bool) -> Result<()> {
            if level {
                Err(anyhow!("pin stuck"))
            } else {
                Ok(())
            }
        }

        fn release(&mut self) -> Result<()> {
            Err(anyhow!("unexport refused"))
        }
    }

    fn controller_with(history: &PinHistory) -> ActuatorController {
        let mut controller = ActuatorController::new();
        controller
            .attach(PinId(17), PinRole::Indicator, Box::new(MemoryPin::with_history(history.clone())))
            .unwrap();
        controller
    }

    #[test]
    fn set_output_is_idempotent() -> Result<()> {
        let history = PinHistory::default();
        let mut controller = controller_with(&history);

        controller.set_output(PinId(17), true)?;
        controller.set_output(PinId(17), true)?;
        assert_eq!(controller.state(PinId(17)), Some(true));

        controller.set_output(PinId(17), false)?;
        assert_eq!(controller.state(PinId(17)), Some(false));

        // Attach drives low first; every command reaches the pin.
        assert_eq!(history.levels(), vec![false, true, true, false]);
        assert_eq!(history.level(), Some(false));
        Ok(())
    }

    #[test]
    fn unknown_pin_is_an_error() {
        let mut controller = ActuatorController::new();
        assert!(controller.set_output(PinId(4), true).is_err());
        assert_eq!(controller.state(PinId(4)), None);
    }

    #[test]
    fn duplicate_attach_is_rejected() {
        let history = PinHistory::default();
        let mut controller = controller_with(&history);
        assert!(controller
            .attach(PinId(17), PinRole::Alarm, Box::new(MemoryPin::new()))
            .is_err());
    }

    /// Pin whose every write fails; records whether it was released.
    struct DeadPin {
        released: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl OutputPin for DeadPin {
        fn write(&mut self, _level: bool) -> Result<()> {
            Err(anyhow!("no such device"))
        }

        fn release(&mut self) -> Result<()> {
            self.released.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn pin_that_cannot_start_low_is_released() {
        let released = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut controller = ActuatorController::new();
        let err = controller
            .attach(
                PinId(22),
                PinRole::Alarm,
                Box::new(DeadPin {
                    released: released.clone(),
                }),
            )
            .unwrap_err();

        assert!(format!("{:#}", err).contains("gpio22"));
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(controller.state(PinId(22)), None);
    }

    #[test]
    fn open_all_tears_down_earlier_pins_on_failure() -> Result<()> {
        let root = tempfile::tempdir()?;
        std::fs::create_dir_all(root.path().join("gpio17"))?;
        let gpio_root = root.path().to_string_lossy().into_owned();

        let err = ActuatorController::open_all(
            &gpio_root,
            &[(PinId(17), PinRole::Indicator), (PinId(18), PinRole::Alarm)],
        )
        .err()
        .expect("gpio18 never appears");
        assert!(format!("{:#}", err).contains("gpio18"));
        assert_eq!(std::fs::read_to_string(root.path().join("gpio17/value"))?, "0");
        Ok(())
    }

    #[test]
    fn open_all_with_memory_pins() -> Result<()> {
        let controller = ActuatorController::open_all(
            "stub://gpio",
            &[(PinId(17), PinRole::Indicator), (PinId(18), PinRole::Alarm)],
        )?;
        assert_eq!(controller.states(), vec![(PinId(17), false), (PinId(18), false)]);
        assert_eq!(controller.pin_for(PinRole::Alarm), Some(PinId(18)));
        Ok(())
    }

    #[test]
    fn failed_write_keeps_previous_state() -> Result<()> {
        let mut controller = ActuatorController::new();
        controller.attach(PinId(5), PinRole::Indicator, Box::new(BrokenPin))?;

        assert!(controller.set_output(PinId(5), true).is_err());
        assert_eq!(controller.state(PinId(5)), Some(false));
        Ok(())
    }

    #[test]
    fn all_off_and_release_attempt_every_pin() -> Result<()> {
        let alarm = PinHistory::default();
        let mut controller = ActuatorController::new();
        controller.attach(PinId(5), PinRole::Indicator, Box::new(BrokenPin))?;
        controller.attach(PinId(18), PinRole::Alarm, Box::new(MemoryPin::with_history(alarm.clone())))?;

        controller.all_off()?;
        assert_eq!(alarm.level(), Some(false));

        let err = controller.release().unwrap_err();
        assert!(err.to_string().contains("gpio5"));
        assert!(alarm.is_released());
        assert_eq!(controller.pin_for(PinRole::Alarm), Some(PinId(18)));
        Ok(())
    }
}
