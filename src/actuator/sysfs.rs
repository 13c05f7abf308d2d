use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::OutputPin;

/// Linux sysfs GPIO class directory.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Output pin driven through the sysfs GPIO interface.
///
/// Opening exports the pin (if the kernel has not already), sets it as an
/// output, and keeps the path of its `value` file. Release drives it low and
/// unexports it when this process did the export.
pub struct SysfsPin {
    root: PathBuf,
    number: u32,
    value_path: PathBuf,
    exported_here: bool,
}

impl SysfsPin {
    pub fn open(root: impl AsRef<Path>, number: u32) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let pin_dir = root.join(format!("gpio{}", number));

        let mut exported_here = false;
        if !pin_dir.exists() {
            fs::write(root.join("export"), number.to_string())
                .with_context(|| format!("export gpio{}", number))?;
            exported_here = true;
            wait_for(&pin_dir)?;
        }

        fs::write(pin_dir.join("direction"), "out")
            .with_context(|| format!("set gpio{} direction", number))?;

        log::debug!("SysfsPin: gpio{} ready under {}", number, root.display());
        Ok(Self {
            root,
            number,
            value_path: pin_dir.join("value"),
            exported_here,
        })
    }
}

/// udev may take a moment to create the pin directory after export.
fn wait_for(path: &Path) -> Result<()> {
    for _ in 0..20 {
        if path.exists() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }
    Err(anyhow!("{} did not appear after export", path.display()))
}

impl OutputPin for SysfsPin {
    fn write(&mut self, level: bool) -> Result<()> {
        fs::write(&self.value_path, if level { "1" } else { "0" })
            .with_context(|| format!("write {}", self.value_path.display()))
    }

    fn release(&mut self) -> Result<()> {
        self.write(false)?;
        if self.exported_here {
            fs::write(self.root.join("unexport"), self.number.to_string())
                .with_context(|| format!("unexport gpio{}", self.number))?;
            self.exported_here = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_gpio_root(pins: &[u32]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp gpio root");
        for pin in pins {
            fs::create_dir_all(dir.path().join(format!("gpio{}", pin))).expect("pin dir");
        }
        dir
    }

    #[test]
    fn sysfs_pin_writes_direction_and_value() -> Result<()> {
        let root = fake_gpio_root(&[17]);
        let mut pin = SysfsPin::open(root.path(), 17)?;

        let pin_dir = root.path().join("gpio17");
        assert_eq!(fs::read_to_string(pin_dir.join("direction"))?, "out");

        pin.write(true)?;
        assert_eq!(fs::read_to_string(pin_dir.join("value"))?, "1");
        pin.write(false)?;
        assert_eq!(fs::read_to_string(pin_dir.join("value"))?, "0");
        Ok(())
    }

    #[test]
    fn preexported_pin_is_not_unexported() -> Result<()> {
        let root = fake_gpio_root(&[18]);
        let mut pin = SysfsPin::open(root.path(), 18)?;
        pin.write(true)?;
        pin.release()?;

        assert_eq!(fs::read_to_string(root.path().join("gpio18/value"))?, "0");
        assert!(!root.path().join("unexport").exists());
        Ok(())
    }

    #[test]
    fn missing_pin_directory_fails_after_export() {
        let root = fake_gpio_root(&[]);
        let err = SysfsPin::open(root.path(), 22).err().expect("open must fail");
        assert!(err.to_string().contains("did not appear"));
        assert_eq!(
            fs::read_to_string(root.path().join("export")).unwrap(),
            "22"
        );
    }
}
