use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use super::OutputPin;

/// Shared record of every level written to a `MemoryPin`.
///
/// Clones observe the same record, so a test can keep one while the loop owns
/// the pin.
#[derive(Clone, Debug, Default)]
pub struct PinHistory {
    inner: Arc<Mutex<PinRecord>>,
}

#[derive(Debug, Default)]
struct PinRecord {
    levels: Vec<bool>,
    released: bool,
}

impl PinHistory {
    /// Every level written, oldest first.
    pub fn levels(&self) -> Vec<bool> {
        self.inner.lock().map(|r| r.levels.clone()).unwrap_or_default()
    }

    /// Last level written, if any.
    pub fn level(&self) -> Option<bool> {
        self.inner.lock().ok().and_then(|r| r.levels.last().copied())
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().map(|r| r.released).unwrap_or(false)
    }
}

/// In-memory output pin, used for `stub://` GPIO roots and tests.
#[derive(Debug, Default)]
pub struct MemoryPin {
    history: PinHistory,
}

impl MemoryPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: PinHistory) -> Self {
        Self { history }
    }

    pub fn history(&self) -> PinHistory {
        self.history.clone()
    }
}

impl OutputPin for MemoryPin {
    fn write(&mut self, level: bool) -> Result<()> {
        let mut record = self
            .history
            .inner
            .lock()
            .map_err(|_| anyhow!("pin history lock poisoned"))?;
        if record.released {
            return Err(anyhow!("write to released pin"));
        }
        record.levels.push(level);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let mut record = self
            .history
            .inner
            .lock()
            .map_err(|_| anyhow!("pin history lock poisoned"))?;
        record.released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pin_records_levels_and_release() -> Result<()> {
        let mut pin = MemoryPin::new();
        let history = pin.history();

        pin.write(true)?;
        pin.write(false)?;
        pin.release()?;

        assert_eq!(history.levels(), vec![true, false]);
        assert!(history.is_released());
        assert!(pin.write(true).is_err());
        Ok(())
    }
}
