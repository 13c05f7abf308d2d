use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use super::FrameSource;
use crate::frame::Frame;

/// Frame source that replays a fixed queue of frames.
///
/// Once the queue is drained, `capture` fails the way an unplugged camera
/// would.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    captured: u64,
    released: bool,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            captured: 0,
            released: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn captured(&self) -> u64 {
        self.captured
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameSource for ScriptedSource {
    fn capture(&mut self) -> Result<Frame> {
        if self.released {
            return Err(anyhow!("scripted source already released"));
        }
        let frame = self
            .frames
            .pop_front()
            .ok_or_else(|| anyhow!("scripted source exhausted after {} frames", self.captured))?;
        self.captured += 1;
        Ok(frame)
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        self.frames.clear();
        Ok(())
    }
}
