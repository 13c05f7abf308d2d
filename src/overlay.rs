//! Operator overlay: annotated frames, FPS telemetry and the quit key.
//!
//! The overlay is optional. When present the loop hands it an annotated copy
//! of every frame after actuation, then polls it once for a quit request.
//!
//! FPS here is model throughput: `1000 / inference latency`. Capture and
//! rendering time are not part of it.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::frame::Frame;
use crate::pose::{PoseDetectionSet, SKELETON};

const KEYPOINT_COLOR: [u8; 3] = [255, 64, 64];
const LIMB_COLOR: [u8; 3] = [64, 160, 255];
const KEYPOINT_RADIUS: i64 = 2;

/// Timing of one cycle as shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Telemetry {
    pub inference_ms: f64,
}

impl Telemetry {
    pub fn new(inference_ms: f64) -> Self {
        Self { inference_ms }
    }

    /// Model frames per second, `None` when the latency is not positive.
    pub fn fps(&self) -> Option<f64> {
        if self.inference_ms > 0.0 && self.inference_ms.is_finite() {
            Some(1000.0 / self.inference_ms)
        } else {
            None
        }
    }

    pub fn fps_label(&self) -> String {
        match self.fps() {
            Some(fps) => format!("FPS: {:.1}", fps),
            None => "FPS: --".to_string(),
        }
    }
}

/// What the overlay receives each cycle.
///
/// `frame` holds the annotated RGB pixels. It is `None` when the overlay
/// declared it does not draw pixels, so no copy was made.
#[derive(Debug)]
pub struct AnnotatedFrame {
    pub frame: Option<Frame>,
    pub people: usize,
    pub telemetry: Telemetry,
}

impl AnnotatedFrame {
    /// Telemetry without pixels, for sinks that only report numbers.
    pub fn summary(detections: &PoseDetectionSet, telemetry: Telemetry) -> Self {
        Self {
            frame: None,
            people: detections.len(),
            telemetry,
        }
    }

    pub fn fps_label(&self) -> String {
        self.telemetry.fps_label()
    }
}

/// Draw keypoints above `min_confidence` and the limbs joining them on an
/// RGB copy of `frame`.
pub fn annotate(
    frame: &Frame,
    detections: &PoseDetectionSet,
    min_confidence: f32,
    telemetry: Telemetry,
) -> AnnotatedFrame {
    let mut canvas = frame.annotated_copy();
    for person in detections.iter() {
        for (a, b) in SKELETON {
            let (Some(ka), Some(kb)) = (person.get(a), person.get(b)) else {
                continue;
            };
            if ka.confidence > min_confidence && kb.confidence > min_confidence {
                draw_line(&mut canvas, (ka.x, ka.y), (kb.x, kb.y), LIMB_COLOR);
            }
        }
        for kp in person.keypoints() {
            if kp.confidence > min_confidence {
                draw_dot(&mut canvas, (kp.x, kp.y), KEYPOINT_COLOR);
            }
        }
    }
    AnnotatedFrame {
        frame: Some(canvas),
        people: detections.len(),
        telemetry,
    }
}

/// Canvas coordinate for a model-space position, clamped to a band around
/// the canvas so the drawing arithmetic stays far from `i64` limits.
fn canvas_point(canvas: &Frame, (x, y): (f32, f32)) -> Option<(i64, i64)> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let band = 2.0 * (canvas.width as f32 + canvas.height as f32);
    Some((x.clamp(-band, band) as i64, y.clamp(-band, band) as i64))
}

fn draw_dot(canvas: &mut Frame, center: (f32, f32), color: [u8; 3]) {
    let Some((cx, cy)) = canvas_point(canvas, center) else {
        return;
    };
    for dy in -KEYPOINT_RADIUS..=KEYPOINT_RADIUS {
        for dx in -KEYPOINT_RADIUS..=KEYPOINT_RADIUS {
            if dx * dx + dy * dy <= KEYPOINT_RADIUS * KEYPOINT_RADIUS {
                canvas.put_rgb(cx + dx, cy + dy, color);
            }
        }
    }
}

// Bresenham.
fn draw_line(canvas: &mut Frame, from: (f32, f32), to: (f32, f32), color: [u8; 3]) {
    let (Some((mut x0, mut y0)), Some((x1, y1))) =
        (canvas_point(canvas, from), canvas_point(canvas, to))
    else {
        return;
    };
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    for _ in 0..=(dx - dy) {
        canvas.put_rgb(x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Display sink plus the operator's quit input.
pub trait Overlay {
    /// Present an annotated frame.
    fn show(&mut self, annotated: &AnnotatedFrame) -> Result<()>;

    /// Whether `show` reads the annotated pixels. Sinks that only report
    /// telemetry return `false` and receive `AnnotatedFrame::summary`.
    fn draws_pixels(&self) -> bool {
        true
    }

    /// Return true once the operator asked to quit. Waits at most `timeout`.
    fn poll_quit(&mut self, timeout: Duration) -> bool;

    /// Tear down the display. Called once, during cleanup.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Overlay for boards without a display.
///
/// Telemetry goes to the log: every frame at `debug`, a summary at `info`
/// every `summary_every`. The quit key is read from stdin on a background
/// thread: a line consisting of `q` requests shutdown.
pub struct HeadlessOverlay {
    quit_rx: Option<Receiver<()>>,
    summary_every: Duration,
    last_summary: Instant,
    frames_shown: u64,
    released: bool,
}

impl HeadlessOverlay {
    pub fn new() -> Self {
        Self {
            quit_rx: None,
            summary_every: Duration::from_secs(5),
            last_summary: Instant::now(),
            frames_shown: 0,
            released: false,
        }
    }

    /// Watch stdin for the quit key.
    pub fn with_stdin_quit(self) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("quit-key".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if line.trim().eq_ignore_ascii_case("q") {
                        let _ = tx.send(());
                        break;
                    }
                }
            })
            .context("spawn quit-key reader")?;
        Ok(self.with_quit_channel(rx))
    }

    /// Use an arbitrary channel as the quit input.
    pub fn with_quit_channel(mut self, rx: Receiver<()>) -> Self {
        self.quit_rx = Some(rx);
        self
    }

    pub fn with_summary_every(mut self, every: Duration) -> Self {
        self.summary_every = every;
        self
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Default for HeadlessOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for HeadlessOverlay {
    fn draws_pixels(&self) -> bool {
        false
    }

    fn show(&mut self, annotated: &AnnotatedFrame) -> Result<()> {
        self.frames_shown += 1;
        log::debug!(
            "overlay: people={} {}",
            annotated.people,
            annotated.fps_label()
        );
        if self.last_summary.elapsed() >= self.summary_every {
            log::info!(
                "overlay: {} frames shown, {}",
                self.frames_shown,
                annotated.fps_label()
            );
            self.last_summary = Instant::now();
        }
        Ok(())
    }

    fn poll_quit(&mut self, timeout: Duration) -> bool {
        let Some(rx) = &self.quit_rx else {
            return false;
        };
        match rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // Input closed (e.g. stdin at EOF): stop polling.
                self.quit_rx = None;
                false
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            log::info!("overlay: released after {} frames", self.frames_shown);
        }
        self.released = true;
        self.quit_rx = None;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;
    use crate::pose::{Keypoint, KeypointKind, PersonPose};

    #[test]
    fn fps_is_model_throughput() {
        assert_eq!(Telemetry::new(40.0).fps(), Some(25.0));
        assert_eq!(Telemetry::new(40.0).fps_label(), "FPS: 25.0");
        assert_eq!(Telemetry::new(0.0).fps(), None);
        assert_eq!(Telemetry::new(0.0).fps_label(), "FPS: --");
    }

    #[test]
    fn annotate_draws_confident_keypoints_only() -> Result<()> {
        let frame = Frame::filled(20, 20, ChannelOrder::Bgr, 0)?;
        let person = PersonPose::empty()
            .with(KeypointKind::Nose, Keypoint::new(5.0, 5.0, 0.9))
            .with(KeypointKind::LeftWrist, Keypoint::new(15.0, 15.0, 0.1));
        let set = PoseDetectionSet::new(vec![person]);

        let annotated = annotate(&frame, &set, 0.5, Telemetry::new(50.0));
        assert_eq!(annotated.people, 1);
        assert_eq!(annotated.fps_label(), "FPS: 20.0");
        let canvas = annotated.frame.expect("annotated pixels");
        assert_eq!(canvas.order, ChannelOrder::Rgb);
        assert_eq!(canvas.rgb_at(5, 5), Some(KEYPOINT_COLOR));
        assert_eq!(canvas.rgb_at(15, 15), Some([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn annotate_draws_limbs_between_confident_keypoints() -> Result<()> {
        let frame = Frame::filled(30, 30, ChannelOrder::Rgb, 0)?;
        let person = PersonPose::empty()
            .with(KeypointKind::LeftElbow, Keypoint::new(5.0, 20.0, 0.9))
            .with(KeypointKind::LeftWrist, Keypoint::new(25.0, 20.0, 0.9));
        let annotated = annotate(&frame, &PoseDetectionSet::new(vec![person]), 0.5, Telemetry::new(10.0));

        let canvas = annotated.frame.expect("annotated pixels");
        assert_eq!(canvas.rgb_at(15, 20), Some(LIMB_COLOR));
        Ok(())
    }

    #[test]
    fn far_off_canvas_keypoints_are_clipped() -> Result<()> {
        let frame = Frame::filled(16, 16, ChannelOrder::Rgb, 0)?;
        let person = PersonPose::empty()
            .with(KeypointKind::LeftKnee, Keypoint::new(8.0, 8.0, 0.9))
            .with(KeypointKind::LeftAnkle, Keypoint::new(1e30, 10.0, 0.9))
            .with(KeypointKind::RightAnkle, Keypoint::new(-1e30, f32::MAX, 0.9))
            .with(KeypointKind::RightKnee, Keypoint::new(f32::INFINITY, 4.0, 0.9));
        let annotated = annotate(&frame, &PoseDetectionSet::new(vec![person]), 0.5, Telemetry::new(10.0));

        let canvas = annotated.frame.expect("annotated pixels");
        assert_eq!(canvas.rgb_at(8, 8), Some(KEYPOINT_COLOR));
        // The knee-to-ankle limb runs toward the clamped ankle.
        assert_eq!(canvas.rgb_at(15, 8), Some(LIMB_COLOR));
        Ok(())
    }

    #[test]
    fn headless_overlay_reports_quit_from_channel() {
        let (tx, rx) = mpsc::channel();
        let mut overlay = HeadlessOverlay::new().with_quit_channel(rx);

        assert!(!overlay.poll_quit(Duration::from_millis(1)));
        tx.send(()).unwrap();
        assert!(overlay.poll_quit(Duration::from_millis(1)));

        drop(tx);
        assert!(!overlay.poll_quit(Duration::from_millis(1)));
        assert!(!overlay.poll_quit(Duration::from_millis(1)));
    }

    #[test]
    fn headless_overlay_counts_frames() -> Result<()> {
        let mut overlay = HeadlessOverlay::new().with_summary_every(Duration::ZERO);
        assert!(!overlay.draws_pixels());
        let annotated = AnnotatedFrame::summary(&PoseDetectionSet::empty(), Telemetry::new(20.0));

        overlay.show(&annotated)?;
        overlay.show(&annotated)?;
        overlay.release()?;
        assert_eq!(overlay.frames_shown(), 2);
        Ok(())
    }
}
