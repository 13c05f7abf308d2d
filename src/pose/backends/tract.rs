#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::frame::Frame;
use crate::pose::estimator::{EstimatorSettings, PoseEstimator, PoseInference};
use crate::pose::keypoint::{Keypoint, PersonPose, PoseDetectionSet, POSE_KEYPOINTS};

/// Rows per candidate in a YOLOv8-pose output: box (4), person score (1),
/// then x/y/confidence for each keypoint.
const OUTPUT_ROWS: usize = 5 + POSE_KEYPOINTS * 3;
const NMS_IOU: f32 = 0.7;
const MAX_DETECTIONS: usize = 300;
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Tract-based backend for YOLOv8-pose ONNX models.
///
/// Loads a local model file once and runs it on letterboxed RGB frames. It does
/// not perform any network I/O or write to disk beyond model loading.
pub struct TractPoseEstimator {
    model: TypedRunnableModel<TypedModel>,
    settings: EstimatorSettings,
}

/// Mapping between source-frame pixels and the square model input.
#[derive(Clone, Copy, Debug)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let scaled_w = (width as f32 * scale).round();
        let scaled_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: (size as f32 - scaled_w) / 2.0,
            pad_y: (size as f32 - scaled_h) / 2.0,
        }
    }

    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

struct Candidate {
    score: f32,
    bbox: [f32; 4],
    keypoints: Vec<Keypoint>,
}

impl TractPoseEstimator {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: EstimatorSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = settings.image_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractPoseEstimator: loaded {} (imgsz={}, conf={})",
            model_path.display(),
            settings.image_size,
            settings.min_confidence
        );
        Ok(Self { model, settings })
    }

    fn build_input(&self, frame: &Frame, letterbox: &Letterbox) -> Tensor {
        let size = self.settings.image_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            let (sx, sy) = letterbox.to_source(x as f32 + 0.5, y as f32 + 0.5);
            if sx < 0.0 || sy < 0.0 {
                return PAD_VALUE;
            }
            match frame.rgb_at(sx as u32, sy as u32) {
                Some(px) => px[c] as f32 / 255.0,
                None => PAD_VALUE,
            }
        });
        input.into_tensor()
    }

    fn decode(&self, output: &Tensor, letterbox: &Letterbox) -> Result<PoseDetectionSet> {
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not rank 3")?;
        let (_, rows, count) = view.dim();
        if rows != OUTPUT_ROWS {
            return Err(anyhow!(
                "expected {} output rows for a {}-keypoint pose model, got {}",
                OUTPUT_ROWS,
                POSE_KEYPOINTS,
                rows
            ));
        }

        let mut candidates = Vec::new();
        for i in 0..count {
            let score = view[[0, 4, i]];
            if !(score > self.settings.min_confidence) {
                continue;
            }
            let (cx, cy, w, h) = (view[[0, 0, i]], view[[0, 1, i]], view[[0, 2, i]], view[[0, 3, i]]);
            let keypoints = (0..POSE_KEYPOINTS)
                .map(|k| {
                    let base = 5 + k * 3;
                    let (x, y) = letterbox.to_source(view[[0, base, i]], view[[0, base + 1, i]]);
                    Keypoint::new(x, y, view[[0, base + 2, i]].clamp(0.0, 1.0))
                })
                .collect();
            candidates.push(Candidate {
                score,
                bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
                keypoints,
            });
        }

        let people = non_max_suppression(candidates)
            .into_iter()
            .map(|c| PersonPose::new(c.keypoints))
            .collect();
        Ok(PoseDetectionSet::new(people))
    }
}

fn non_max_suppression(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= MAX_DETECTIONS {
            break;
        }
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) < NMS_IOU) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

impl PoseEstimator for TractPoseEstimator {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame) -> Result<PoseInference> {
        let letterbox = Letterbox::fit(frame.width, frame.height, self.settings.image_size);
        let input = self.build_input(frame, &letterbox);

        let started = Instant::now();
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let detections = self.decode(output, &letterbox)?;

        Ok(PoseInference {
            detections,
            latency_ms,
        })
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.settings.image_size;
        let blank = Frame::filled(size, size, crate::frame::ChannelOrder::Rgb, 0)?;
        self.infer(&blank).map(|_| ())
    }
}
