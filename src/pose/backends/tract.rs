#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::frame::Frame;
use crate::landmark::Landmark;
use crate::pose::backend::{ConfidenceGate, ModelComplexity, PoseBackend, PoseEstimate, PoseOptions};
use crate::pose::vocabulary::{LandmarkTable, COCO_17};

/// Tract-based backend for single-person MoveNet ONNX models.
///
/// The model takes a `[1, S, S, 3]` int32 RGB tensor and yields
/// `[1, 1, 17, 3]` keypoints as `(y, x, score)` in normalized coordinates.
/// `model_complexity` selects the input size: 192 for the lightning model,
/// 256 for thunder.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: usize,
    gate: ConfidenceGate,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, options: PoseOptions) -> Result<Self> {
        let model_path = model_path.as_ref();
        let input_size = input_size_for(options.model_complexity);
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(i32::datum_type(), tvec!(1, input_size, input_size, 3)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} (input {}x{}, complexity {})",
            model_path.display(),
            input_size,
            input_size,
            options.model_complexity
        );

        Ok(Self {
            model,
            input_size,
            gate: ConfidenceGate::new(&options),
        })
    }

    /// Nearest-neighbour resize of the RGB frame into the model's square input.
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let pixels = frame.pixels();
        if frame.width == 0 || frame.height == 0 || pixels.len() != frame.expected_len() {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                frame.expected_len(),
                frame.width,
                frame.height,
                pixels.len()
            ));
        }

        let size = self.input_size;
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            let sy = y * src_h / size;
            let sx = x * src_w / size;
            pixels[(sy * src_w + sx) * 3 + c] as i32
        });

        Ok(input.into_tensor())
    }

    fn extract_keypoints(&self, outputs: TVec<TValue>) -> Result<PoseEstimate> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let flat: Vec<f32> = values.iter().copied().collect();
        if flat.len() < COCO_17.native_len * 3 {
            return Err(anyhow!(
                "expected {} keypoint values, model produced {}",
                COCO_17.native_len * 3,
                flat.len()
            ));
        }

        let landmarks: Vec<Landmark> = flat
            .chunks_exact(3)
            .take(COCO_17.native_len)
            .map(|kp| Landmark::new(kp[1] as f64, kp[0] as f64).with_visibility(kp[2]))
            .collect();
        let score = landmarks
            .iter()
            .filter_map(|lm| lm.visibility)
            .sum::<f32>()
            / landmarks.len() as f32;

        Ok(PoseEstimate { landmarks, score })
    }
}

fn input_size_for(complexity: ModelComplexity) -> usize {
    match complexity {
        ModelComplexity::Low => 192,
        ModelComplexity::Medium | ModelComplexity::High => 256,
    }
}

impl PoseBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn vocabulary(&self) -> &'static LandmarkTable {
        &COCO_17
    }

    fn estimate(&mut self, frame: &Frame) -> Result<Option<PoseEstimate>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let estimate = self.extract_keypoints(outputs)?;

        if self.gate.admit(estimate.score) {
            Ok(Some(estimate))
        } else {
            Ok(None)
        }
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.input_size;
        let blank = tract_ndarray::Array4::<i32>::zeros((1, size, size, 3)).into_tensor();
        self.model
            .run(tvec!(blank.into()))
            .context("ONNX warm-up failed")?;
        Ok(())
    }
}
