use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::frame::Frame;
use crate::landmark::Landmark;
use crate::pose::vocabulary::LandmarkTable;

/// Model size/quality trade-off requested from the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelComplexity {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for ModelComplexity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" | "0" => Ok(ModelComplexity::Low),
            "medium" | "1" => Ok(ModelComplexity::Medium),
            "high" | "2" => Ok(ModelComplexity::High),
            other => Err(anyhow!(
                "model complexity must be low, medium or high (got {})",
                other
            )),
        }
    }
}

impl fmt::Display for ModelComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelComplexity::Low => "low",
            ModelComplexity::Medium => "medium",
            ModelComplexity::High => "high",
        };
        f.write_str(name)
    }
}

/// Knobs handed to the pose backend unmodified.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseOptions {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub model_complexity: ModelComplexity,
}

impl Default for PoseOptions {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            model_complexity: ModelComplexity::Medium,
        }
    }
}

impl PoseOptions {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Raw backend output for one person, in the backend's own vocabulary.
#[derive(Clone, Debug)]
pub struct PoseEstimate {
    /// Landmarks indexed by the backend's native landmark index.
    pub landmarks: Vec<Landmark>,
    /// Overall pose confidence in [0, 1].
    pub score: f32,
}

/// Pose estimation backend.
///
/// Backends own their model session for the lifetime of the capture loop.
/// They must treat the frame as read-only and must not retain it past the
/// `estimate` call.
pub trait PoseBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Translation table from native indices to canonical body parts.
    fn vocabulary(&self) -> &'static LandmarkTable;

    /// Run estimation on a frame. `Ok(None)` means no person was found.
    fn estimate(&mut self, frame: &Frame) -> Result<Option<PoseEstimate>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Detection/tracking hysteresis on the overall pose score.
///
/// With no person tracked, a pose must reach the detection threshold. Once a
/// person is being tracked, the (usually lower) tracking threshold applies.
#[derive(Clone, Debug)]
pub struct ConfidenceGate {
    min_detection: f32,
    min_tracking: f32,
    tracking: bool,
}

impl ConfidenceGate {
    pub fn new(options: &PoseOptions) -> Self {
        Self {
            min_detection: options.min_detection_confidence,
            min_tracking: options.min_tracking_confidence,
            tracking: false,
        }
    }

    /// Returns true when a pose with `score` should be reported.
    pub fn admit(&mut self, score: f32) -> bool {
        let threshold = if self.tracking {
            self.min_tracking
        } else {
            self.min_detection
        };
        self.tracking = score >= threshold;
        self.tracking
    }

    /// Forget the tracked person (e.g. the backend found nothing).
    pub fn reset(&mut self) {
        self.tracking = false;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }
}
