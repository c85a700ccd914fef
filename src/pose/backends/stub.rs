use anyhow::Result;

use crate::frame::Frame;
use crate::landmark::Landmark;
use crate::pose::backend::{ConfidenceGate, PoseBackend, PoseEstimate, PoseOptions};
use crate::pose::vocabulary::{LandmarkTable, MEDIAPIPE_POSE};

/// Frames per presence cycle of the synthetic subject.
const CYCLE_FRAMES: u64 = 150;
/// Trailing frames of each cycle during which nobody is in view.
const ABSENT_FRAMES: u64 = 30;

/// Stub backend for demos and testing.
///
/// Emits a deterministic standing figure in MediaPipe's 33-landmark layout,
/// waving its left arm as the frame sequence advances. The subject leaves the
/// frame for the last `ABSENT_FRAMES` of every cycle.
pub struct StubBackend {
    options: PoseOptions,
    gate: ConfidenceGate,
}

impl StubBackend {
    pub fn new(options: PoseOptions) -> Self {
        Self {
            gate: ConfidenceGate::new(&options),
            options,
        }
    }

    pub fn options(&self) -> &PoseOptions {
        &self.options
    }

    fn subject_present(sequence: u64) -> bool {
        sequence % CYCLE_FRAMES < CYCLE_FRAMES - ABSENT_FRAMES
    }

    fn figure(sequence: u64) -> Vec<Landmark> {
        let mut points = vec![Landmark::new(0.5, 0.5).with_visibility(0.2); MEDIAPIPE_POSE.native_len];
        let phase = sequence as f64 * 0.12;
        let wave = phase.sin();

        let mut set = |index: usize, x: f64, y: f64| {
            points[index] = Landmark::new(x, y).with_visibility(0.95);
        };

        set(0, 0.50, 0.18);
        set(11, 0.58, 0.32);
        set(12, 0.42, 0.32);
        set(13, 0.66, 0.32 - 0.08 * wave);
        set(14, 0.36, 0.45);
        set(15, 0.70, 0.22 - 0.12 * wave);
        set(16, 0.35, 0.57);
        set(23, 0.55, 0.60);
        set(24, 0.45, 0.60);
        set(25, 0.56, 0.76);
        set(26, 0.44, 0.76);
        set(27, 0.57, 0.92);
        set(28, 0.43, 0.92);

        points
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(PoseOptions::default())
    }
}

impl PoseBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn vocabulary(&self) -> &'static LandmarkTable {
        &MEDIAPIPE_POSE
    }

    fn estimate(&mut self, frame: &Frame) -> Result<Option<PoseEstimate>> {
        if !Self::subject_present(frame.sequence) {
            self.gate.reset();
            return Ok(None);
        }

        let score = 0.9;
        if !self.gate.admit(score) {
            return Ok(None);
        }

        Ok(Some(PoseEstimate {
            landmarks: Self::figure(frame.sequence),
            score,
        }))
    }
}
