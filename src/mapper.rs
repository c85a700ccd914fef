//! Coordinate mapping from normalized landmarks into the consumer's canvas.
//!
//! The pose backend reports points with a top-left origin in [0, 1]. The
//! consumer expects absolute canvas coordinates with a bottom-left origin, so
//! every point is scaled and its vertical axis flipped. The chest midpoint is
//! derived from the mapped shoulders.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::landmark::{BodyPart, LandmarkSet, PointId};

pub const DEFAULT_CANVAS_WIDTH: f64 = 1000.0;
pub const DEFAULT_CANVAS_HEIGHT: f64 = 1000.0;

/// Target canvas dimensions. Both are finite and strictly positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Canvas {
    width: f64,
    height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !width.is_finite() || width <= 0.0 {
            return Err(anyhow!("canvas width must be positive, got {}", width));
        }
        if !height.is_finite() || height <= 0.0 {
            return Err(anyhow!("canvas height must be positive, got {}", height));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

/// One frame's points in target canvas space, keyed in wire order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappedFrame {
    points: BTreeMap<PointId, [f64; 2]>,
}

impl MappedFrame {
    pub fn get(&self, id: PointId) -> Option<[f64; 2]> {
        self.points.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointId, [f64; 2])> + '_ {
        self.points.iter().map(|(id, xy)| (*id, *xy))
    }

    fn insert(&mut self, id: PointId, xy: [f64; 2]) {
        self.points.insert(id, xy);
    }
}

/// Pure landmark-to-canvas transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoordinateMapper {
    canvas: Canvas,
}

impl CoordinateMapper {
    pub fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }

    pub fn map(&self, landmarks: &LandmarkSet) -> MappedFrame {
        map_landmarks(landmarks, self.canvas)
    }
}

/// Map a full landmark set into `canvas` space.
///
/// `x' = x * width`, `y' = (1 - y) * height`. `CHEST_MID` is the midpoint of
/// the mapped shoulders.
pub fn map_landmarks(landmarks: &LandmarkSet, canvas: Canvas) -> MappedFrame {
    let mut frame = MappedFrame::default();
    for (part, landmark) in landmarks.iter() {
        let x = landmark.x * canvas.width;
        let y = (1.0 - landmark.y) * canvas.height;
        frame.insert(part.into(), [x, y]);
    }

    let left = frame.get(BodyPart::LeftShoulder.into());
    let right = frame.get(BodyPart::RightShoulder.into());
    if let (Some(left), Some(right)) = (left, right) {
        frame.insert(
            PointId::ChestMid,
            [(left[0] + right[0]) / 2.0, (left[1] + right[1]) / 2.0],
        );
    }

    frame
}
