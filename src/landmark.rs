//! Canonical body-part vocabulary and per-frame landmark sets.
//!
//! Everything downstream of the pose backend speaks this vocabulary. Model
//! specific landmark indices are translated in `pose::vocabulary` and never
//! leak past the landmark source.

use serde::{Deserialize, Serialize};

/// Number of anatomical points tracked per frame.
pub const TRACKED_POINTS: usize = 13;

/// Closed set of tracked anatomical points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BodyPart {
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    RightShoulder,
    RightElbow,
    RightWrist,
    LeftHip,
    LeftKnee,
    LeftAnkle,
    RightHip,
    RightKnee,
    RightAnkle,
    Nose,
}

impl BodyPart {
    /// All tracked parts, in wire order.
    pub const ALL: [BodyPart; TRACKED_POINTS] = [
        BodyPart::LeftShoulder,
        BodyPart::LeftElbow,
        BodyPart::LeftWrist,
        BodyPart::RightShoulder,
        BodyPart::RightElbow,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::LeftKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightHip,
        BodyPart::RightKnee,
        BodyPart::RightAnkle,
        BodyPart::Nose,
    ];

    /// Position of this part inside `ALL` and inside a `LandmarkSet`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical identifier as sent to the consumer.
    pub fn name(self) -> &'static str {
        match self {
            BodyPart::LeftShoulder => "LEFT_SHOULDER",
            BodyPart::LeftElbow => "LEFT_ELBOW",
            BodyPart::LeftWrist => "LEFT_WRIST",
            BodyPart::RightShoulder => "RIGHT_SHOULDER",
            BodyPart::RightElbow => "RIGHT_ELBOW",
            BodyPart::RightWrist => "RIGHT_WRIST",
            BodyPart::LeftHip => "LEFT_HIP",
            BodyPart::LeftKnee => "LEFT_KNEE",
            BodyPart::LeftAnkle => "LEFT_ANKLE",
            BodyPart::RightHip => "RIGHT_HIP",
            BodyPart::RightKnee => "RIGHT_KNEE",
            BodyPart::RightAnkle => "RIGHT_ANKLE",
            BodyPart::Nose => "NOSE",
        }
    }
}

/// Identifier of a point in a mapped frame: every body part plus the derived
/// chest midpoint. Declaration order is the serialized key order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointId {
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    RightShoulder,
    RightElbow,
    RightWrist,
    LeftHip,
    LeftKnee,
    LeftAnkle,
    RightHip,
    RightKnee,
    RightAnkle,
    Nose,
    ChestMid,
}

impl From<BodyPart> for PointId {
    fn from(part: BodyPart) -> Self {
        match part {
            BodyPart::LeftShoulder => PointId::LeftShoulder,
            BodyPart::LeftElbow => PointId::LeftElbow,
            BodyPart::LeftWrist => PointId::LeftWrist,
            BodyPart::RightShoulder => PointId::RightShoulder,
            BodyPart::RightElbow => PointId::RightElbow,
            BodyPart::RightWrist => PointId::RightWrist,
            BodyPart::LeftHip => PointId::LeftHip,
            BodyPart::LeftKnee => PointId::LeftKnee,
            BodyPart::LeftAnkle => PointId::LeftAnkle,
            BodyPart::RightHip => PointId::RightHip,
            BodyPart::RightKnee => PointId::RightKnee,
            BodyPart::RightAnkle => PointId::RightAnkle,
            BodyPart::Nose => PointId::Nose,
        }
    }
}

impl PointId {
    pub fn name(self) -> &'static str {
        match self {
            PointId::ChestMid => "CHEST_MID",
            other => BodyPart::ALL[other as usize].name(),
        }
    }
}

/// One estimated point in normalized source-frame coordinates.
///
/// `x` and `y` are in [0, 1] with the origin at the top-left of the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// The full skeleton for one detected person.
///
/// A set always holds a value for every `BodyPart`; "no person" is expressed
/// by the absence of a set, never by a partial one.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; TRACKED_POINTS],
}

impl LandmarkSet {
    pub fn new(points: [Landmark; TRACKED_POINTS]) -> Self {
        Self { points }
    }

    /// Build a set by asking for each part in turn.
    pub fn from_fn(mut f: impl FnMut(BodyPart) -> Landmark) -> Self {
        Self {
            points: BodyPart::ALL.map(&mut f),
        }
    }

    pub fn get(&self, part: BodyPart) -> Landmark {
        self.points[part.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyPart, Landmark)> + '_ {
        BodyPart::ALL.iter().map(move |part| (*part, self.get(*part)))
    }

    /// True when every coordinate lies in the normalized [0, 1] range.
    pub fn is_normalized(&self) -> bool {
        self.points.iter().all(|p| {
            (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_parts_are_indexed_in_declaration_order() {
        for (i, part) in BodyPart::ALL.iter().enumerate() {
            assert_eq!(part.index(), i);
        }
    }

    #[test]
    fn point_ids_share_body_part_names() {
        for part in BodyPart::ALL {
            assert_eq!(PointId::from(part).name(), part.name());
        }
        assert_eq!(PointId::ChestMid.name(), "CHEST_MID");
    }

    #[test]
    fn point_id_serializes_to_canonical_name() {
        let json = serde_json::to_string(&PointId::RightAnkle).unwrap();
        assert_eq!(json, "\"RIGHT_ANKLE\"");
        let json = serde_json::to_string(&PointId::ChestMid).unwrap();
        assert_eq!(json, "\"CHEST_MID\"");
    }

    #[test]
    fn from_fn_fills_every_part() {
        let set = LandmarkSet::from_fn(|part| Landmark::new(part.index() as f64 / 20.0, 0.5));
        assert_eq!(set.iter().count(), TRACKED_POINTS);
        assert_eq!(set.get(BodyPart::Nose).x, 12.0 / 20.0);
        assert!(set.is_normalized());
    }

    #[test]
    fn out_of_range_coordinates_are_not_normalized() {
        let set = LandmarkSet::from_fn(|part| {
            if part == BodyPart::LeftKnee {
                Landmark::new(0.5, 1.2)
            } else {
                Landmark::new(0.5, 0.5)
            }
        });
        assert!(!set.is_normalized());
    }
}
