//! Translation tables from model-native landmark indices to canonical parts.
//!
//! Swapping pose models only requires a new table here.

use crate::landmark::{BodyPart, Landmark, LandmarkSet, TRACKED_POINTS};

/// Maps model-native landmark indices onto the canonical body parts.
#[derive(Debug)]
pub struct LandmarkTable {
    pub name: &'static str,
    /// Number of landmarks the model emits per person.
    pub native_len: usize,
    entries: [(BodyPart, usize); TRACKED_POINTS],
}

impl LandmarkTable {
    /// Translate one person's native landmarks into a canonical set.
    ///
    /// Returns `None` when any tracked index is missing or non-finite; a
    /// partial skeleton is never produced. Coordinates slightly outside the
    /// frame are clamped to [0, 1].
    pub fn translate(&self, native: &[Landmark]) -> Option<LandmarkSet> {
        let mut points = [Landmark::default(); TRACKED_POINTS];
        for (part, index) in self.entries {
            let landmark = native.get(index)?;
            if !landmark.x.is_finite() || !landmark.y.is_finite() {
                return None;
            }
            points[part.index()] = Landmark {
                x: landmark.x.clamp(0.0, 1.0),
                y: landmark.y.clamp(0.0, 1.0),
                visibility: landmark.visibility,
            };
        }
        Some(LandmarkSet::new(points))
    }
}

/// Identity table: native index == canonical index.
pub static CANONICAL: LandmarkTable = LandmarkTable {
    name: "canonical",
    native_len: TRACKED_POINTS,
    entries: [
        (BodyPart::LeftShoulder, 0),
        (BodyPart::LeftElbow, 1),
        (BodyPart::LeftWrist, 2),
        (BodyPart::RightShoulder, 3),
        (BodyPart::RightElbow, 4),
        (BodyPart::RightWrist, 5),
        (BodyPart::LeftHip, 6),
        (BodyPart::LeftKnee, 7),
        (BodyPart::LeftAnkle, 8),
        (BodyPart::RightHip, 9),
        (BodyPart::RightKnee, 10),
        (BodyPart::RightAnkle, 11),
        (BodyPart::Nose, 12),
    ],
};

/// MediaPipe / BlazePose 33-landmark topology.
pub static MEDIAPIPE_POSE: LandmarkTable = LandmarkTable {
    name: "mediapipe-pose",
    native_len: 33,
    entries: [
        (BodyPart::LeftShoulder, 11),
        (BodyPart::LeftElbow, 13),
        (BodyPart::LeftWrist, 15),
        (BodyPart::RightShoulder, 12),
        (BodyPart::RightElbow, 14),
        (BodyPart::RightWrist, 16),
        (BodyPart::LeftHip, 23),
        (BodyPart::LeftKnee, 25),
        (BodyPart::LeftAnkle, 27),
        (BodyPart::RightHip, 24),
        (BodyPart::RightKnee, 26),
        (BodyPart::RightAnkle, 28),
        (BodyPart::Nose, 0),
    ],
};

/// COCO 17-keypoint topology (MoveNet, PoseNet).
pub static COCO_17: LandmarkTable = LandmarkTable {
    name: "coco-17",
    native_len: 17,
    entries: [
        (BodyPart::LeftShoulder, 5),
        (BodyPart::LeftElbow, 7),
        (BodyPart::LeftWrist, 9),
        (BodyPart::RightShoulder, 6),
        (BodyPart::RightElbow, 8),
        (BodyPart::RightWrist, 10),
        (BodyPart::LeftHip, 11),
        (BodyPart::LeftKnee, 13),
        (BodyPart::LeftAnkle, 15),
        (BodyPart::RightHip, 12),
        (BodyPart::RightKnee, 14),
        (BodyPart::RightAnkle, 16),
        (BodyPart::Nose, 0),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn check_table(table: &LandmarkTable) {
        for (i, (part, native)) in table.entries.iter().enumerate() {
            assert_eq!(part.index(), i, "{} entries out of order", table.name);
            assert!(*native < table.native_len, "{} index out of range", table.name);
        }
        let mut natives: Vec<usize> = table.entries.iter().map(|(_, n)| *n).collect();
        natives.sort_unstable();
        natives.dedup();
        assert_eq!(natives.len(), TRACKED_POINTS, "{} reuses a native index", table.name);
    }

    #[test]
    fn tables_are_well_formed() {
        check_table(&CANONICAL);
        check_table(&MEDIAPIPE_POSE);
        check_table(&COCO_17);
    }

    #[test]
    fn translates_mediapipe_indices() {
        let native: Vec<Landmark> = (0..33)
            .map(|i| Landmark::new(i as f64 / 40.0, 0.5).with_visibility(0.9))
            .collect();
        let set = MEDIAPIPE_POSE.translate(&native).unwrap();
        assert_eq!(set.get(BodyPart::Nose).x, 0.0);
        assert_eq!(set.get(BodyPart::LeftShoulder).x, 11.0 / 40.0);
        assert_eq!(set.get(BodyPart::RightAnkle).x, 28.0 / 40.0);
        assert_eq!(set.get(BodyPart::RightAnkle).visibility, Some(0.9));
    }

    #[test]
    fn short_output_is_treated_as_absent() {
        let native = vec![Landmark::new(0.5, 0.5); 20];
        assert!(MEDIAPIPE_POSE.translate(&native).is_none());
        assert!(COCO_17.translate(&native[..17]).is_some());
    }

    #[test]
    fn non_finite_points_are_rejected_and_edges_clamped() {
        let mut native = vec![Landmark::new(0.5, 0.5); 17];
        native[0] = Landmark::new(1.04, -0.02);
        let set = COCO_17.translate(&native).unwrap();
        assert_eq!(set.get(BodyPart::Nose).x, 1.0);
        assert_eq!(set.get(BodyPart::Nose).y, 0.0);

        native[5] = Landmark::new(f64::NAN, 0.5);
        assert!(COCO_17.translate(&native).is_none());
    }
}
