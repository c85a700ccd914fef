use anyhow::Result;

use crate::frame::Frame;
use crate::landmark::LandmarkSet;
use crate::pose::backend::PoseBackend;

/// Stable interface over the pose backend.
///
/// Owns the backend (and with it the model session) for the lifetime of the
/// capture loop. Produces canonical landmark sets or `None` when no person is
/// in the frame.
pub struct LandmarkSource {
    backend: Box<dyn PoseBackend>,
    partial_drops: u64,
}

impl LandmarkSource {
    pub fn new(backend: Box<dyn PoseBackend>) -> Self {
        Self {
            backend,
            partial_drops: 0,
        }
    }

    pub fn from_backend<B: PoseBackend + 'static>(backend: B) -> Self {
        Self::new(Box::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Detect the person in `frame`.
    pub fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let Some(estimate) = self.backend.estimate(frame)? else {
            return Ok(None);
        };
        let table = self.backend.vocabulary();
        match table.translate(&estimate.landmarks) {
            Some(set) => Ok(Some(set)),
            None => {
                self.partial_drops += 1;
                log::debug!(
                    "LandmarkSource: frame {} skipped, {} output incomplete ({} of {} points)",
                    frame.sequence,
                    table.name,
                    estimate.landmarks.len(),
                    table.native_len
                );
                Ok(None)
            }
        }
    }

    /// Number of estimates discarded because they lacked tracked points.
    pub fn partial_drops(&self) -> u64 {
        self.partial_drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{BodyPart, Landmark};
    use crate::pose::backend::PoseEstimate;
    use crate::pose::vocabulary::{LandmarkTable, COCO_17};

    struct FixedBackend {
        points: usize,
    }

    impl PoseBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn vocabulary(&self) -> &'static LandmarkTable {
            &COCO_17
        }

        fn estimate(&mut self, _frame: &Frame) -> Result<Option<PoseEstimate>> {
            if self.points == 0 {
                return Ok(None);
            }
            Ok(Some(PoseEstimate {
                landmarks: (0..self.points)
                    .map(|i| Landmark::new(i as f64 / 20.0, 0.25))
                    .collect(),
                score: 0.9,
            }))
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0; 12], 2, 2, 7)
    }

    #[test]
    fn translates_backend_output() {
        let mut source = LandmarkSource::from_backend(FixedBackend { points: 17 });
        let set = source.detect(&frame()).unwrap().unwrap();
        assert_eq!(set.get(BodyPart::LeftShoulder).x, 5.0 / 20.0);
        assert_eq!(source.backend_name(), "fixed");
    }

    #[test]
    fn absent_person_is_not_an_error() {
        let mut source = LandmarkSource::from_backend(FixedBackend { points: 0 });
        assert!(source.detect(&frame()).unwrap().is_none());
        assert_eq!(source.partial_drops(), 0);
    }

    #[test]
    fn partial_output_counts_as_absent() {
        let mut source = LandmarkSource::from_backend(FixedBackend { points: 12 });
        assert!(source.detect(&frame()).unwrap().is_none());
        assert_eq!(source.partial_drops(), 1);
    }
}
