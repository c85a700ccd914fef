use std::collections::VecDeque;

use anyhow::Result;

use crate::frame::Frame;
use crate::landmark::LandmarkSet;
use crate::pose::backend::{PoseBackend, PoseEstimate};
use crate::pose::vocabulary::{LandmarkTable, CANONICAL};

/// Scripted backend for testing. Replays queued results in order, one per
/// frame, and reports no person once the script is exhausted.
#[derive(Default)]
pub struct ScriptedBackend {
    script: VecDeque<Option<LandmarkSet>>,
}

impl ScriptedBackend {
    pub fn new(script: impl IntoIterator<Item = Option<LandmarkSet>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl PoseBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn vocabulary(&self) -> &'static LandmarkTable {
        &CANONICAL
    }

    fn estimate(&mut self, _frame: &Frame) -> Result<Option<PoseEstimate>> {
        let Some(Some(set)) = self.script.pop_front() else {
            return Ok(None);
        };
        Ok(Some(PoseEstimate {
            landmarks: set.iter().map(|(_, landmark)| landmark).collect(),
            score: 1.0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{BodyPart, Landmark};
    use crate::pose::LandmarkSource;

    #[test]
    fn replays_script_in_order() {
        let first = LandmarkSet::from_fn(|_| Landmark::new(0.1, 0.2));
        let second = LandmarkSet::from_fn(|_| Landmark::new(0.3, 0.4));
        let mut source = LandmarkSource::from_backend(ScriptedBackend::new([
            Some(first.clone()),
            None,
            Some(second.clone()),
        ]));
        let frame = Frame::new(Vec::new(), 0, 0, 1);

        assert_eq!(source.detect(&frame).unwrap(), Some(first));
        assert_eq!(source.detect(&frame).unwrap(), None);
        let replayed = source.detect(&frame).unwrap().unwrap();
        assert_eq!(replayed.get(BodyPart::Nose), second.get(BodyPart::Nose));
        assert_eq!(source.detect(&frame).unwrap(), None);
    }
}
