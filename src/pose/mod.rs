//! Pose estimation boundary.
//!
//! The pose model is an external collaborator: a `PoseBackend` turns a frame
//! into model-native landmarks, and `LandmarkSource` translates those into the
//! canonical `LandmarkSet` through a `LandmarkTable`. Nothing outside this
//! module sees model-native indices.

mod backend;
pub mod backends;
mod source;
pub mod vocabulary;

pub use backend::{ConfidenceGate, ModelComplexity, PoseBackend, PoseEstimate, PoseOptions};
pub use backends::{build_backend, BackendKind, ScriptedBackend, StubBackend};
pub use source::LandmarkSource;
pub use vocabulary::LandmarkTable;

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
