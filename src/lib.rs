//! Pose Relay
//!
//! Streams human pose landmarks from a live camera to an animation controller
//! over a local named pipe.
//!
//! # Pipeline
//!
//! Each captured frame flows through four stages, fully completing before the
//! next frame is read:
//!
//! 1. **Capture**: a `FrameSource` yields one frame.
//! 2. **Detect**: a `LandmarkSource` runs the pose backend and returns the 13
//!    tracked landmarks in normalized image space, or nothing.
//! 3. **Map**: the `CoordinateMapper` scales x, flips y, and adds `CHEST_MID`
//!    (the midpoint of the shoulders) in canvas space.
//! 4. **Dispatch**: the `FrameDispatcher` serializes an `UpdatePose` message
//!    and writes it to the consumer's pipe.
//!
//! Dispatch failures never stop capture; the consumer may come and go.
//!
//! # Module Structure
//!
//! - `landmark`: Canonical body parts and normalized landmark sets
//! - `mapper`: Canvas-space coordinate transform
//! - `frame`, `ingest`: Captured frames and video sources
//! - `pose`: Pose backends and vocabulary translation
//! - `transport`: Wire protocol, pipe endpoints and the dispatcher
//! - `capture`: The per-frame loop
//! - `config`, `ui`: Startup configuration and operator status line

pub mod capture;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod landmark;
pub mod mapper;
pub mod pose;
pub mod transport;
pub mod ui;

pub use capture::{CaptureLoop, FrameOutcome, LoopOptions, LoopState, LoopStats, StopSignal};
pub use config::RelayConfig;
pub use frame::Frame;
pub use ingest::{CameraConfig, CameraSource, FrameSource};
pub use landmark::{BodyPart, Landmark, LandmarkSet, PointId, TRACKED_POINTS};
pub use mapper::{map_landmarks, Canvas, CoordinateMapper, MappedFrame};
pub use pose::{LandmarkSource, PoseBackend, PoseOptions};
pub use transport::{
    ChannelMode, DispatchError, DispatchMessage, FrameDispatcher, PipeConnector, RetryPolicy,
};
