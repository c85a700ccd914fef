//! Delivery of mapped frames to the consumer process.
//!
//! Frames are wrapped in the `update_pose_from_mediapipe` envelope, encoded as
//! JSON, and written to a consumer-owned named pipe. The dispatcher keeps one
//! endpoint open across frames and reconnects with bounded backoff when the
//! consumer goes away.

pub mod channel;
mod dispatcher;
mod error;
pub mod protocol;

pub use channel::{
    default_pipe_path, is_pipe_path, resolve_pipe, Connector, PipeConnector, RecordingConnector,
    DEFAULT_PIPE_NAME,
};
pub use dispatcher::{ChannelMode, DispatchStats, FrameDispatcher, RetryPolicy};
pub use error::{DispatchError, DispatchErrorKind};
pub use protocol::{DispatchMessage, StreamDecoder, COMMAND_UPDATE_POSE};
