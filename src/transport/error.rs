use std::io;
use std::time::Duration;

use thiserror::Error;

/// Why a frame could not be delivered.
///
/// None of these are fatal to the capture loop; the frame is dropped and the
/// next one is processed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The endpoint could not be opened (consumer not listening or missing).
    #[error("channel unavailable: {0}")]
    Unavailable(#[source] io::Error),

    /// The endpoint accepted the connection but the write failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// The payload was not fully written before the deadline.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// The frame could not be encoded.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A reconnect is scheduled; nothing was attempted for this frame.
    #[error("reconnect deferred for {0:?}")]
    BackingOff(Duration),
}

/// Coarse classification of a `DispatchError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchErrorKind {
    Unavailable,
    Write,
    Timeout,
    Serialize,
    BackingOff,
}

impl DispatchError {
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::Unavailable(_) => DispatchErrorKind::Unavailable,
            DispatchError::Write(_) => DispatchErrorKind::Write,
            DispatchError::Timeout(_) => DispatchErrorKind::Timeout,
            DispatchError::Serialize(_) => DispatchErrorKind::Serialize,
            DispatchError::BackingOff(_) => DispatchErrorKind::BackingOff,
        }
    }

    /// Stable short reason, suitable for counters and log fields.
    pub fn reason(&self) -> &'static str {
        match self.kind() {
            DispatchErrorKind::Unavailable => "channel_unavailable",
            DispatchErrorKind::Write => "write_failed",
            DispatchErrorKind::Timeout => "write_timeout",
            DispatchErrorKind::Serialize => "serialization_failed",
            DispatchErrorKind::BackingOff => "backing_off",
        }
    }

    /// False for failures that retrying cannot fix.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DispatchError::Serialize(_))
    }
}
