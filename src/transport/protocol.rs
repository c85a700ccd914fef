//! Wire format shared with the consumer.
//!
//! ```json
//! { "CommandType": "update_pose_from_mediapipe",
//!   "MediaPipeLandmarks": { "LEFT_SHOULDER": [x, y], ..., "CHEST_MID": [x, y] } }
//! ```
//!
//! Field order is fixed: the command first, then landmarks in body-part order
//! with `CHEST_MID` last.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::mapper::MappedFrame;

pub const COMMAND_UPDATE_POSE: &str = "update_pose_from_mediapipe";

/// Envelope sent to the consumer for each mapped frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchMessage {
    #[serde(rename = "CommandType")]
    pub command: String,
    #[serde(rename = "MediaPipeLandmarks")]
    pub points: MappedFrame,
}

impl DispatchMessage {
    pub fn update_pose(points: MappedFrame) -> Self {
        Self {
            command: COMMAND_UPDATE_POSE.to_string(),
            points,
        }
    }
}

/// Encode a message. `pretty` uses two-space indentation; `terminate` appends
/// a newline so messages can share one stream.
pub fn encode(
    message: &DispatchMessage,
    pretty: bool,
    terminate: bool,
) -> Result<Vec<u8>, serde_json::Error> {
    let mut payload = if pretty {
        serde_json::to_vec_pretty(message)?
    } else {
        serde_json::to_vec(message)?
    };
    if terminate {
        payload.push(b'\n');
    }
    Ok(payload)
}

/// Decode a single message, ignoring surrounding whitespace.
pub fn decode(payload: &[u8]) -> Result<DispatchMessage, serde_json::Error> {
    serde_json::from_slice(payload.trim_ascii())
}

/// Decode consecutive messages from a stream (newline-delimited or pretty).
pub fn read_messages<R: Read>(
    reader: R,
) -> impl Iterator<Item = Result<DispatchMessage, serde_json::Error>> {
    serde_json::Deserializer::from_reader(reader).into_iter::<DispatchMessage>()
}

/// Incremental decoder for a byte stream that arrives in arbitrary chunks.
///
/// Incomplete trailing input is held until the next `push`.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every message it completes. A malformed
    /// message discards the buffered input.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<DispatchMessage, serde_json::Error>> {
        self.pending.extend_from_slice(chunk);
        let mut decoded = Vec::new();
        let mut stream =
            serde_json::Deserializer::from_slice(&self.pending).into_iter::<DispatchMessage>();
        let mut consumed = 0;
        loop {
            match stream.next() {
                Some(Ok(message)) => {
                    consumed = stream.byte_offset();
                    decoded.push(Ok(message));
                }
                Some(Err(err)) if err.is_eof() => break,
                Some(Err(err)) => {
                    consumed = self.pending.len();
                    decoded.push(Err(err));
                    break;
                }
                None => {
                    consumed = self.pending.len();
                    break;
                }
            }
        }
        self.pending.drain(..consumed);
        decoded
    }

    /// Bytes held back waiting for the rest of a message.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
