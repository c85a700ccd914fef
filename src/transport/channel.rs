//! Consumer endpoints.
//!
//! A `Connector` opens a fresh write endpoint to the consumer. The dispatcher
//! decides how long an endpoint lives; connectors only know how to open one.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::transport::protocol::{read_messages, DispatchMessage};

/// Default pipe name the consumer listens on.
pub const DEFAULT_PIPE_NAME: &str = "SpineControlPipe";

/// Opens write endpoints to the consumer.
pub trait Connector: Send {
    /// Human-readable endpoint identifier for logs.
    fn describe(&self) -> String;

    /// Open a new endpoint. Fails when the consumer is not accepting.
    fn connect(&mut self) -> io::Result<Box<dyn Write + Send>>;
}

/// Platform location of a named pipe.
///
/// Windows pipes live in the `\\.\pipe\` namespace; elsewhere the consumer is
/// expected to create a FIFO in the temp directory.
pub fn default_pipe_path(name: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(format!(r"\\.\pipe\{}", name))
    } else {
        std::env::temp_dir().join(name)
    }
}

/// True when `value` names an endpoint path rather than a bare pipe name.
pub fn is_pipe_path(value: &str) -> bool {
    value.contains('/') || value.contains('\\')
}

/// Endpoint for a user-supplied pipe value: explicit paths are used as-is,
/// bare names resolve through `default_pipe_path`.
pub fn resolve_pipe(value: &str) -> PathBuf {
    let value = value.trim();
    if is_pipe_path(value) {
        PathBuf::from(value)
    } else {
        default_pipe_path(value)
    }
}

/// Connector for a consumer-owned named pipe (Windows pipe or Unix FIFO).
#[derive(Clone, Debug)]
pub struct PipeConnector {
    path: PathBuf,
}

impl PipeConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connector for PipeConnector {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn connect(&mut self) -> io::Result<Box<dyn Write + Send>> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true);
        // Non-blocking open fails with ENXIO when no reader is attached,
        // instead of parking the capture loop until the consumer appears.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.custom_flags(libc::O_NONBLOCK);
        }
        let file = options.open(&self.path)?;
        Ok(Box::new(file))
    }
}

// ----------------------------------------------------------------------------
// Recording connector for tests
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Recording {
    unavailable: bool,
    fail_writes: bool,
    one_shot: bool,
    connect_attempts: u64,
    connections: Vec<Vec<u8>>,
}

/// In-memory connector for testing. Clones share the same recording, so a
/// test can keep one handle while the dispatcher owns another.
#[derive(Clone, Debug, Default)]
pub struct RecordingConnector {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Simulate the consumer not listening.
    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    /// Make writes on open endpoints fail with a broken pipe.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Accept one flushed message per endpoint, then behave like a closed
    /// pipe, as consumers that read a single message per connection do.
    pub fn set_one_shot(&self, one_shot: bool) {
        self.lock().one_shot = one_shot;
    }

    pub fn connect_attempts(&self) -> u64 {
        self.lock().connect_attempts
    }

    /// Number of endpoints successfully opened.
    pub fn connections(&self) -> usize {
        self.lock().connections.len()
    }

    /// Bytes received on each endpoint, in open order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.lock().connections.clone()
    }

    /// Every message received across all endpoints, in order.
    pub fn messages(&self) -> Vec<DispatchMessage> {
        self.payloads()
            .iter()
            .flat_map(|payload| {
                read_messages(payload.as_slice())
                    .filter_map(Result::ok)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl Connector for RecordingConnector {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    fn connect(&mut self) -> io::Result<Box<dyn Write + Send>> {
        let mut recording = self.lock();
        recording.connect_attempts += 1;
        if recording.unavailable {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "consumer not listening",
            ));
        }
        recording.connections.push(Vec::new());
        let index = recording.connections.len() - 1;
        Ok(Box::new(RecordingWriter {
            inner: Arc::clone(&self.inner),
            index,
            flushed: false,
        }))
    }
}

struct RecordingWriter {
    inner: Arc<Mutex<Recording>>,
    index: usize,
    flushed: bool,
}

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut recording = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if recording.fail_writes || (recording.one_shot && self.flushed) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        recording.connections[self.index].extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushed = true;
        Ok(())
    }
}
