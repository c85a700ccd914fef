use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use serde::Deserialize;

use crate::mapper::MappedFrame;
use crate::transport::channel::Connector;
use crate::transport::error::DispatchError;
use crate::transport::protocol::{self, DispatchMessage};

/// How long an endpoint lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// One endpoint reused across frames; messages are newline-terminated.
    #[default]
    Persistent,
    /// Open, write, flush and close for every message.
    PerMessage,
}

impl FromStr for ChannelMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "persistent" => Ok(ChannelMode::Persistent),
            "per_message" => Ok(ChannelMode::PerMessage),
            other => Err(anyhow!(
                "channel mode must be persistent or per_message (got {})",
                other
            )),
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMode::Persistent => f.write_str("persistent"),
            ChannelMode::PerMessage => f.write_str("per_message"),
        }
    }
}

/// Reconnect and escalation policy.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first reconnect after a failure. Doubles per failure.
    pub initial_backoff: Duration,
    /// Upper bound on the doubling delay.
    pub max_backoff: Duration,
    /// Consecutive failures after which connection attempts pause.
    pub pause_after_failures: u32,
    /// Pause length once escalated.
    pub pause: Duration,
    /// Deadline for writing and flushing one payload.
    pub write_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            pause_after_failures: 30,
            pause: Duration::from_secs(2),
            write_timeout: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately on every frame, never pausing.
    pub fn immediate() -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            pause_after_failures: u32::MAX,
            pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Delivery counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
    pub consecutive_failures: u32,
    pub connect_attempts: u64,
    /// Endpoints reopened after an established one was lost.
    pub reconnects: u64,
}

/// Serializes mapped frames and delivers them to the consumer.
pub struct FrameDispatcher {
    connector: Box<dyn Connector>,
    mode: ChannelMode,
    pretty: bool,
    policy: RetryPolicy,
    endpoint: Option<Box<dyn Write + Send>>,
    /// Set when an established endpoint broke; the next open is a reconnect.
    lost_endpoint: bool,
    retry_at: Option<Instant>,
    backoff: Duration,
    stats: DispatchStats,
}

impl FrameDispatcher {
    pub fn new(connector: Box<dyn Connector>, mode: ChannelMode, policy: RetryPolicy) -> Self {
        Self {
            connector,
            mode,
            pretty: false,
            backoff: policy.initial_backoff,
            policy,
            endpoint: None,
            lost_endpoint: false,
            retry_at: None,
            stats: DispatchStats::default(),
        }
    }

    pub fn from_connector<C: Connector + 'static>(
        connector: C,
        mode: ChannelMode,
        policy: RetryPolicy,
    ) -> Self {
        Self::new(Box::new(connector), mode, policy)
    }

    /// Indent payloads with two spaces.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn target(&self) -> String {
        self.connector.describe()
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Close the persistent endpoint, if any.
    pub fn disconnect(&mut self) {
        if self.endpoint.take().is_some() {
            log::info!("FrameDispatcher: closed {}", self.connector.describe());
        }
    }

    /// Deliver one frame.
    pub fn dispatch(&mut self, frame: MappedFrame) -> Result<(), DispatchError> {
        let message = DispatchMessage::update_pose(frame);
        let result = protocol::encode(
            &message,
            self.pretty,
            self.mode == ChannelMode::Persistent,
        )
        .map_err(DispatchError::from)
        .and_then(|payload| self.send(&payload));

        match &result {
            Ok(()) => self.record_success(),
            Err(err) => self.record_failure(err),
        }
        result
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), DispatchError> {
        if let Some(mut endpoint) = self.endpoint.take() {
            match write_payload(endpoint.as_mut(), payload, self.policy.write_timeout) {
                Ok(()) => {
                    self.endpoint = Some(endpoint);
                    return Ok(());
                }
                // Consumers that read one message per connection close the
                // pipe after every frame. Reopen once and resend.
                Err(DispatchError::Write(err)) => {
                    self.lost_endpoint = true;
                    log::debug!(
                        "FrameDispatcher: {} closed by consumer ({}), reopening",
                        self.connector.describe(),
                        err
                    );
                }
                Err(err) => {
                    self.lost_endpoint = true;
                    return Err(err);
                }
            }
        }

        // On error the fresh endpoint is dropped here, closing it.
        let mut endpoint = self.open()?;
        write_payload(endpoint.as_mut(), payload, self.policy.write_timeout)?;
        if self.mode == ChannelMode::Persistent {
            self.endpoint = Some(endpoint);
        }
        Ok(())
    }

    fn open(&mut self) -> Result<Box<dyn Write + Send>, DispatchError> {
        if let Some(retry_at) = self.retry_at {
            let now = Instant::now();
            if now < retry_at {
                return Err(DispatchError::BackingOff(retry_at - now));
            }
        }
        self.stats.connect_attempts += 1;
        let endpoint = self
            .connector
            .connect()
            .map_err(DispatchError::Unavailable)?;
        let reconnected = std::mem::take(&mut self.lost_endpoint);
        if reconnected {
            self.stats.reconnects += 1;
        }
        if self.mode == ChannelMode::Persistent {
            if reconnected {
                log::debug!("FrameDispatcher: reconnected to {}", self.connector.describe());
            } else {
                log::info!("FrameDispatcher: connected to {}", self.connector.describe());
            }
        }
        Ok(endpoint)
    }

    fn record_success(&mut self) {
        if self.stats.consecutive_failures > 0 {
            log::info!(
                "FrameDispatcher: delivery to {} resumed after {} failed frames",
                self.connector.describe(),
                self.stats.consecutive_failures
            );
        }
        self.stats.sent += 1;
        self.stats.consecutive_failures = 0;
        self.backoff = self.policy.initial_backoff;
        self.retry_at = None;
    }

    fn record_failure(&mut self, err: &DispatchError) {
        self.stats.failed += 1;
        if matches!(err, DispatchError::BackingOff(_)) {
            return;
        }

        self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_add(1);
        let failures = self.stats.consecutive_failures;
        if !err.is_retryable() {
            log::error!("FrameDispatcher: frame dropped ({}): {}", err.reason(), err);
            return;
        }

        let now = Instant::now();
        if failures >= self.policy.pause_after_failures {
            self.retry_at = Some(now + self.policy.pause);
            if failures == self.policy.pause_after_failures {
                log::warn!(
                    "FrameDispatcher: {} unreachable for {} frames, pausing {:?} between attempts",
                    self.connector.describe(),
                    failures,
                    self.policy.pause
                );
            }
        } else {
            self.retry_at = Some(now + self.backoff);
            self.backoff = (self.backoff * 2).min(self.policy.max_backoff);
        }

        if failures == 1 {
            log::warn!(
                "FrameDispatcher: {} ({}): {}; dropping frames until reconnect",
                self.connector.describe(),
                err.reason(),
                err
            );
        } else {
            log::debug!("FrameDispatcher: frame dropped ({}): {}", err.reason(), err);
        }
    }
}

/// Write and flush `payload`, retrying non-blocking endpoints until `timeout`.
pub(crate) fn write_payload(
    endpoint: &mut dyn Write,
    payload: &[u8],
    timeout: Duration,
) -> Result<(), DispatchError> {
    let deadline = Instant::now() + timeout;
    let wait = |deadline: Instant| -> Result<(), DispatchError> {
        if Instant::now() >= deadline {
            return Err(DispatchError::Timeout(timeout));
        }
        std::thread::sleep(Duration::from_millis(1));
        Ok(())
    };

    let mut written = 0;
    while written < payload.len() {
        match endpoint.write(&payload[written..]) {
            Ok(0) => {
                return Err(DispatchError::Write(io::Error::from(
                    io::ErrorKind::WriteZero,
                )))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => wait(deadline)?,
            Err(e) => return Err(DispatchError::Write(e)),
        }
    }

    loop {
        match endpoint.flush() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => wait(deadline)?,
            Err(e) => return Err(DispatchError::Write(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{Landmark, LandmarkSet, PointId};
    use crate::mapper::{map_landmarks, Canvas};
    use crate::transport::channel::RecordingConnector;
    use crate::transport::error::DispatchErrorKind;

    fn frame(x: f64) -> MappedFrame {
        map_landmarks(
            &LandmarkSet::from_fn(|_| Landmark::new(x, 0.5)),
            Canvas::default(),
        )
    }

    fn dispatcher(
        recording: &RecordingConnector,
        mode: ChannelMode,
        policy: RetryPolicy,
    ) -> FrameDispatcher {
        FrameDispatcher::from_connector(recording.clone(), mode, policy)
    }

    #[test]
    fn persistent_mode_reuses_one_endpoint() {
        let recording = RecordingConnector::new();
        let mut dispatcher = dispatcher(&recording, ChannelMode::Persistent, RetryPolicy::default());

        for x in [0.1, 0.2, 0.3] {
            dispatcher.dispatch(frame(x)).unwrap();
        }

        assert_eq!(recording.connections(), 1);
        assert!(dispatcher.is_connected());
        let payload = &recording.payloads()[0];
        assert_eq!(payload.iter().filter(|b| **b == b'\n').count(), 3);
        let messages = recording.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].points, frame(0.3));
        assert_eq!(dispatcher.stats().sent, 3);
    }

    #[test]
    fn per_message_mode_opens_and_closes_each_time() {
        let recording = RecordingConnector::new();
        let mut dispatcher = dispatcher(&recording, ChannelMode::PerMessage, RetryPolicy::default())
            .with_pretty(true);

        dispatcher.dispatch(frame(0.1)).unwrap();
        dispatcher.dispatch(frame(0.2)).unwrap();

        assert_eq!(recording.connections(), 2);
        assert!(!dispatcher.is_connected());
        for payload in recording.payloads() {
            assert_eq!(payload.last(), Some(&b'}'));
            let message = protocol::decode(&payload).unwrap();
            assert!(message.points.get(PointId::ChestMid).is_some());
        }
    }

    #[test]
    fn unavailable_consumer_is_reported_and_backs_off() {
        let recording = RecordingConnector::new();
        recording.set_available(false);
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(60),
            ..RetryPolicy::default()
        };
        let mut dispatcher = dispatcher(&recording, ChannelMode::Persistent, policy);

        let err = dispatcher.dispatch(frame(0.1)).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Unavailable);

        let err = dispatcher.dispatch(frame(0.2)).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::BackingOff);
        assert_eq!(recording.connect_attempts(), 1, "backoff must not touch the channel");
        assert_eq!(dispatcher.stats().failed, 2);
        assert_eq!(dispatcher.stats().consecutive_failures, 1);
    }

    #[test]
    fn reconnects_after_write_failure() {
        let recording = RecordingConnector::new();
        let mut dispatcher = dispatcher(&recording, ChannelMode::Persistent, RetryPolicy::immediate());

        dispatcher.dispatch(frame(0.1)).unwrap();
        recording.set_fail_writes(true);
        let err = dispatcher.dispatch(frame(0.2)).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Write);
        assert!(!dispatcher.is_connected());

        // The broken endpoint was reopened once within the same dispatch.
        assert_eq!(recording.connections(), 2);
        assert_eq!(dispatcher.stats().reconnects, 1);

        recording.set_fail_writes(false);
        dispatcher.dispatch(frame(0.3)).unwrap();
        assert_eq!(recording.connections(), 3);
        assert_eq!(dispatcher.stats().reconnects, 1);
        assert_eq!(dispatcher.stats().consecutive_failures, 0);
        assert_eq!(recording.messages().len(), 2);
    }

    #[test]
    fn first_connect_after_unavailable_is_not_a_reconnect() {
        let recording = RecordingConnector::new();
        recording.set_available(false);
        let mut persistent =
            dispatcher(&recording, ChannelMode::Persistent, RetryPolicy::immediate());

        persistent.dispatch(frame(0.1)).unwrap_err();
        recording.set_available(true);
        persistent.dispatch(frame(0.2)).unwrap();
        assert_eq!(persistent.stats().reconnects, 0);

        let mut per_message =
            dispatcher(&recording, ChannelMode::PerMessage, RetryPolicy::immediate());
        for x in [0.1, 0.2, 0.3] {
            per_message.dispatch(frame(x)).unwrap();
        }
        assert_eq!(per_message.stats().reconnects, 0);
    }

    #[test]
    fn consumer_closing_after_each_message_still_receives_every_frame() {
        let recording = RecordingConnector::new();
        recording.set_one_shot(true);
        let mut dispatcher = dispatcher(&recording, ChannelMode::Persistent, RetryPolicy::default());

        for i in 0..60 {
            dispatcher.dispatch(frame(i as f64 / 60.0)).unwrap();
        }

        let stats = dispatcher.stats();
        assert_eq!(stats.sent, 60);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.reconnects, 59);
        assert_eq!(recording.connections(), 60);
        let messages = recording.messages();
        assert_eq!(messages.len(), 60);
        assert_eq!(messages[59].points, frame(59.0 / 60.0));
    }

    #[test]
    fn escalates_to_pause_after_consecutive_failures() {
        let recording = RecordingConnector::new();
        recording.set_available(false);
        let policy = RetryPolicy {
            pause_after_failures: 3,
            pause: Duration::from_secs(60),
            ..RetryPolicy::immediate()
        };
        let mut dispatcher = dispatcher(&recording, ChannelMode::PerMessage, policy);

        for _ in 0..3 {
            let err = dispatcher.dispatch(frame(0.1)).unwrap_err();
            assert_eq!(err.kind(), DispatchErrorKind::Unavailable);
        }
        recording.set_available(true);
        let err = dispatcher.dispatch(frame(0.1)).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::BackingOff);
        assert_eq!(recording.connect_attempts(), 3);
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let recording = RecordingConnector::new();
        recording.set_available(false);
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            ..RetryPolicy::default()
        };
        let mut dispatcher = dispatcher(&recording, ChannelMode::Persistent, policy);

        dispatcher.dispatch(frame(0.1)).unwrap_err();
        assert_eq!(dispatcher.backoff, Duration::from_millis(200));
        dispatcher.retry_at = None;
        dispatcher.dispatch(frame(0.1)).unwrap_err();
        assert_eq!(dispatcher.backoff, Duration::from_millis(300));
        dispatcher.retry_at = None;
        dispatcher.dispatch(frame(0.1)).unwrap_err();
        assert_eq!(dispatcher.backoff, Duration::from_millis(300));
    }

    struct StalledWriter;

    impl Write for StalledWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stalled_endpoint_times_out() {
        let err = write_payload(&mut StalledWriter, b"{}", Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Timeout);
    }

    struct StalledConnector;

    impl Connector for StalledConnector {
        fn describe(&self) -> String {
            "stalled".to_string()
        }

        fn connect(&mut self) -> io::Result<Box<dyn Write + Send>> {
            Ok(Box::new(StalledWriter))
        }
    }

    #[test]
    fn dispatch_times_out_on_stalled_consumer_and_backs_off() {
        let policy = RetryPolicy {
            write_timeout: Duration::from_millis(5),
            initial_backoff: Duration::from_secs(60),
            ..RetryPolicy::default()
        };
        let mut dispatcher =
            FrameDispatcher::from_connector(StalledConnector, ChannelMode::Persistent, policy);

        let err = dispatcher.dispatch(frame(0.1)).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Timeout);
        assert_eq!(err.reason(), "write_timeout");
        assert!(!dispatcher.is_connected());
        assert_eq!(dispatcher.stats().consecutive_failures, 1);

        let err = dispatcher.dispatch(frame(0.2)).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::BackingOff);
        assert_eq!(dispatcher.stats().connect_attempts, 1);
        assert_eq!(dispatcher.stats().failed, 2);
    }

    #[test]
    fn write_payload_flushes_complete_buffer() {
        let mut sink = Vec::new();
        write_payload(&mut sink, b"payload", Duration::from_millis(5)).unwrap();
        assert_eq!(sink, b"payload");
    }

    #[test]
    fn parses_channel_mode() {
        assert_eq!("per-message".parse::<ChannelMode>().unwrap(), ChannelMode::PerMessage);
        assert_eq!("Persistent".parse::<ChannelMode>().unwrap(), ChannelMode::Persistent);
        assert!("udp".parse::<ChannelMode>().is_err());
    }
}
