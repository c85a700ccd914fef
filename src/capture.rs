//! The per-frame capture loop.
//!
//! `Idle → Capturing → Stopped`. Each iteration reads one frame, detects the
//! person, maps the landmarks into canvas space and dispatches them, fully
//! finishing before the next frame is read. Per-frame failures are counted and
//! contained here; only opening the source is fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::ingest::FrameSource;
use crate::mapper::CoordinateMapper;
use crate::pose::LandmarkSource;
use crate::transport::{DispatchErrorKind, FrameDispatcher};
use crate::ui::{Status, StatusIndicator};

/// Cooperative stop flag, checked once per frame.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Capturing,
    Stopped,
}

/// What happened to one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame could not be read.
    Dropped,
    /// The pose backend failed on this frame.
    DetectFailed,
    /// Nobody in view; nothing dispatched.
    NoPerson,
    Sent,
    DispatchFailed(DispatchErrorKind),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub dropped: u64,
    pub detect_failed: u64,
    pub no_person: u64,
    pub sent: u64,
    pub dispatch_failed: u64,
    /// Health checks that found the source unhealthy.
    pub unhealthy_checks: u64,
}

#[derive(Clone, Debug)]
pub struct LoopOptions {
    /// Stop after this many iterations.
    pub max_frames: Option<u64>,
    /// Interval between health log lines.
    pub health_interval: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_frames: None,
            health_interval: Duration::from_secs(5),
        }
    }
}

/// Owns the video source and drives the pipeline once per frame.
pub struct CaptureLoop<S: FrameSource> {
    source: S,
    landmarks: LandmarkSource,
    mapper: CoordinateMapper,
    dispatcher: FrameDispatcher,
    stop: StopSignal,
    options: LoopOptions,
    status: StatusIndicator,
    state: LoopState,
    stats: LoopStats,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        landmarks: LandmarkSource,
        mapper: CoordinateMapper,
        dispatcher: FrameDispatcher,
        stop: StopSignal,
    ) -> Self {
        Self {
            source,
            landmarks,
            mapper,
            dispatcher,
            stop,
            options: LoopOptions::default(),
            status: StatusIndicator::hidden(),
            state: LoopState::Idle,
            stats: LoopStats::default(),
        }
    }

    pub fn with_options(mut self, options: LoopOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_status(mut self, status: StatusIndicator) -> Self {
        self.status = status;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Direct access for driving `step` without `run`.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn dispatcher(&self) -> &FrameDispatcher {
        &self.dispatcher
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run until stopped, the frame limit is reached, or the source ends.
    ///
    /// Fails only if the source cannot be opened or the backend cannot warm
    /// up. The source is released on every exit path.
    pub fn run(&mut self) -> Result<LoopStats> {
        anyhow::ensure!(self.state == LoopState::Idle, "capture loop already ran");

        let described = self.source.describe();
        self.source
            .open()
            .with_context(|| format!("failed to open video source {}", described))?;
        if let Err(err) = self.landmarks.warm_up() {
            self.shutdown();
            return Err(err.context(format!(
                "pose backend {} failed to warm up",
                self.landmarks.backend_name()
            )));
        }

        self.state = LoopState::Capturing;
        log::info!(
            "CaptureLoop: capturing from {} with backend {} -> {} ({})",
            described,
            self.landmarks.backend_name(),
            self.dispatcher.target(),
            self.dispatcher.mode()
        );

        let mut last_health_log = Instant::now();
        while !self.stop.is_stopped() {
            if self
                .options
                .max_frames
                .is_some_and(|max| self.stats.frames >= max)
            {
                break;
            }
            if !self.source.is_open() {
                log::warn!("CaptureLoop: source {} closed", described);
                break;
            }

            self.step();

            if last_health_log.elapsed() >= self.options.health_interval {
                self.check_health();
                last_health_log = Instant::now();
            }
        }

        self.shutdown();
        self.log_health(self.source.is_healthy());
        Ok(self.stats.clone())
    }

    /// Process exactly one frame.
    pub fn step(&mut self) -> FrameOutcome {
        self.stats.frames += 1;

        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.dropped += 1;
                log::debug!("CaptureLoop: frame dropped: {:#}", err);
                return FrameOutcome::Dropped;
            }
        };

        let landmarks = match self.landmarks.detect(&frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => {
                self.stats.no_person += 1;
                self.status.update(Status::NoPerson);
                return FrameOutcome::NoPerson;
            }
            Err(err) => {
                self.stats.detect_failed += 1;
                log::warn!(
                    "CaptureLoop: detection failed on frame {}: {:#}",
                    frame.sequence,
                    err
                );
                return FrameOutcome::DetectFailed;
            }
        };

        let mapped = self.mapper.map(&landmarks);
        match self.dispatcher.dispatch(mapped) {
            Ok(()) => {
                self.stats.sent += 1;
                self.status.update(Status::Sending);
                FrameOutcome::Sent
            }
            Err(err) => {
                self.stats.dispatch_failed += 1;
                self.status.update(Status::ConsumerUnavailable);
                FrameOutcome::DispatchFailed(err.kind())
            }
        }
    }

    fn shutdown(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.source.close();
        self.dispatcher.disconnect();
        self.state = LoopState::Stopped;
        log::info!("CaptureLoop: stopped");
    }

    fn check_health(&mut self) {
        let healthy = self.source.is_healthy();
        if !healthy {
            self.stats.unhealthy_checks += 1;
            log::warn!(
                "CaptureLoop: source {} is not delivering frames",
                self.source.describe()
            );
        }
        self.log_health(healthy);
    }

    fn log_health(&self, source_healthy: bool) {
        let dispatch = self.dispatcher.stats();
        log::info!(
            "capture health source_healthy={} frames={} sent={} no_person={} dropped={} detect_failed={} dispatch_failed={} reconnects={}",
            source_healthy,
            self.stats.frames,
            self.stats.sent,
            self.stats.no_person,
            self.stats.dropped,
            self.stats.detect_failed,
            self.stats.dispatch_failed,
            dispatch.reconnects
        );
    }
}

impl<S: FrameSource> Drop for CaptureLoop<S> {
    fn drop(&mut self) {
        if self.state == LoopState::Capturing {
            self.shutdown();
        }
    }
}
