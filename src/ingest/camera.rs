//! Camera frame source.
//!
//! `CameraSource` captures RGB frames from a local V4L2 device (e.g.
//! `/dev/video0`) or, for `stub://` devices, generates synthetic frames at the
//! configured rate. Device capture requires the `ingest-v4l2` feature.

use anyhow::Result;
#[cfg(not(feature = "ingest-v4l2"))]
use anyhow::anyhow;
use std::time::{Duration, Instant};

use super::FrameSource;
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://<name>".
    pub device: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl CameraConfig {
    /// Device path for a numeric camera index.
    pub fn device_for_index(index: u32) -> String {
        format!("/dev/video{}", index)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: Self::device_for_index(0),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::Device(DeviceCamera::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(anyhow!(
                    "camera {} requires the ingest-v4l2 feature",
                    config.device
                ))
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        match &self.backend {
            CameraBackend::Synthetic(source) => format!("{} (synthetic)", source.config.device),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.config.device.clone(),
        }
    }

    fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.open(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn is_open(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.open,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.state.is_some(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.close(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.close(),
        }
    }

    /// Device sources turn unhealthy after a read error or when no frame has
    /// arrived within the grace window. Synthetic sources are always healthy.
    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(1_000_000 / target_fps as u64)
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    open: bool,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            open: false,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        log::info!("CameraSource: opened {} (synthetic)", self.config.device);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        anyhow::ensure!(self.open, "synthetic camera is not open");

        // Pace to the configured rate like a real device would.
        if let Some(last) = self.last_frame_at {
            let interval = frame_interval(self.config.target_fps);
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
        self.frame_count += 1;

        Ok(Frame::new(
            self.generate_pixels(),
            self.config.width,
            self.config.height,
            self.frame_count,
        ))
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn close(&mut self) {
        if self.open {
            log::info!("CameraSource: released {}", self.config.device);
        }
        self.open = false;
    }
}

// ----------------------------------------------------------------------------
// Device source using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "ingest-v4l2")]
#[ouroboros::self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn open(&mut self) -> Result<()> {
        use anyhow::Context;
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open camera {}", self.config.device))?;
        let mut format = device.format().context("read camera format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read camera format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create camera buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "CameraSource: opened {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use anyhow::Context;
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("camera not open")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture camera frame")
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;

        Ok(Frame::new(
            buf.to_vec(),
            self.active_width,
            self.active_height,
            self.frame_count,
        ))
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("CameraSource: released {}", self.config.device);
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn health_grace(&self) -> Duration {
        frame_interval(self.config.target_fps)
            .saturating_mul(6)
            .max(Duration::from_secs(2))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            target_fps: 0,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn camera_source_produces_sequenced_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.open()?;

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_eq!(first.width, 64);
        assert_eq!(first.height, 48);
        assert_eq!(first.pixels().len(), first.expected_len());
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert!(source.is_healthy());

        Ok(())
    }

    #[test]
    fn closed_camera_refuses_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        assert!(!source.is_open());
        assert!(source.next_frame().is_err());

        source.open()?;
        assert!(source.is_open());
        source.close();
        source.close();
        assert!(!source.is_open());
        assert!(source.next_frame().is_err());

        Ok(())
    }

    #[test]
    fn device_index_maps_to_video_node() {
        assert_eq!(CameraConfig::device_for_index(2), "/dev/video2");
        assert_eq!(CameraConfig::default().device, "/dev/video0");
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_devices_require_feature() {
        assert!(CameraSource::new(CameraConfig::default()).is_err());
    }
}
