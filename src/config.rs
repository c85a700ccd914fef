use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::capture::LoopOptions;
use crate::ingest::CameraConfig;
use crate::mapper::{Canvas, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
use crate::pose::{BackendKind, ModelComplexity, PoseOptions};
use crate::transport::{
    default_pipe_path, is_pipe_path, ChannelMode, RetryPolicy, DEFAULT_PIPE_NAME,
};

const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 5;

/// Largest accepted camera width or height, in pixels.
pub const MAX_FRAME_DIMENSION: u32 = 8192;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RelayConfigFile {
    camera: Option<CameraConfigFile>,
    pose: Option<PoseConfigFile>,
    canvas: Option<CanvasConfigFile>,
    channel: Option<ChannelConfigFile>,
    run: Option<RunConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    index: Option<u32>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PoseConfigFile {
    backend: Option<BackendKind>,
    model_path: Option<PathBuf>,
    min_detection_confidence: Option<f32>,
    min_tracking_confidence: Option<f32>,
    model_complexity: Option<ModelComplexity>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CanvasConfigFile {
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ChannelConfigFile {
    name: Option<String>,
    path: Option<PathBuf>,
    mode: Option<ChannelMode>,
    pretty: Option<bool>,
    write_timeout_ms: Option<u64>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    pause_after_failures: Option<u32>,
    pause_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RunConfigFile {
    max_frames: Option<u64>,
    health_interval_secs: Option<u64>,
}

/// Fully resolved relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub camera: CameraConfig,
    pub pose: PoseSettings,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub channel: ChannelSettings,
    pub run: RunSettings,
}

#[derive(Debug, Clone)]
pub struct PoseSettings {
    pub backend: BackendKind,
    pub model_path: Option<PathBuf>,
    pub options: PoseOptions,
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub name: String,
    /// Explicit endpoint path; wins over `name`.
    pub path: Option<PathBuf>,
    pub mode: ChannelMode,
    pub pretty: bool,
    pub policy: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_frames: Option<u64>,
    pub health_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_file(RelayConfigFile::default())
    }
}

impl RelayConfig {
    /// Load from `POSE_RELAY_CONFIG` (if set), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("POSE_RELAY_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => RelayConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelayConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let defaults = CameraConfig::default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .or_else(|| camera_file.index.map(CameraConfig::device_for_index))
                .unwrap_or(defaults.device),
            target_fps: camera_file.target_fps.unwrap_or(defaults.target_fps),
            width: camera_file.width.unwrap_or(defaults.width),
            height: camera_file.height.unwrap_or(defaults.height),
        };

        let pose_file = file.pose.unwrap_or_default();
        let default_options = PoseOptions::default();
        let pose = PoseSettings {
            backend: pose_file.backend.unwrap_or_default(),
            model_path: pose_file.model_path,
            options: PoseOptions {
                min_detection_confidence: pose_file
                    .min_detection_confidence
                    .unwrap_or(default_options.min_detection_confidence),
                min_tracking_confidence: pose_file
                    .min_tracking_confidence
                    .unwrap_or(default_options.min_tracking_confidence),
                model_complexity: pose_file
                    .model_complexity
                    .unwrap_or(default_options.model_complexity),
            },
        };

        let canvas = file.canvas.unwrap_or_default();

        let channel_file = file.channel.unwrap_or_default();
        let default_policy = RetryPolicy::default();
        let channel = ChannelSettings {
            name: channel_file
                .name
                .unwrap_or_else(|| DEFAULT_PIPE_NAME.to_string()),
            path: channel_file.path,
            mode: channel_file.mode.unwrap_or_default(),
            pretty: channel_file.pretty.unwrap_or(false),
            policy: RetryPolicy {
                initial_backoff: channel_file
                    .initial_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_policy.initial_backoff),
                max_backoff: channel_file
                    .max_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_policy.max_backoff),
                pause_after_failures: channel_file
                    .pause_after_failures
                    .unwrap_or(default_policy.pause_after_failures),
                pause: channel_file
                    .pause_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_policy.pause),
                write_timeout: channel_file
                    .write_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_policy.write_timeout),
            },
        };

        let run_file = file.run.unwrap_or_default();
        let run = RunSettings {
            max_frames: run_file.max_frames,
            health_interval: Duration::from_secs(
                run_file
                    .health_interval_secs
                    .unwrap_or(DEFAULT_HEALTH_INTERVAL_SECS),
            ),
        };

        Self {
            camera,
            pose,
            canvas_width: canvas.width.unwrap_or(DEFAULT_CANVAS_WIDTH),
            canvas_height: canvas.height.unwrap_or(DEFAULT_CANVAS_HEIGHT),
            channel,
            run,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(camera) = env_value("POSE_RELAY_CAMERA") {
            self.set_camera(&camera);
        }
        if let Some(backend) = env_value("POSE_RELAY_BACKEND") {
            self.pose.backend = backend.parse().context("POSE_RELAY_BACKEND")?;
        }
        if let Some(path) = env_value("POSE_RELAY_MODEL_PATH") {
            self.pose.model_path = Some(PathBuf::from(path));
        }
        if let Some(pipe) = env_value("POSE_RELAY_PIPE") {
            self.set_pipe(&pipe);
        }
        if let Some(width) = env_parse("POSE_RELAY_CANVAS_WIDTH")? {
            self.canvas_width = width;
        }
        if let Some(height) = env_parse("POSE_RELAY_CANVAS_HEIGHT")? {
            self.canvas_height = height;
        }
        if let Some(value) = env_parse("POSE_RELAY_MIN_DETECTION_CONFIDENCE")? {
            self.pose.options.min_detection_confidence = value;
        }
        if let Some(value) = env_parse("POSE_RELAY_MIN_TRACKING_CONFIDENCE")? {
            self.pose.options.min_tracking_confidence = value;
        }
        if let Some(value) = env_parse("POSE_RELAY_MODEL_COMPLEXITY")? {
            self.pose.options.model_complexity = value;
        }
        if let Some(mode) = env_parse("POSE_RELAY_CHANNEL_MODE")? {
            self.channel.mode = mode;
        }
        Ok(())
    }

    /// Numeric values select `/dev/video<n>`; anything else is a device path
    /// or `stub://` name.
    pub fn set_camera(&mut self, value: &str) {
        let value = value.trim();
        self.camera.device = match value.parse::<u32>() {
            Ok(index) => CameraConfig::device_for_index(index),
            Err(_) => value.to_string(),
        };
    }

    /// Values containing a path separator are explicit endpoint paths;
    /// bare names resolve in the platform pipe namespace.
    pub fn set_pipe(&mut self, value: &str) {
        let value = value.trim();
        if is_pipe_path(value) {
            self.channel.path = Some(PathBuf::from(value));
        } else {
            self.channel.name = value.to_string();
            self.channel.path = None;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.canvas()?;
        self.pose.options.validate()?;
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        for (label, value) in [("width", self.camera.width), ("height", self.camera.height)] {
            if value == 0 || value > MAX_FRAME_DIMENSION {
                return Err(anyhow!(
                    "camera {} must be between 1 and {}, got {}",
                    label,
                    MAX_FRAME_DIMENSION,
                    value
                ));
            }
        }
        if self.channel.path.is_none() && self.channel.name.trim().is_empty() {
            return Err(anyhow!("channel name must not be empty"));
        }
        if self.channel.policy.max_backoff < self.channel.policy.initial_backoff {
            return Err(anyhow!(
                "channel max_backoff_ms must be at least initial_backoff_ms"
            ));
        }
        if self.channel.policy.write_timeout.is_zero() {
            return Err(anyhow!("channel write_timeout_ms must be greater than zero"));
        }
        if self.pose.backend == BackendKind::Tract && self.pose.model_path.is_none() {
            return Err(anyhow!("pose backend tract requires model_path"));
        }
        Ok(())
    }

    /// True when the `stub` backend is paired with a real camera: frames are
    /// captured but the poses sent are the stub's animated skeleton.
    pub fn stub_pose_on_real_camera(&self) -> bool {
        self.pose.backend == BackendKind::Stub && !self.camera.device.starts_with("stub://")
    }

    pub fn canvas(&self) -> Result<Canvas> {
        Canvas::new(self.canvas_width, self.canvas_height)
    }

    /// Endpoint the dispatcher writes to.
    pub fn pipe_path(&self) -> PathBuf {
        self.channel
            .path
            .clone()
            .unwrap_or_else(|| default_pipe_path(&self.channel.name))
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            max_frames: self.run.max_frames,
            health_interval: self.run.health_interval,
        }
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_value(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(None),
    }
}
