//! pose_relay - stream camera pose landmarks to the animation controller
//!
//! Opens the configured camera, detects one person per frame, maps the
//! landmarks into canvas space and writes `UpdatePose` messages to the
//! consumer's named pipe until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use pose_relay::pose::{build_backend, BackendKind};
use pose_relay::ui::StatusIndicator;
use pose_relay::{
    CameraSource, CaptureLoop, CoordinateMapper, FrameDispatcher, LandmarkSource, PipeConnector,
    RelayConfig, StopSignal,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML, or JSON with a .json extension).
    #[arg(long, env = "POSE_RELAY_CONFIG")]
    config: Option<PathBuf>,
    /// Camera index, device path, or stub://<name>.
    #[arg(long)]
    camera: Option<String>,
    /// Pipe name, or an explicit endpoint path.
    #[arg(long)]
    pipe: Option<String>,
    /// Pose backend (stub, tract).
    #[arg(long)]
    backend: Option<BackendKind>,
    /// Pose model file for the tract backend.
    #[arg(long)]
    model_path: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Status display (auto, plain, pretty, none).
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = RelayConfig::load_from(args.config.as_deref())?;
    if let Some(camera) = &args.camera {
        cfg.set_camera(camera);
    }
    if let Some(pipe) = &args.pipe {
        cfg.set_pipe(pipe);
    }
    if let Some(backend) = args.backend {
        cfg.pose.backend = backend;
    }
    if let Some(path) = args.model_path {
        cfg.pose.model_path = Some(path);
    }
    if args.max_frames.is_some() {
        cfg.run.max_frames = args.max_frames;
    }
    cfg.validate()?;
    if cfg.stub_pose_on_real_camera() {
        log::warn!(
            "pose backend stub ignores camera {}; sending a synthetic skeleton. use --backend tract for real poses",
            cfg.camera.device
        );
    }

    let source = CameraSource::new(cfg.camera.clone())?;
    let backend = build_backend(
        cfg.pose.backend,
        cfg.pose.options,
        cfg.pose.model_path.as_deref(),
    )
    .context("failed to initialize pose backend")?;
    let landmarks = LandmarkSource::new(backend);
    let mapper = CoordinateMapper::new(cfg.canvas()?);
    let dispatcher = FrameDispatcher::from_connector(
        PipeConnector::new(cfg.pipe_path()),
        cfg.channel.mode,
        cfg.channel.policy.clone(),
    )
    .with_pretty(cfg.channel.pretty);

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.stop();
    })
    .context("error setting Ctrl-C handler")?;

    log::info!(
        "pose_relay {} camera={} backend={} complexity={} canvas={}x{}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.device,
        cfg.pose.backend,
        cfg.pose.options.model_complexity,
        cfg.canvas_width,
        cfg.canvas_height
    );
    log::info!("pose_relay running. press Ctrl-C to stop");

    let status = StatusIndicator::from_args(Some(args.ui.as_str()), std::io::stderr().is_terminal());
    let mut capture = CaptureLoop::new(source, landmarks, mapper, dispatcher, stop)
        .with_options(cfg.loop_options())
        .with_status(status);
    let stats = capture.run()?;

    let dispatch = capture.dispatcher().stats();
    log::info!(
        "pose_relay stopped after {} frames: sent={} no_person={} dropped={} dispatch_failed={} reconnects={}",
        stats.frames,
        stats.sent,
        stats.no_person,
        stats.dropped,
        stats.dispatch_failed,
        dispatch.reconnects
    );
    Ok(())
}
