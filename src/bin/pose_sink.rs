//! pose_sink - debug consumer for pose_relay
//!
//! Creates the FIFO the relay writes to, keeps a reader attached, and logs
//! every decoded `UpdatePose` message. Stands in for the animation controller
//! when testing on Unix hosts.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Log pose messages written by pose_relay")]
struct Args {
    /// Pipe name, or an explicit FIFO path.
    #[arg(long, env = "POSE_RELAY_PIPE", default_value = pose_relay::transport::DEFAULT_PIPE_NAME)]
    pipe: String,
    /// Log every point instead of a one-line summary.
    #[arg(long)]
    verbose: bool,
}

#[cfg(unix)]
impl Args {
    fn fifo_path(&self) -> PathBuf {
        pose_relay::transport::resolve_pipe(&self.pipe)
    }
}

#[cfg(unix)]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    sink::run(&args.fifo_path(), args.verbose)
}

#[cfg(not(unix))]
fn main() -> Result<()> {
    let args = Args::parse();
    Err(anyhow::anyhow!(
        "pose_sink needs a Unix FIFO; point the relay at a native pipe server for {}",
        args.pipe
    ))
}

#[cfg(unix)]
mod sink {
    use anyhow::{anyhow, Context, Result};
    use std::ffi::CString;
    use std::fs::OpenOptions;
    use std::io::{ErrorKind, Read};
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use pose_relay::transport::{DispatchMessage, StreamDecoder};

    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    pub fn run(path: &Path, verbose: bool) -> Result<()> {
        let created = ensure_fifo(path)?;

        let stop = Arc::new(AtomicBool::new(false));
        let handler_stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            handler_stop.store(true, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")?;

        // Non-blocking so Ctrl-C is noticed while no writer is attached.
        let mut fifo = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .with_context(|| format!("failed to open fifo {}", path.display()))?;
        log::info!("pose_sink listening on {}", path.display());

        let mut decoder = StreamDecoder::new();
        let mut buf = [0u8; 8192];
        let mut received = 0u64;
        while !stop.load(Ordering::SeqCst) {
            match fifo.read(&mut buf) {
                Ok(0) => std::thread::sleep(POLL_INTERVAL),
                Ok(n) => {
                    for result in decoder.push(&buf[..n]) {
                        match result {
                            Ok(message) => {
                                received += 1;
                                log_message(received, &message, verbose);
                            }
                            Err(err) => log::warn!("pose_sink: malformed message: {}", err),
                        }
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(POLL_INTERVAL)
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err).context("fifo read failed"),
            }
        }

        log::info!("pose_sink stopping after {} messages", received);
        if created {
            std::fs::remove_file(path)
                .with_context(|| format!("failed to remove fifo {}", path.display()))?;
        }
        Ok(())
    }

    /// Create the FIFO unless it already exists. Returns whether it was created.
    fn ensure_fifo(path: &Path) -> Result<bool> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.file_type().is_fifo() => return Ok(false),
            Ok(_) => return Err(anyhow!("{} exists and is not a fifo", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err).context(format!("failed to stat {}", path.display())),
        }
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| anyhow!("fifo path contains a NUL byte"))?;
        // SAFETY: c_path is a valid NUL-terminated string for the call's duration.
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error())
                .context(format!("failed to create fifo {}", path.display()));
        }
        Ok(true)
    }

    fn log_message(seq: u64, message: &DispatchMessage, verbose: bool) {
        if verbose {
            for (id, [x, y]) in message.points.iter() {
                log::info!("#{} {} ({:.1}, {:.1})", seq, id.name(), x, y);
            }
        } else {
            let chest = message
                .points
                .get(pose_relay::PointId::ChestMid)
                .map(|[x, y]| format!("({:.1}, {:.1})", x, y))
                .unwrap_or_else(|| "-".to_string());
            log::info!(
                "#{} {} points={} chest_mid={}",
                seq,
                message.command,
                message.points.len(),
                chest
            );
        }
    }
}
