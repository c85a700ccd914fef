use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
    Hidden,
}

/// Transient per-frame status shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Sending,
    NoPerson,
    ConsumerUnavailable,
}

impl Status {
    fn message(self) -> &'static str {
        match self {
            Status::Sending => "sending pose to consumer",
            Status::NoPerson => "no person in view",
            Status::ConsumerUnavailable => "consumer not listening",
        }
    }
}

/// Status line on stderr: a spinner on a TTY, otherwise one log line per
/// status change.
pub struct StatusIndicator {
    spinner: Option<ProgressBar>,
    plain: bool,
    last: Option<Status>,
}

impl StatusIndicator {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let use_pretty = is_tty && matches!(mode, UiMode::Pretty | UiMode::Auto);
        let spinner = use_pretty.then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner
        });
        Self {
            spinner,
            plain: !use_pretty && mode != UiMode::Hidden,
            last: None,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            Some("none") => UiMode::Hidden,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    pub fn hidden() -> Self {
        Self::new(UiMode::Hidden, false)
    }

    pub fn update(&mut self, status: Status) {
        let changed = self.last != Some(status);
        self.last = Some(status);
        if let Some(spinner) = &self.spinner {
            if changed {
                spinner.set_message(status.message());
            }
        } else if self.plain && changed {
            log::info!("status: {}", status.message());
        }
    }

    pub fn last(&self) -> Option<Status> {
        self.last
    }
}

impl Drop for StatusIndicator {
    fn drop(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}
