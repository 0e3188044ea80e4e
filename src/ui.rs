//! Terminal presentation for the command-line tools.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::display::StatusView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Console {
    pretty: bool,
}

impl Console {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let pretty = is_tty && mode != UiMode::Plain;
        Self { pretty }
    }

    /// Spinner on TTYs, a plain line otherwise. Completion prints on drop.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        StageGuard {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
        }
    }

    /// Print the status block for the current state.
    pub fn show(&self, view: &StatusView, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "{}", view.summary())?;
        if !view.history.is_empty() {
            writeln!(out, "history: {}", view.history.join(", "))?;
        }
        out.flush()
    }

    /// Like `show`, but redraws in place on TTYs.
    pub fn redraw(&self, view: &StatusView, out: &mut impl Write) -> std::io::Result<()> {
        if self.pretty {
            write!(out, "\x1b[2J\x1b[H")?;
        }
        self.show(view, out)
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
