//! Terminal observer: one rewritten progress line on stderr, messages on
//! their own lines.

use segmux_core::Observer;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Line {
    /// Last printed percentage.
    pct: Option<u32>,
    rate: String,
}

#[derive(Debug, Default)]
pub struct ConsoleObserver {
    line: Mutex<Line>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn redraw(line: &Line) {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r  {:>3}%  {:<14}", line.pct.unwrap_or(0), line.rate);
        let _ = err.flush();
    }
}

/// Throughput messages look like `1.25 MB/s`, `512 KB/s` or `80 B/s`.
fn is_rate(message: &str) -> bool {
    message.ends_with("B/s") && message.split_whitespace().count() == 2
}

impl Observer for ConsoleObserver {
    fn on_error(&self, message: &str) {
        eprintln!("\nerror: {}", message);
    }

    fn on_message(&self, message: &str) {
        let mut line = self.line.lock().unwrap_or_else(|e| e.into_inner());
        if is_rate(message) {
            line.rate = message.to_string();
            Self::redraw(&line);
        } else {
            eprintln!("\r{:<40}", message);
            Self::redraw(&line);
        }
    }

    fn on_progress_update(&self, fraction: f64) {
        let mut line = self.line.lock().unwrap_or_else(|e| e.into_inner());
        let pct = (fraction * 100.0).floor() as u32;
        if line.pct != Some(pct) {
            line.pct = Some(pct);
            Self::redraw(&line);
        }
    }

    fn on_running_state_changed(&self, running: bool) {
        if !running {
            eprintln!();
        }
    }

    fn on_finished(&self, output: &Path) {
        tracing::info!(output = %output.display(), "download finished");
    }
}
