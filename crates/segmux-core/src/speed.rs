//! Rolling-window throughput accounting.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples older than this are purged and ignored.
pub const SPEED_WINDOW: Duration = Duration::from_secs(5);

/// No rate is reported until this much time has passed since `mark_begin`.
pub const SPEED_WARMUP: Duration = Duration::from_secs(1);

/// Byte counts keyed by arrival time, summed over a trailing 5 s window.
///
/// Not synchronised; the progress reporter owns it behind its lock.
#[derive(Debug, Default)]
pub struct SpeedTracker {
    begin: Option<Instant>,
    samples: VecDeque<(Instant, u64)>,
}

impl SpeedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new measurement; previous samples are dropped.
    pub fn mark_begin(&mut self) {
        self.mark_begin_at(Instant::now());
    }

    pub fn mark_begin_at(&mut self, now: Instant) {
        self.begin = Some(now);
        self.samples.clear();
    }

    pub fn add_bytes(&mut self, n: u64) {
        self.add_bytes_at(Instant::now(), n);
    }

    pub fn add_bytes_at(&mut self, now: Instant, n: u64) {
        self.samples.push_back((now, n));
    }

    /// Bytes per second over the trailing window, or `None` during warm-up.
    pub fn recent_throughput(&mut self) -> Option<f64> {
        self.recent_throughput_at(Instant::now())
    }

    pub fn recent_throughput_at(&mut self, now: Instant) -> Option<f64> {
        let begin = self.begin?;
        let elapsed = now.saturating_duration_since(begin);
        if elapsed < SPEED_WARMUP {
            return None;
        }
        let cutoff = now.checked_sub(SPEED_WINDOW);
        if let Some(cutoff) = cutoff {
            while matches!(self.samples.front(), Some((t, _)) if *t < cutoff) {
                self.samples.pop_front();
            }
        }
        let total: u64 = self.samples.iter().map(|(_, n)| n).sum();
        let secs = elapsed.min(SPEED_WINDOW).as_secs_f64();
        Some(total as f64 / secs)
    }
}

/// Human-readable rate: `"N B/s"`, `"N KB/s"` or `"N.NN MB/s"`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    let v = bytes_per_sec;
    if v < 1024.0 {
        return format!("{} B/s", v as u64);
    }
    let v = v / 1024.0;
    if v < 1024.0 {
        return format!("{} KB/s", v as u64);
    }
    format!("{:.2} MB/s", v / 1024.0)
}
