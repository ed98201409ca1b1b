//! Session-wide progress state behind one lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::observer::Observer;
use crate::speed::{format_rate, SpeedTracker};

/// Minimum gap between two throughput messages.
const RATE_MESSAGE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct ProgressState {
    speed: SpeedTracker,
    done: u64,
    total: u64,
    last_rate_message: Option<Instant>,
}

impl ProgressState {
    fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done as f64 / self.total as f64).min(1.0)
    }
}

/// Tracks bytes done against the total of all items in a session.
///
/// Every observer progress or speed call happens while the lock is held, so
/// the collector, the single-stream reader and the merge never interleave
/// their updates.
pub struct ProgressReporter {
    observer: Arc<dyn Observer>,
    state: Mutex<ProgressState>,
}

impl ProgressReporter {
    pub fn new(observer: Arc<dyn Observer>, total: u64) -> Self {
        Self {
            observer,
            state: Mutex::new(ProgressState {
                speed: SpeedTracker::new(),
                done: 0,
                total,
                last_rate_message: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the session total once every item size is known.
    pub fn set_total(&self, total: u64) {
        self.lock().total = total;
    }

    /// Restarts throughput measurement for a new item.
    pub fn begin_item(&self) {
        let mut st = self.lock();
        st.speed.mark_begin();
        st.last_rate_message = None;
    }

    /// Credits bytes that are already on disk (skipped items, resume offsets).
    pub fn skip(&self, n: u64) {
        let mut st = self.lock();
        st.done += n;
        self.observer.on_progress_update(st.fraction());
    }

    /// Records `n` freshly written bytes.
    pub fn advance(&self, n: u64) {
        let mut st = self.lock();
        st.done += n;
        st.speed.add_bytes(n);
        self.observer.on_progress_update(st.fraction());
        let now = Instant::now();
        let due = st
            .last_rate_message
            .map_or(true, |t| now.duration_since(t) >= RATE_MESSAGE_INTERVAL);
        if due {
            if let Some(rate) = st.speed.recent_throughput_at(now) {
                st.last_rate_message = Some(now);
                self.observer.on_message(&format_rate(rate));
            }
        }
    }

    /// Overrides the fraction directly (merge progress).
    pub fn set_fraction(&self, fraction: f64) {
        let _st = self.lock();
        self.observer.on_progress_update(fraction.clamp(0.0, 1.0));
    }

    pub fn message(&self, message: &str) {
        let _st = self.lock();
        self.observer.on_message(message);
    }

    pub fn bytes_done(&self) -> u64 {
        self.lock().done
    }
}
