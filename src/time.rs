//! Clocks and time formatting

use std::sync::atomic::{AtomicU64, Ordering};

pub use std::time::Duration;

/// Millisecond clock the countdown reads from
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }
}

/// Milliseconds since creation, measured on tokio's clock.
///
/// Follows `tokio::time::pause`/`advance`, so paused-time tests see the
/// same time the timers do.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(millis(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Current time in milliseconds
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Human readable time left, e.g. "in 3 seconds".
///
/// Seconds round up so the text never reads "in 0 seconds" while time remains.
pub fn format_remaining(remaining_ms: u64) -> String {
    let secs = remaining_ms.div_ceil(1000);
    if secs >= 60 {
        let mins = secs.div_ceil(60);
        return format!("in {} minute{}", mins, plural(mins));
    }
    format!("in {} second{}", secs, plural(secs))
}

fn plural(n: u64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
