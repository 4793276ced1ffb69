//! Fixed-rate tick scheduling.
//!
//! `TickTimer` decides when a fixed-rate tick is due. It tracks a virtual
//! "next due" timestamp that advances by one fixed interval per counted
//! tick, independent of how late the caller checks in. A stalled host
//! therefore catches up with a burst of due ticks instead of drifting the
//! long-run average rate.
//!
//! The burst is clamped: after `max_catch_up` ticks in a single call the
//! deadline resynchronizes to `now` and the remaining missed ticks are
//! skipped. A `now` at or before the deadline yields zero ticks, so clock
//! anomalies cannot trigger a runaway burst either.

use std::time::{Duration, Instant};

use tracing::warn;

/// Default clamp on catch-up ticks per poll.
pub const DEFAULT_MAX_CATCH_UP: u32 = 4;

/// Owns the deadline state for one fixed-rate timer.
///
/// Construct one per loop and pass it in; there is no hidden per-call-site
/// state, and several independent timers can coexist. All methods take the
/// current time as an argument, so tests drive it with synthetic instants.
#[derive(Debug)]
pub struct TickTimer {
    interval: Duration,
    next_due: Instant,
    max_catch_up: u32,
}

impl TickTimer {
    /// Create a timer firing `ticks_per_sec` times a second, starting at
    /// `now`. The first tick is due one interval after `now`.
    ///
    /// # Panics
    ///
    /// Panics if `ticks_per_sec` is zero.
    pub fn new(ticks_per_sec: u32, max_catch_up: u32, now: Instant) -> Self {
        assert!(ticks_per_sec > 0, "tick rate must be positive");
        let interval = Duration::from_secs_f64(1.0 / f64::from(ticks_per_sec));
        Self {
            interval,
            next_due: now + interval,
            max_catch_up: max_catch_up.max(1),
        }
    }

    /// The fixed interval between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks due at `now`, at most `max_catch_up`.
    ///
    /// The deadline advances one interval per counted tick. When the clamp
    /// hits, the deadline resynchronizes to `now + interval` and the
    /// remaining backlog is dropped.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        let mut fired = 0;
        while now >= self.next_due {
            self.next_due += self.interval;
            fired += 1;
            if fired == self.max_catch_up && now >= self.next_due {
                warn!(
                    clamped = fired,
                    "tick backlog exceeded catch-up clamp, skipping missed ticks"
                );
                self.next_due = now + self.interval;
                break;
            }
        }
        fired
    }

    /// The next deadline. Useful for sleeping until the next tick.
    pub fn next_due(&self) -> Instant {
        self.next_due
    }
}
