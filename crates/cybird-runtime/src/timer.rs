//! Fixed-rate scheduling
//!
//! [`PlaybackTimer`] is the cancellable periodic task owned by the
//! controller: it is polled with the current time and reports when a tick is
//! due. [`FixedRate`] paces the render and worker loops.

use std::time::{Duration, Instant};

/// Cancellable periodic timer
#[derive(Clone, Debug)]
pub struct PlaybackTimer {
    period: Duration,
    next_due: Option<Instant>,
    fired: u64,
}

impl PlaybackTimer {
    pub fn new(period: Duration) -> Self {
        PlaybackTimer {
            period: period.max(Duration::from_millis(1)),
            next_due: None,
            fired: 0,
        }
    }

    /// Arm the timer, first tick one period after `now`
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.period);
        self.fired = 0;
    }

    /// Disarm. Pending ticks are dropped.
    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks delivered since the last `start`
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Whether a tick is due at `now`.
    ///
    /// Missed periods collapse into one tick; the schedule then resumes one
    /// period after `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }

        let next = due + self.period;
        self.next_due = Some(if next <= now { now + self.period } else { next });
        self.fired += 1;
        true
    }
}

/// Sleep-based fixed-rate loop pacing for a context thread
#[derive(Debug)]
pub struct FixedRate {
    period: Duration,
    next: Instant,
    overruns: u64,
}

impl FixedRate {
    pub fn new(period: Duration) -> Self {
        FixedRate {
            period,
            next: Instant::now() + period,
            overruns: 0,
        }
    }

    /// Sleep until the next period starts.
    ///
    /// If the previous iteration ran past its slot, the schedule is rebased
    /// instead of bursting to catch up.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += self.period;
        } else {
            self.overruns += 1;
            self.next = now + self.period;
        }
    }

    /// Iterations that started late
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}
