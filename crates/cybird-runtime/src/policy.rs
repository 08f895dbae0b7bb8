//! Adaptive prefetch policy
//!
//! Prefetching holds two frames in memory at once. When that keeps failing
//! (usually a tight heap), the policy switches the session to synchronous
//! per-frame decoding until the next `load`.

/// Consecutive prefetch failures that disable prefetching
pub const DEFAULT_MAX_PRELOAD_FAILURES: u8 = 3;

/// Prefetch failure streak tracking
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefetchPolicy {
    consecutive_failures: u8,
    enabled: bool,
    max_failures: u8,
}

impl PrefetchPolicy {
    pub fn new(max_failures: u8) -> Self {
        PrefetchPolicy {
            consecutive_failures: 0,
            enabled: true,
            max_failures: max_failures.max(1),
        }
    }

    /// Record the outcome of one prefetch attempt.
    ///
    /// Returns `true` if this failure is the one that disabled prefetching.
    pub fn on_preload_result(&mut self, success: bool) -> bool {
        if success {
            self.consecutive_failures = 0;
            return false;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.enabled && self.consecutive_failures >= self.max_failures {
            self.enabled = false;
            return true;
        }
        false
    }

    /// Back to enabled with a clean streak (new session)
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.enabled = true;
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn consecutive_failures(&self) -> u8 {
        self.consecutive_failures
    }

    #[inline]
    pub fn max_failures(&self) -> u8 {
        self.max_failures
    }
}

impl Default for PrefetchPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PRELOAD_FAILURES)
    }
}
