//! Fault injection for frame storage
//!
//! Wraps a real backend and fails opens on demand or at random, so playback
//! can be driven through bad cards and flaky buses.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use cybird_core::SubjectId;
use cybird_store::{FrameFile, FrameStorage, Yielder};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Storage wrapper with injectable open failures
pub struct FaultyStorage {
    inner: Arc<dyn FrameStorage>,
    fail_next: AtomicUsize,
    failing: Mutex<HashSet<(SubjectId, u16)>>,
    failure_rate: f64,
    rng: Mutex<StdRng>,
    injected: AtomicU64,
}

impl FaultyStorage {
    pub fn new(inner: Arc<dyn FrameStorage>) -> Self {
        FaultyStorage {
            inner,
            fail_next: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
            failure_rate: 0.0,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            injected: AtomicU64::new(0),
        }
    }

    /// Fail opens at random with probability `rate`
    pub fn with_failure_rate(mut self, rate: f64, seed: u64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Fail the next `count` opens regardless of target
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every open of one frame until healed
    pub fn break_frame(&self, subject: SubjectId, frame_number: u16) {
        self.failing.lock().insert((subject, frame_number));
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
        self.fail_next.store(0, Ordering::SeqCst);
    }

    /// Failures injected so far
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    fn should_fail(&self, subject: SubjectId, frame_number: u16) -> bool {
        let queued = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if queued || self.failing.lock().contains(&(subject, frame_number)) {
            return true;
        }
        self.failure_rate > 0.0 && self.rng.lock().gen_bool(self.failure_rate)
    }
}

impl FrameStorage for FaultyStorage {
    fn open(&self, subject: SubjectId, frame_number: u16) -> io::Result<Box<dyn FrameFile>> {
        if self.should_fail(subject, frame_number) {
            self.injected.fetch_add(1, Ordering::Relaxed);
            return Err(io::Error::new(io::ErrorKind::Other, "injected open failure"));
        }
        self.inner.open(subject, frame_number)
    }

    fn exists(&self, subject: SubjectId, frame_number: u16) -> bool {
        self.inner.exists(subject, frame_number)
    }
}

/// Counts cooperative yields instead of giving up the thread
#[derive(Debug, Default)]
pub struct CountingYielder {
    yields: AtomicU64,
}

impl CountingYielder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn yields(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }
}

impl Yielder for CountingYielder {
    fn yield_now(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }
}
