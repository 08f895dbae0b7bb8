//! Cooperative pacing for long reads
//!
//! A full frame takes tens of milliseconds to stream off the card. The
//! decoding context also owns other periodic duties, so payload reads are
//! split into bounded chunks and the context yields once a byte or time
//! budget is spent.

use std::fmt;
use std::time::{Duration, Instant};

/// Bytes requested from the card per read call
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Yield after this many bytes
pub const DEFAULT_YIELD_EVERY_BYTES: usize = 32 * 1024;

/// Yield after this much continuous reading
pub const DEFAULT_MAX_BUSY: Duration = Duration::from_millis(20);

/// Gives up the current time slice
pub trait Yielder: Send + Sync {
    fn yield_now(&self);
}

/// Yields the OS thread
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadYielder;

impl Yielder for ThreadYielder {
    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// Chunking and yield cadence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadPacing {
    pub chunk_size: usize,
    pub yield_every_bytes: usize,
    pub max_busy: Duration,
}

impl Default for ReadPacing {
    fn default() -> Self {
        ReadPacing {
            chunk_size: DEFAULT_CHUNK_SIZE,
            yield_every_bytes: DEFAULT_YIELD_EVERY_BYTES,
            max_busy: DEFAULT_MAX_BUSY,
        }
    }
}

impl ReadPacing {
    /// Chunk size clamped to at least one byte
    #[inline]
    pub fn effective_chunk(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// Tracks one read's budget and yields when it runs out
pub struct Pacer<'a> {
    pacing: ReadPacing,
    yielder: &'a dyn Yielder,
    bytes_since_yield: usize,
    slice_start: Instant,
    yields: u32,
}

impl<'a> Pacer<'a> {
    pub fn new(pacing: ReadPacing, yielder: &'a dyn Yielder) -> Self {
        Pacer {
            pacing,
            yielder,
            bytes_since_yield: 0,
            slice_start: Instant::now(),
            yields: 0,
        }
    }

    /// Account for `bytes` just read, yielding if the budget is spent
    pub fn record(&mut self, bytes: usize) {
        self.bytes_since_yield += bytes;
        if self.bytes_since_yield >= self.pacing.yield_every_bytes
            || self.slice_start.elapsed() >= self.pacing.max_busy
        {
            self.yielder.yield_now();
            self.yields += 1;
            self.bytes_since_yield = 0;
            self.slice_start = Instant::now();
        }
    }

    /// Yields performed so far
    pub fn yields(&self) -> u32 {
        self.yields
    }
}

impl fmt::Debug for Pacer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pacer")
            .field("pacing", &self.pacing)
            .field("bytes_since_yield", &self.bytes_since_yield)
            .field("yields", &self.yields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counting(AtomicU32);

    impl Yielder for Counting {
        fn yield_now(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_yields_on_byte_budget() {
        let yielder = Counting::default();
        let pacing = ReadPacing {
            chunk_size: 1024,
            yield_every_bytes: 4096,
            max_busy: Duration::from_secs(60),
        };
        let mut pacer = Pacer::new(pacing, &yielder);
        for _ in 0..10 {
            pacer.record(1024);
        }
        assert_eq!(pacer.yields(), 2);
        assert_eq!(yielder.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_yields_on_time_budget() {
        let yielder = Counting::default();
        let pacing = ReadPacing {
            chunk_size: 1024,
            yield_every_bytes: usize::MAX,
            max_busy: Duration::ZERO,
        };
        let mut pacer = Pacer::new(pacing, &yielder);
        pacer.record(1);
        assert_eq!(pacer.yields(), 1);
    }

    #[test]
    fn test_zero_chunk_clamped() {
        let pacing = ReadPacing {
            chunk_size: 0,
            ..ReadPacing::default()
        };
        assert_eq!(pacing.effective_chunk(), 1);
    }
}
