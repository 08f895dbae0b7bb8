//! Heap accounting for frame buffers
//!
//! The device has a few hundred KiB of heap and a single decoded frame can
//! take a large share of it. Every pixel buffer holds a [`HeapLease`] for
//! its size, so "free memory" is observable before allocating and every
//! release happens exactly once, on drop.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

struct GaugeInner {
    capacity: usize,
    in_use: AtomicUsize,
    live: AtomicUsize,
    granted: AtomicU64,
    released: AtomicU64,
}

/// Shared view of the frame-buffer heap
#[derive(Clone)]
pub struct HeapGauge {
    inner: Arc<GaugeInner>,
}

impl HeapGauge {
    /// Gauge with a fixed capacity in bytes
    pub fn with_capacity(capacity: usize) -> Self {
        HeapGauge {
            inner: Arc::new(GaugeInner {
                capacity,
                in_use: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
                granted: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Gauge that never reports memory pressure
    pub fn unbounded() -> Self {
        Self::with_capacity(usize::MAX)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Bytes currently available for new buffers
    pub fn free_bytes(&self) -> usize {
        self.inner
            .capacity
            .saturating_sub(self.inner.in_use.load(Ordering::Acquire))
    }

    /// Bytes held by live leases
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Number of leases not yet released
    pub fn live_leases(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Total leases ever granted
    pub fn leases_granted(&self) -> u64 {
        self.inner.granted.load(Ordering::Acquire)
    }

    /// Total leases ever released
    pub fn leases_released(&self) -> u64 {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Account for `bytes` until the returned lease is dropped.
    ///
    /// The caller is expected to have checked [`free_bytes`](Self::free_bytes);
    /// the gauge itself never refuses.
    pub fn lease(&self, bytes: usize) -> HeapLease {
        self.inner.in_use.fetch_add(bytes, Ordering::AcqRel);
        self.inner.live.fetch_add(1, Ordering::AcqRel);
        self.inner.granted.fetch_add(1, Ordering::AcqRel);
        HeapLease {
            gauge: Arc::clone(&self.inner),
            bytes,
        }
    }
}

impl Default for HeapGauge {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for HeapGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapGauge")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use())
            .field("live", &self.live_leases())
            .finish()
    }
}

/// Accounting token for one allocation. Not `Clone`: one lease, one release.
pub struct HeapLease {
    gauge: Arc<GaugeInner>,
    bytes: usize,
}

impl HeapLease {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for HeapLease {
    fn drop(&mut self) {
        self.gauge.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
        self.gauge.live.fetch_sub(1, Ordering::AcqRel);
        self.gauge.released.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for HeapLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapLease({} bytes)", self.bytes)
    }
}
