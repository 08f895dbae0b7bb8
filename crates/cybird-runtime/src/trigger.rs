//! Coalescing trigger cell
//!
//! "Start or replace the animation" requests do not queue. A new request
//! overwrites one that has not been drained yet, so the render context only
//! ever acts on the latest.

use std::sync::atomic::{AtomicU64, Ordering};

use cybird_core::TriggerRequest;
use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug, Default)]
pub struct TriggerCell {
    pending: Mutex<Option<TriggerRequest>>,
    submitted: AtomicU64,
    coalesced: AtomicU64,
}

impl TriggerCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a request. Returns `true` if it replaced a pending one.
    pub fn request(&self, request: TriggerRequest) -> bool {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let replaced = self.pending.lock().replace(request).is_some();
        if replaced {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            trace!(?request, "pending trigger replaced");
        }
        replaced
    }

    /// Take the pending request, leaving the cell empty
    pub fn take(&self) -> Option<TriggerRequest> {
        self.pending.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Requests posted so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Requests overwritten before they were drained
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}
