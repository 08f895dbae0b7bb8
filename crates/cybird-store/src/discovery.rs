//! Frame-count discovery
//!
//! Subjects on the card carry no manifest, so the highest frame number has to
//! be found by probing for files. Frames are contiguous from 1, which makes
//! the "last existing index" monotone and binary-searchable.

use cybird_core::SubjectId;
use tracing::debug;

use crate::{FrameStore, Yielder};

/// Frame counts tried first, checked largest to smallest
pub const COMMON_FRAME_COUNTS: [u16; 6] = [8, 16, 24, 32, 48, 64];

/// Highest frame number ever considered
pub const MAX_FRAME_SCAN: u16 = 200;

/// Yield to other work after this many existence checks
const CHECKS_PER_YIELD: u32 = 10;

struct FrameScan<'a> {
    store: &'a FrameStore,
    subject: SubjectId,
    checks: u32,
}

impl FrameScan<'_> {
    fn exists(&mut self, frame_number: u16) -> bool {
        self.checks += 1;
        if self.checks % CHECKS_PER_YIELD == 0 {
            self.store.yielder().yield_now();
        }
        self.store.storage().exists(self.subject, frame_number)
    }

    /// Largest `n` in `[lo, hi]` that exists, given that `lo` exists
    fn upper_bound(&mut self, mut lo: u16, mut hi: u16) -> u16 {
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.exists(mid) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    fn run(&mut self) -> u16 {
        if !self.exists(1) {
            return 0;
        }

        for &count in COMMON_FRAME_COUNTS.iter().rev() {
            if !self.exists(count) {
                continue;
            }
            if count >= MAX_FRAME_SCAN || !self.exists(count + 1) {
                return count;
            }
            return self.upper_bound(count + 1, MAX_FRAME_SCAN);
        }

        let mut last = 1;
        for n in 2..=MAX_FRAME_SCAN {
            if !self.exists(n) {
                break;
            }
            last = n;
        }
        last
    }
}

impl FrameStore {
    /// Number of contiguous frames stored for `subject`, capped at
    /// [`MAX_FRAME_SCAN`]. Returns 0 when frame 1 is missing.
    pub fn discover_frame_count(&self, subject: SubjectId) -> u8 {
        let mut scan = FrameScan {
            store: self,
            subject,
            checks: 0,
        };
        let count = scan.run();
        debug!(%subject, count, checks = scan.checks, "frame count discovered");
        u8::try_from(count).unwrap_or(u8::MAX)
    }
}
