//! Double-buffer preloader
//!
//! Two slots: `current` is on screen, `next` is filled ahead of the frame
//! boundary while there is idle time. Both slots own their
//! [`FrameDescriptor`] outright, so a swap is a move and the displaced frame
//! is released exactly once when it is dropped.

use std::time::Duration;

use cybird_core::DecodeError;
use cybird_format::FrameDescriptor;
use cybird_store::FrameStore;
use tracing::{debug, trace, warn};

use crate::{AnimationSession, PrefetchPolicy};

/// Identifies which frame of which session a staged buffer holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotTag {
    pub frame: u8,
    pub generation: u64,
}

impl SlotTag {
    pub fn new(frame: u8, generation: u64) -> Self {
        SlotTag { frame, generation }
    }
}

/// Result of trying to promote `next` into `current`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapOutcome {
    /// `next` held the wanted frame and is now `current`
    Swapped,
    /// `next` held some other frame and was discarded
    Stale,
    /// Nothing was staged
    Empty,
}

struct Staged {
    tag: SlotTag,
    frame: FrameDescriptor,
}

/// The `current`/`next` slot pair. "Ready" means `next` is occupied.
#[derive(Default)]
pub struct BufferSlots {
    current: Option<FrameDescriptor>,
    next: Option<Staged>,
}

impl BufferSlots {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> Option<&FrameDescriptor> {
        self.current.as_ref()
    }

    /// Whether a staged frame is waiting
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.next.is_some()
    }

    pub fn next_tag(&self) -> Option<SlotTag> {
        self.next.as_ref().map(|s| s.tag)
    }

    /// Buffers currently held (0, 1 or 2)
    pub fn held(&self) -> usize {
        self.current.is_some() as usize + self.next.is_some() as usize
    }

    /// Replace `current`, releasing the previous frame
    pub fn set_current(&mut self, frame: FrameDescriptor) {
        self.current = Some(frame);
    }

    /// Release `current`. Returns whether anything was held.
    pub fn release_current(&mut self) -> bool {
        self.current.take().is_some()
    }

    /// Stage a frame in `next`, releasing anything already staged
    pub fn stage(&mut self, tag: SlotTag, frame: FrameDescriptor) {
        self.next = Some(Staged { tag, frame });
    }

    /// Promote `next` if it holds `wanted`. `next` is empty afterwards in
    /// every case.
    pub fn swap(&mut self, wanted: SlotTag) -> SwapOutcome {
        match self.next.take() {
            Some(staged) if staged.tag == wanted => {
                self.current = Some(staged.frame);
                SwapOutcome::Swapped
            }
            Some(_) => SwapOutcome::Stale,
            None => SwapOutcome::Empty,
        }
    }

    /// Release both slots
    pub fn clear(&mut self) {
        self.next = None;
        self.current = None;
    }
}

/// What a prefetch attempt did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// Not attempted (window too short, disabled, or already staged)
    Skipped,
    /// Next frame staged
    Staged,
    /// Decode failed; counted against the policy
    Failed(DecodeError),
}

/// How the frame at a boundary was obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    /// Promoted from the `next` slot
    Swapped,
    /// Decoded synchronously on the critical path
    Decoded,
}

#[derive(Clone, Debug, Default)]
pub struct PreloadStats {
    pub prefetch_attempts: u64,
    pub prefetch_failures: u64,
    pub swaps: u64,
    pub inline_decodes: u64,
    pub stale_discarded: u64,
}

/// Owns the slot pair and the prefetch policy for one controller
pub struct Preloader {
    store: FrameStore,
    slots: BufferSlots,
    policy: PrefetchPolicy,
    min_window: Duration,
    stats: PreloadStats,
}

impl Preloader {
    pub fn new(store: FrameStore, max_failures: u8, min_window: Duration) -> Self {
        Preloader {
            store,
            slots: BufferSlots::new(),
            policy: PrefetchPolicy::new(max_failures),
            min_window,
            stats: PreloadStats::default(),
        }
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn slots(&self) -> &BufferSlots {
        &self.slots
    }

    pub fn policy(&self) -> &PrefetchPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &PreloadStats {
        &self.stats
    }

    #[inline]
    pub fn current(&self) -> Option<&FrameDescriptor> {
        self.slots.current()
    }

    /// Release both slots and re-enable prefetching
    pub fn reset(&mut self) {
        self.slots.clear();
        self.policy.reset();
    }

    /// Release both slots, keeping the policy state
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Use idle time before the boundary to decode the following frame
    pub fn prefetch(&mut self, session: &AnimationSession, time_left: Duration) -> PrefetchOutcome {
        if time_left < self.min_window || !self.policy.is_enabled() || self.slots.is_ready() {
            return PrefetchOutcome::Skipped;
        }

        let index = session.next_index();
        self.stats.prefetch_attempts += 1;
        match self.store.decode(session.subject(), index) {
            Ok(frame) => {
                trace!(subject = %session.subject(), frame = index, "next frame staged");
                self.slots
                    .stage(SlotTag::new(index, session.generation()), frame);
                self.policy.on_preload_result(true);
                PrefetchOutcome::Staged
            }
            Err(e) => {
                self.stats.prefetch_failures += 1;
                if self.policy.on_preload_result(false) {
                    warn!(
                        subject = %session.subject(),
                        failures = self.policy.consecutive_failures(),
                        error = %e,
                        "prefetch disabled for this session"
                    );
                } else {
                    debug!(subject = %session.subject(), frame = index, error = %e, "prefetch failed");
                }
                PrefetchOutcome::Failed(e)
            }
        }
    }

    /// Make the session's current index the displayed frame.
    ///
    /// Uses the staged frame when it matches, otherwise releases `current`
    /// first and decodes inline. On error both slots are empty.
    pub fn present(&mut self, session: &AnimationSession) -> Result<Presented, DecodeError> {
        let index = session.current_frame_index();
        match self.slots.swap(SlotTag::new(index, session.generation())) {
            SwapOutcome::Swapped => {
                self.stats.swaps += 1;
                return Ok(Presented::Swapped);
            }
            SwapOutcome::Stale => {
                self.stats.stale_discarded += 1;
                debug!(subject = %session.subject(), frame = index, "discarded stale staged frame");
            }
            SwapOutcome::Empty => {}
        }

        self.slots.release_current();
        self.stats.inline_decodes += 1;
        let frame = self.store.decode(session.subject(), index)?;
        self.slots.set_current(frame);
        Ok(Presented::Decoded)
    }
}
