//! Playback rig
//!
//! Owns a controller, a recording sink and a virtual clock, so playback can
//! be stepped deterministically without sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cybird_core::{CybirdResult, HeapGauge, SubjectInfo};
use cybird_runtime::{AnimationController, Extent, PlaybackConfig, RecordingSink};
use cybird_store::{FrameStorage, FrameStore, ReadPacing};

use crate::faults::CountingYielder;

/// Virtual monotonic clock
#[derive(Clone, Copy, Debug)]
pub struct ScenarioClock {
    origin: Instant,
    offset: Duration,
}

impl Default for ScenarioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioClock {
    pub fn new() -> Self {
        ScenarioClock {
            origin: Instant::now(),
            offset: Duration::ZERO,
        }
    }

    #[inline]
    pub fn now(&self) -> Instant {
        self.origin + self.offset
    }

    /// Time since the clock was created
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.offset
    }

    pub fn advance(&mut self, by: Duration) -> Instant {
        self.offset += by;
        self.now()
    }
}

/// Controller wired to a recording sink and a virtual clock
pub struct PlaybackRig {
    controller: AnimationController,
    sink: RecordingSink,
    yielder: Arc<CountingYielder>,
    clock: ScenarioClock,
    extent: Extent,
}

impl PlaybackRig {
    pub fn new(storage: Arc<dyn FrameStorage>, heap: HeapGauge, config: PlaybackConfig) -> Self {
        Self::with_pacing(storage, heap, config, ReadPacing::default())
    }

    pub fn with_pacing(
        storage: Arc<dyn FrameStorage>,
        heap: HeapGauge,
        config: PlaybackConfig,
        pacing: ReadPacing,
    ) -> Self {
        let yielder = CountingYielder::new();
        let store = FrameStore::new(storage, heap)
            .with_pacing(pacing)
            .with_yielder(yielder.clone());
        let extent = config.target_extent;
        PlaybackRig {
            controller: AnimationController::new(store, config),
            sink: RecordingSink::new(),
            yielder,
            clock: ScenarioClock::new(),
            extent,
        }
    }

    pub fn controller(&self) -> &AnimationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AnimationController {
        &mut self.controller
    }

    pub fn sink(&self) -> &RecordingSink {
        &self.sink
    }

    pub fn clock(&self) -> &ScenarioClock {
        &self.clock
    }

    pub fn yields(&self) -> u64 {
        self.yielder.yields()
    }

    pub fn heap(&self) -> &HeapGauge {
        self.controller.store().heap()
    }

    /// Load and play `subject` at the current virtual time, drawing frame 0
    pub fn start(&mut self, subject: &SubjectInfo) -> CybirdResult<u8> {
        let now = self.clock.now();
        let shown = self.controller.start(subject, now)?;
        shown.render(&mut self.sink, self.extent);
        Ok(self
            .controller
            .session()
            .map_or(0, |s| s.frame_count()))
    }

    /// Advance the clock by `dt` and poll once. Returns whether a frame was drawn.
    pub fn step(&mut self, dt: Duration) -> bool {
        let now = self.clock.advance(dt);
        match self.controller.poll(now) {
            Some(shown) => {
                shown.render(&mut self.sink, self.extent);
                true
            }
            None => false,
        }
    }

    /// Step in increments of `dt` until `total` has passed since start.
    /// Returns the number of frames drawn.
    pub fn run_until(&mut self, total: Duration, dt: Duration) -> usize {
        let mut drawn = 0;
        while self.clock.elapsed() + dt <= total {
            if self.step(dt) {
                drawn += 1;
            }
        }
        drawn
    }

    /// Index of the frame on screen
    pub fn frame_index(&self) -> Option<u8> {
        self.controller.session().map(|s| s.current_frame_index())
    }

    pub fn stop(&mut self) -> bool {
        self.controller.stop()
    }
}
