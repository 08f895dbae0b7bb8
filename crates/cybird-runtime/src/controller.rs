//! Animation controller
//!
//! State machine: `Idle -> Loading -> Playing -> Idle`. `load` resolves the
//! frame count and resets prefetching, `play` insists on a real first frame,
//! and `tick` advances on frame boundaries. Once playing, a frame that fails
//! to decode is replaced by a placeholder and playback carries on.

use std::time::{Duration, Instant};

use cybird_core::{CybirdError, CybirdResult, SubjectId, SubjectInfo};
use cybird_format::{palette_color, FrameDescriptor, Rgb565, PLACEHOLDER_BORDER};
use cybird_store::FrameStore;
use tracing::{debug, info, warn};

use crate::{
    AnimationSession, Extent, PlaybackConfig, PlaybackTimer, PrefetchPolicy, Preloader,
    RenderSink,
};

/// Controller state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
}

/// What the screen should show
#[derive(Debug, Clone, Copy)]
pub enum Displayable<'a> {
    /// A decoded frame
    Frame(&'a FrameDescriptor),
    /// Solid fill from the placeholder palette
    Placeholder(u8),
}

impl Displayable<'_> {
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Displayable::Placeholder(_))
    }

    /// Hand this content to a sink
    pub fn render(&self, sink: &mut dyn RenderSink, extent: Extent) {
        match self {
            Displayable::Frame(frame) => sink.show(frame, extent),
            Displayable::Placeholder(index) => sink.fill(
                palette_color(*index),
                Rgb565::from_hex(PLACEHOLDER_BORDER),
                extent,
            ),
        }
    }
}

/// Playback counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub loads: u64,
    pub frames_shown: u64,
    pub placeholders: u64,
    pub slow_frames: u64,
    pub first_frame_failures: u64,
    pub prefetch_attempts: u64,
    pub prefetch_failures: u64,
    pub swaps: u64,
    pub inline_decodes: u64,
    pub stale_discarded: u64,
}

#[derive(Clone, Debug, Default)]
struct Counters {
    loads: u64,
    frames_shown: u64,
    placeholders: u64,
    slow_frames: u64,
    first_frame_failures: u64,
}

/// Drives playback of one subject at a time
pub struct AnimationController {
    preloader: Preloader,
    session: Option<AnimationSession>,
    state: PlaybackState,
    timer: PlaybackTimer,
    last_frame_at: Option<Instant>,
    generation: u64,
    showing_placeholder: bool,
    config: PlaybackConfig,
    counters: Counters,
}

impl AnimationController {
    pub fn new(store: FrameStore, config: PlaybackConfig) -> Self {
        AnimationController {
            preloader: Preloader::new(
                store,
                config.max_preload_failures,
                config.min_preload_window,
            ),
            session: None,
            state: PlaybackState::Idle,
            timer: PlaybackTimer::new(config.timer_period),
            last_frame_at: None,
            generation: 0,
            showing_placeholder: false,
            config,
            counters: Counters::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn session(&self) -> Option<&AnimationSession> {
        self.session.as_ref()
    }

    pub fn current_subject(&self) -> Option<SubjectId> {
        self.session.as_ref().map(|s| s.subject())
    }

    pub fn policy(&self) -> &PrefetchPolicy {
        self.preloader.policy()
    }

    pub fn preloader(&self) -> &Preloader {
        &self.preloader
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn timer(&self) -> &PlaybackTimer {
        &self.timer
    }

    pub fn store(&self) -> &FrameStore {
        self.preloader.store()
    }

    pub fn stats(&self) -> PlaybackStats {
        let preload = self.preloader.stats();
        PlaybackStats {
            loads: self.counters.loads,
            frames_shown: self.counters.frames_shown,
            placeholders: self.counters.placeholders,
            slow_frames: self.counters.slow_frames,
            first_frame_failures: self.counters.first_frame_failures,
            prefetch_attempts: preload.prefetch_attempts,
            prefetch_failures: preload.prefetch_failures,
            swaps: preload.swaps,
            inline_decodes: preload.inline_decodes,
            stale_discarded: preload.stale_discarded,
        }
    }

    /// What is on screen right now, if playing
    pub fn displayed(&self) -> Option<Displayable<'_>> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let session = self.session.as_ref()?;
        if self.showing_placeholder {
            return Some(Displayable::Placeholder(session.subject().palette_index()));
        }
        self.preloader.current().map(Displayable::Frame)
    }

    /// Load a subject, stopping whatever was playing.
    ///
    /// A cached frame count of 0 triggers discovery. Returns the frame count.
    pub fn load(&mut self, subject: &SubjectInfo) -> CybirdResult<u8> {
        self.stop();

        if !subject.id.is_valid() {
            return Err(CybirdError::InvalidSubject(subject.id));
        }

        let frame_count = if subject.needs_discovery() {
            self.preloader.store().discover_frame_count(subject.id)
        } else {
            subject.frame_count
        };
        if frame_count == 0 {
            warn!(subject = %subject.id, "subject has no frames");
            return Err(CybirdError::EmptySubject(subject.id));
        }

        self.generation += 1;
        self.session = Some(AnimationSession::new(
            subject.id,
            subject.name.clone(),
            frame_count,
            self.generation,
        ));
        self.preloader.reset();
        self.state = PlaybackState::Loading;
        self.counters.loads += 1;

        info!(subject = %subject.id, name = %subject.name, frames = frame_count, "subject loaded");
        Ok(frame_count)
    }

    /// Decode frame 0 and start the playback timer.
    ///
    /// Fails outright if frame 0 cannot be decoded; the controller is left
    /// idle in that case.
    pub fn play(&mut self, now: Instant) -> CybirdResult<Displayable<'_>> {
        match self.state {
            PlaybackState::Idle => return Err(CybirdError::NotLoaded),
            PlaybackState::Playing => return self.displayed().ok_or(CybirdError::NotLoaded),
            PlaybackState::Loading => {}
        }

        let Some(session) = self.session.as_ref() else {
            return Err(CybirdError::NotLoaded);
        };

        if let Err(e) = self.preloader.present(session) {
            warn!(subject = %session.subject(), error = %e, "first frame failed, not starting");
            self.counters.first_frame_failures += 1;
            self.stop();
            return Err(CybirdError::FirstFrame(e));
        }

        self.timer.start(now);
        self.last_frame_at = Some(now);
        self.showing_placeholder = false;
        self.state = PlaybackState::Playing;
        self.counters.frames_shown += 1;

        self.preloader
            .current()
            .map(Displayable::Frame)
            .ok_or(CybirdError::NotLoaded)
    }

    /// `load` followed by `play`
    pub fn start(&mut self, subject: &SubjectInfo, now: Instant) -> CybirdResult<Displayable<'_>> {
        self.load(subject)?;
        self.play(now)
    }

    /// Advance playback to `now`.
    ///
    /// Between boundaries this only prefetches and returns `None`. On a
    /// boundary it moves to the next index and returns what to show.
    pub fn tick(&mut self, now: Instant) -> Option<Displayable<'_>> {
        if self.state != PlaybackState::Playing {
            return None;
        }

        let interval = self.config.frame_interval;
        let session = self.session.as_mut()?;
        let last = self.last_frame_at.unwrap_or(now);
        let elapsed = now.saturating_duration_since(last);

        if elapsed < interval {
            self.preloader.prefetch(session, interval - elapsed);
            return None;
        }

        let started = Instant::now();
        let index = session.advance();
        self.last_frame_at = Some(now);
        let result = self.preloader.present(session);

        let cost = started.elapsed();
        if cost > interval {
            self.counters.slow_frames += 1;
            warn!(
                subject = %session.subject(),
                frame = index,
                cost_ms = cost.as_millis() as u64,
                "frame boundary overran the frame interval"
            );
        }

        match result {
            Ok(presented) => {
                debug!(subject = %session.subject(), frame = index, ?presented, "frame advanced");
                self.showing_placeholder = false;
                self.counters.frames_shown += 1;
            }
            Err(e) => {
                warn!(subject = %session.subject(), frame = index, error = %e, "frame decode failed, showing placeholder");
                self.showing_placeholder = true;
                self.counters.placeholders += 1;
            }
        }

        self.displayed()
    }

    /// Tick if the playback timer is due
    pub fn poll(&mut self, now: Instant) -> Option<Displayable<'_>> {
        if self.timer.poll(now) {
            self.tick(now)
        } else {
            None
        }
    }

    /// Cancel the timer, release both buffers and return to `Idle`.
    ///
    /// Returns whether anything was loaded.
    pub fn stop(&mut self) -> bool {
        let was_active = self.session.is_some();
        self.timer.cancel();
        self.preloader.clear();
        self.session = None;
        self.last_frame_at = None;
        self.showing_placeholder = false;
        self.state = PlaybackState::Idle;
        if was_active {
            debug!("playback stopped");
        }
        was_active
    }

    /// Time until the next frame boundary, if playing
    pub fn time_to_boundary(&self, now: Instant) -> Option<Duration> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.last_frame_at?);
        Some(self.config.frame_interval.saturating_sub(elapsed))
    }
}
