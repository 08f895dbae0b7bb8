//! Animation session

use cybird_core::SubjectId;

/// The subject currently loaded for playback.
///
/// Replaced wholesale by every `load`. The generation increases with each
/// load so buffers decoded for an older session can be recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationSession {
    subject: SubjectId,
    display_name: String,
    frame_count: u8,
    current_frame_index: u8,
    generation: u64,
}

impl AnimationSession {
    /// New session positioned at frame 0. `frame_count` must be non-zero.
    pub(crate) fn new(
        subject: SubjectId,
        display_name: impl Into<String>,
        frame_count: u8,
        generation: u64,
    ) -> Self {
        debug_assert!(frame_count > 0);
        AnimationSession {
            subject,
            display_name: display_name.into(),
            frame_count,
            current_frame_index: 0,
            generation,
        }
    }

    #[inline]
    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[inline]
    pub fn frame_count(&self) -> u8 {
        self.frame_count
    }

    #[inline]
    pub fn current_frame_index(&self) -> u8 {
        self.current_frame_index
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Index that follows the current one
    #[inline]
    pub fn next_index(&self) -> u8 {
        ((self.current_frame_index as u16 + 1) % self.frame_count.max(1) as u16) as u8
    }

    /// Move to the next frame, wrapping at `frame_count`
    pub fn advance(&mut self) -> u8 {
        self.current_frame_index = self.next_index();
        self.current_frame_index
    }
}
