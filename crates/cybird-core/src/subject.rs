//! Subject registry entries

use serde::{Deserialize, Serialize};

use crate::SubjectId;

/// Default selection weight for subjects without an explicit one
pub const DEFAULT_WEIGHT: u16 = 10;

/// One registry row: `(id, name, weight, cachedFrameCount)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInfo {
    /// Subject id (frame directory name)
    pub id: SubjectId,
    /// Human readable name
    pub name: String,
    /// Relative weight for random selection
    pub weight: u16,
    /// Cached frame count, 0 = not yet discovered
    pub frame_count: u8,
}

impl SubjectInfo {
    pub fn new(id: SubjectId, name: impl Into<String>, weight: u16) -> Self {
        SubjectInfo {
            id,
            name: name.into(),
            weight,
            frame_count: 0,
        }
    }

    pub fn with_frame_count(mut self, frame_count: u8) -> Self {
        self.frame_count = frame_count;
        self
    }

    /// Whether the frame count still needs discovery
    #[inline]
    pub fn needs_discovery(&self) -> bool {
        self.frame_count == 0
    }
}

impl Default for SubjectInfo {
    fn default() -> Self {
        SubjectInfo::new(SubjectId::NONE, "", DEFAULT_WEIGHT)
    }
}
