//! Identity types for Cybird
//!
//! Subjects are addressed by a 16-bit id that doubles as the name of their
//! frame directory on the card.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of entries in the placeholder palette.
pub const PALETTE_SIZE: u8 = 8;

/// Subject identity - one animated creature with its own frame directory
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u16);

impl SubjectId {
    /// The "no subject" id. Never valid for playback.
    pub const NONE: SubjectId = SubjectId(0);

    #[inline]
    pub fn new(id: u16) -> Self {
        SubjectId(id)
    }

    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Index into the placeholder palette (`id mod 8`)
    #[inline]
    pub fn palette_index(self) -> u8 {
        (self.0 % PALETTE_SIZE as u16) as u8
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subject({})", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for SubjectId {
    fn from(id: u16) -> Self {
        SubjectId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_invalid() {
        assert!(!SubjectId::NONE.is_valid());
        assert!(SubjectId::new(1001).is_valid());
    }

    #[test]
    fn test_palette_index_wraps() {
        assert_eq!(SubjectId::new(1001).palette_index(), 1);
        assert_eq!(SubjectId::new(1008).palette_index(), 0);
        assert_eq!(SubjectId::new(7).palette_index(), 7);
    }

    #[test]
    fn test_display_is_directory_name() {
        assert_eq!(SubjectId::new(1002).to_string(), "1002");
    }
}
