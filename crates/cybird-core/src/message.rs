//! Cross-context messages
//!
//! Messages travel one way over the bounded render/worker queues and are
//! consumed exactly once.

use crate::SubjectId;

/// What caused a trigger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TriggerKind {
    /// Startup or timed trigger
    #[default]
    Auto = 0,
    /// Explicit command
    Manual = 1,
    /// Sensor gesture
    Gesture = 2,
}

/// Request to start (or replace) the current animation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerRequest {
    /// Subject to play, `None` selects one at random
    pub target: Option<SubjectId>,
    /// Whether the sighting is counted in statistics
    pub record_stats: bool,
    pub kind: TriggerKind,
}

impl TriggerRequest {
    /// Random subject, counted
    pub fn random(kind: TriggerKind) -> Self {
        TriggerRequest {
            target: None,
            record_stats: true,
            kind,
        }
    }

    /// Specific subject, counted
    pub fn subject(id: SubjectId, kind: TriggerKind) -> Self {
        TriggerRequest {
            target: Some(id),
            record_stats: true,
            kind,
        }
    }

    /// Specific subject, not counted
    pub fn preview(id: SubjectId) -> Self {
        TriggerRequest {
            target: Some(id),
            record_stats: false,
            kind: TriggerKind::Manual,
        }
    }
}

/// Discrete gesture tags emitted by the motion sensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gesture {
    ForwardTilt = 1,
    BackwardTilt = 2,
    Shake = 3,
    DoubleTilt = 4,
    LeftRightTilt = 5,
    ForwardHold = 6,
    BackwardHold = 7,
    LeftTilt = 8,
    RightTilt = 9,
}

impl Gesture {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Gesture::ForwardTilt),
            2 => Some(Gesture::BackwardTilt),
            3 => Some(Gesture::Shake),
            4 => Some(Gesture::DoubleTilt),
            5 => Some(Gesture::LeftRightTilt),
            6 => Some(Gesture::ForwardHold),
            7 => Some(Gesture::BackwardHold),
            8 => Some(Gesture::LeftTilt),
            9 => Some(Gesture::RightTilt),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Message carried on the cross-context queues
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskMessage {
    /// Start or replace the current animation
    Trigger(TriggerRequest),
    /// Log sighting statistics
    ShowStats,
    /// A gesture reported by a sensor source
    Gesture(Gesture),
    /// Stop the current animation and clear the screen
    StopPlayback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_byte_roundtrip() {
        for b in 1..=9u8 {
            let g = Gesture::from_byte(b).unwrap();
            assert_eq!(g.to_byte(), b);
        }
        assert_eq!(Gesture::from_byte(0), None);
        assert_eq!(Gesture::from_byte(10), None);
    }

    #[test]
    fn test_preview_is_not_recorded() {
        let req = TriggerRequest::preview(SubjectId::new(1002));
        assert!(!req.record_stats);
        assert_eq!(req.target, Some(SubjectId::new(1002)));
    }
}
