//! Error types for Cybird

use thiserror::Error;

use crate::SubjectId;

/// Frame decode failures.
///
/// None of these is fatal: callers answer them with a placeholder, an inline
/// retry on the next boundary, or by refusing to start playback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame file not found: subject {subject}, frame {frame}")]
    NotFound { subject: SubjectId, frame: u16 },

    #[error("Frame file truncated: {len} bytes")]
    Truncated { len: u64 },

    #[error("Bad magic byte: 0x{0:02x}")]
    BadMagic(u8),

    #[error("Unsupported color format: 0x{0:02x}")]
    BadFormat(u8),

    #[error("Data size mismatch: declared {declared}, expected {expected}")]
    SizeMismatch { declared: u32, expected: u64 },

    #[error("Insufficient memory: need {needed}, have {free}")]
    OutOfMemory { needed: usize, free: usize },

    #[error("Short read: got {read} of {expected} bytes")]
    ShortRead { read: usize, expected: usize },
}

/// Core Cybird errors
#[derive(Error, Debug)]
pub enum CybirdError {
    // Decode errors
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("First frame failed to decode: {0}")]
    FirstFrame(DecodeError),

    // Configuration errors
    #[error("Invalid subject id: {0}")]
    InvalidSubject(SubjectId),

    #[error("Subject not in registry: {0}")]
    UnknownSubject(SubjectId),

    #[error("Subject {0} has no frames")]
    EmptySubject(SubjectId),

    #[error("No subject loaded")]
    NotLoaded,

    #[error("Registry is empty")]
    EmptyRegistry,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Contention errors
    #[error("Resource lock timed out")]
    LockTimeout,

    #[error("Queue full")]
    QueueFull,

    #[error("Queue closed")]
    QueueClosed,

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to start context thread: {0}")]
    Spawn(std::io::Error),
}

impl CybirdError {
    /// Contention errors are skipped for one cycle and retried
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            CybirdError::LockTimeout | CybirdError::QueueFull
        )
    }

    /// Configuration errors turn the failed call into a no-op
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CybirdError::InvalidSubject(_)
                | CybirdError::UnknownSubject(_)
                | CybirdError::EmptySubject(_)
                | CybirdError::NotLoaded
                | CybirdError::EmptyRegistry
                | CybirdError::InvalidConfig(_)
        )
    }
}

/// Result type for Cybird operations
pub type CybirdResult<T> = Result<T, CybirdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_converts() {
        let err: CybirdError = DecodeError::BadMagic(0x12).into();
        assert!(matches!(err, CybirdError::Decode(DecodeError::BadMagic(0x12))));
        assert_eq!(err.to_string(), "Bad magic byte: 0x12");
    }

    #[test]
    fn test_error_classes() {
        assert!(CybirdError::LockTimeout.is_contention());
        assert!(CybirdError::EmptySubject(SubjectId::new(3)).is_configuration());
        assert!(!CybirdError::QueueClosed.is_contention());
    }
}
