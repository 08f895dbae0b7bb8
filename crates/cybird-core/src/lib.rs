//! Cybird Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every Cybird crate:
//! - Identifiers (SubjectId)
//! - Subject registry entries
//! - Cross-context task messages and gestures
//! - Heap accounting for frame buffers
//! - Error taxonomy

pub mod error;
pub mod heap;
pub mod id;
pub mod message;
pub mod subject;

pub use error::*;
pub use heap::*;
pub use id::*;
pub use message::*;
pub use subject::*;
