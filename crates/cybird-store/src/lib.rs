//! Cybird Store - Streaming frames off the card
//!
//! This crate implements the storage side of the engine:
//! - Storage backends (directory tree, in-memory card)
//! - Paced, chunked payload reads
//! - Frame validation and decoding
//! - Frame-count discovery

pub mod discovery;
pub mod pacing;
pub mod storage;
pub mod store;

pub use discovery::*;
pub use pacing::*;
pub use storage::*;
pub use store::*;
