//! Cybird Frame Format - Binary sprite frames
//!
//! This crate implements the on-card frame format:
//! - Fixed little-endian header (24 bytes)
//! - Raw RGB565 payload (`width * height * 2` bytes)
//! - Owned frame descriptors backed by accounted pixel buffers
//! - The fixed placeholder palette

pub mod color;
pub mod frame;
pub mod header;

pub use color::*;
pub use frame::*;
pub use header::*;
