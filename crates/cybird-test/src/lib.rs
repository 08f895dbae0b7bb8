//! Cybird Test - Harness for end-to-end playback testing
//!
//! This crate provides:
//! - In-memory card fixtures, including corrupted frame files
//! - Fault-injecting storage and a counting yielder
//! - A playback rig driven by a virtual clock
//! - End-to-end scenarios across store, controller and coordinator

pub mod card;
pub mod faults;
pub mod integration;
pub mod rig;

pub use card::*;
pub use faults::*;
pub use rig::*;
