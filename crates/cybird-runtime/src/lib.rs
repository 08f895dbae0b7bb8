//! Cybird Runtime - Playback and coordination
//!
//! This crate implements the playback side of the engine:
//! - Adaptive prefetch policy and the double-buffer preloader
//! - Animation controller state machine and placeholder fallback
//! - Render/worker contexts, trigger coalescing, bounded mailboxes
//! - Subject registry, sighting statistics, configuration and logging setup

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod policy;
pub mod preloader;
pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;
pub mod stats;
pub mod telemetry;
pub mod timer;
pub mod trigger;

pub use config::*;
pub use controller::*;
pub use coordinator::*;
pub use policy::*;
pub use preloader::*;
pub use queue::*;
pub use registry::*;
pub use session::*;
pub use sink::*;
pub use stats::*;
pub use telemetry::*;
pub use timer::*;
pub use trigger::*;
