//! Rendering sink
//!
//! The panel flush pipeline lives outside the engine. The controller only
//! hands it a decoded frame or a solid fill plus the area to draw into.

use std::sync::Arc;

use cybird_format::{FrameDescriptor, Rgb565};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Drawing area in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u16,
    pub height: u16,
}

impl Extent {
    pub const fn new(width: u16, height: u16) -> Self {
        Extent { width, height }
    }
}

/// Consumer of displayable content
pub trait RenderSink: Send {
    /// Draw a decoded frame scaled into `extent`
    fn show(&mut self, frame: &FrameDescriptor, extent: Extent);

    /// Draw a solid placeholder with a border
    fn fill(&mut self, color: Rgb565, border: Rgb565, extent: Extent);

    /// Remove whatever is on screen
    fn clear(&mut self);
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn show(&mut self, _frame: &FrameDescriptor, _extent: Extent) {}

    fn fill(&mut self, _color: Rgb565, _border: Rgb565, _extent: Extent) {}

    fn clear(&mut self) {}
}

/// One recorded sink call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkCall {
    Show {
        width: u16,
        height: u16,
        data_size: u32,
        first_pixel: Option<Rgb565>,
        extent: Extent,
    },
    Fill {
        color: Rgb565,
        border: Rgb565,
        extent: Extent,
    },
    Clear,
}

/// Keeps a log of every call, for tests and simulators.
///
/// Clones share one log, so a test can keep a handle while the engine owns
/// the sink.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn last(&self) -> Option<SinkCall> {
        self.calls.lock().last().cloned()
    }

    pub fn take(&self) -> Vec<SinkCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Number of placeholder fills so far
    pub fn fill_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SinkCall::Fill { .. }))
            .count()
    }

    /// Number of real frames shown so far
    pub fn show_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SinkCall::Show { .. }))
            .count()
    }
}

impl RenderSink for RecordingSink {
    fn show(&mut self, frame: &FrameDescriptor, extent: Extent) {
        self.calls.lock().push(SinkCall::Show {
            width: frame.width(),
            height: frame.height(),
            data_size: frame.data_size(),
            first_pixel: frame.pixel_at(0, 0),
            extent,
        });
    }

    fn fill(&mut self, color: Rgb565, border: Rgb565, extent: Extent) {
        self.calls.lock().push(SinkCall::Fill {
            color,
            border,
            extent,
        });
    }

    fn clear(&mut self) {
        self.calls.lock().push(SinkCall::Clear);
    }
}
