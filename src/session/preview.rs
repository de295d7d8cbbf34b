//! Preview surfaces receiving every captured frame.

use crate::capture::Frame;
use std::sync::atomic::{AtomicU64, Ordering};

/// Visible output bound alongside the analysis stream.
///
/// Called on the capture thread for every frame, before the frame is
/// offered to the analyzer. Must not block.
pub trait PreviewSurface: Send + Sync {
    /// Displays the frame.
    fn render(&self, frame: &Frame);
}

/// Preview that reports frames through tracing.
#[derive(Debug, Default)]
pub struct LogPreview {
    rendered: AtomicU64,
}

impl LogPreview {
    /// Creates a preview that has rendered nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames rendered so far.
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }
}

impl PreviewSurface for LogPreview {
    fn render(&self, frame: &Frame) {
        let count = self.rendered.fetch_add(1, Ordering::Relaxed) + 1;
        match frame.image() {
            Some(image) if count == 1 => tracing::info!(
                width = image.width(),
                height = image.height(),
                rotation = frame.rotation_degrees(),
                "Preview started"
            ),
            Some(_) => tracing::trace!(sequence = frame.sequence(), "Preview frame"),
            None => tracing::trace!(sequence = frame.sequence(), "Preview frame without image"),
        }
    }
}

/// Preview that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPreview;

impl PreviewSurface for NullPreview {
    fn render(&self, _frame: &Frame) {}
}
