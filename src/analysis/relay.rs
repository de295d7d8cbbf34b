//! Hand-off of analyzed frames to the decoder.

use super::ResultReporter;
use crate::capture::Frame;
use crate::decode::{Decoder, InputImage};
use crate::metrics::ScanMetrics;
use std::sync::Arc;

/// Forwards frames to the decoder and releases each exactly once.
///
/// Runs on the analysis worker. A frame without an image is released
/// immediately; otherwise it is released when the decode request
/// completes, whatever its outcome.
pub struct FrameRelay {
    decoder: Arc<dyn Decoder>,
    reporter: Arc<ResultReporter>,
    metrics: Arc<ScanMetrics>,
}

impl FrameRelay {
    /// Creates a relay submitting frames to `decoder` and results to `reporter`.
    pub fn new(
        decoder: Arc<dyn Decoder>,
        reporter: Arc<ResultReporter>,
        metrics: Arc<ScanMetrics>,
    ) -> Self {
        Self {
            decoder,
            reporter,
            metrics,
        }
    }

    /// Processes one analyzed frame.
    pub fn on_frame(&self, mut frame: Frame) {
        let Some(image) = frame.take_image() else {
            self.metrics.frame_malformed();
            tracing::trace!(sequence = frame.sequence(), "Frame without image, skipping");
            frame.release();
            return;
        };

        let input = InputImage::from_frame_image(image, frame.rotation_degrees());
        let reporter = Arc::clone(&self.reporter);
        let metrics = Arc::clone(&self.metrics);

        self.metrics.decode_requested();
        self.decoder.process(
            input,
            Box::new(move |outcome| {
                match outcome {
                    Ok(barcodes) => {
                        reporter.report(&barcodes);
                    }
                    Err(e) => {
                        metrics.decode_failed();
                        tracing::warn!(sequence = frame.sequence(), error = %e, "Barcode decoding failed");
                    }
                }
                frame.release();
            }),
        );
    }
}
