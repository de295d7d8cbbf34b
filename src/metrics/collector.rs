//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Counter creation or registration failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A point-in-time copy of the scan counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Frames produced by the camera.
    pub frames_captured: u64,
    /// Frames discarded by the analysis backpressure policy.
    pub frames_dropped: u64,
    /// Analyzed frames that carried no image.
    pub frames_malformed: u64,
    /// Decode requests submitted to the decoder.
    pub decode_requests: u64,
    /// Decode requests that completed with an error.
    pub decode_failures: u64,
    /// Analyzed frames released back to the producer.
    pub frames_released: u64,
    /// Decoded values reported to the caller.
    pub codes_reported: u64,
}

/// Prometheus registry for scan pipeline counters.
///
/// Shared between the capture thread, the analysis worker and the
/// decoder's completion thread; all counters are atomic.
pub struct ScanMetrics {
    registry: Registry,
    frames_captured: IntCounter,
    frames_dropped: IntCounter,
    frames_malformed: IntCounter,
    decode_requests: IntCounter,
    decode_failures: IntCounter,
    frames_released: IntCounter,
    codes_reported: IntCounter,
}

impl ScanMetrics {
    /// Creates a new registry with all scan counters registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_captured = IntCounter::new(
            "qr_scan_frames_captured_total",
            "Frames produced by the camera",
        )?;
        let frames_dropped = IntCounter::new(
            "qr_scan_frames_dropped_total",
            "Frames discarded because the analyzer was busy",
        )?;
        let frames_malformed = IntCounter::new(
            "qr_scan_frames_malformed_total",
            "Analyzed frames that carried no image",
        )?;
        let decode_requests = IntCounter::new(
            "qr_scan_decode_requests_total",
            "Decode requests submitted to the decoder",
        )?;
        let decode_failures = IntCounter::new(
            "qr_scan_decode_failures_total",
            "Decode requests that completed with an error",
        )?;
        let frames_released = IntCounter::new(
            "qr_scan_frames_released_total",
            "Analyzed frames released back to the camera",
        )?;
        let codes_reported = IntCounter::new(
            "qr_scan_codes_reported_total",
            "Decoded values reported to the caller",
        )?;

        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(frames_malformed.clone()))?;
        registry.register(Box::new(decode_requests.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(frames_released.clone()))?;
        registry.register(Box::new(codes_reported.clone()))?;

        Ok(Self {
            registry,
            frames_captured,
            frames_dropped,
            frames_malformed,
            decode_requests,
            decode_failures,
            frames_released,
            codes_reported,
        })
    }

    /// Counts a frame produced by the camera.
    pub fn frame_captured(&self) {
        self.frames_captured.inc();
    }

    /// Counts a pending frame replaced by a newer one.
    pub fn frame_dropped(&self) {
        self.frames_dropped.inc();
    }

    /// Counts a frame delivered without an image.
    pub fn frame_malformed(&self) {
        self.frames_malformed.inc();
    }

    /// Counts a frame submitted to the decoder.
    pub fn decode_requested(&self) {
        self.decode_requests.inc();
    }

    /// Counts a decode request that completed with an error.
    pub fn decode_failed(&self) {
        self.decode_failures.inc();
    }

    /// Counts an analysis frame handed back to the camera.
    pub fn frame_released(&self) {
        self.frames_released.inc();
    }

    /// Counts the accepted scan result.
    pub fn code_reported(&self) {
        self.codes_reported.inc();
    }

    /// Reads the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.get(),
            frames_dropped: self.frames_dropped.get(),
            frames_malformed: self.frames_malformed.get(),
            decode_requests: self.decode_requests.get(),
            decode_failures: self.decode_failures.get(),
            frames_released: self.frames_released.get(),
            codes_reported: self.codes_reported.get(),
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for ScanMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ScanMetrics").field(&self.snapshot()).finish()
    }
}
