//! Prometheus counters for the scan pipeline.
//!
//! # Metrics Exposed
//!
//! - `qr_scan_frames_captured_total` - Frames produced by the camera
//! - `qr_scan_frames_dropped_total` - Frames discarded by backpressure
//! - `qr_scan_frames_malformed_total` - Analyzed frames without an image
//! - `qr_scan_decode_requests_total` - Decode requests submitted
//! - `qr_scan_decode_failures_total` - Decode requests that failed
//! - `qr_scan_frames_released_total` - Analyzed frames released
//! - `qr_scan_codes_reported_total` - Values reported to the caller
//!
//! # Example
//!
//! ```
//! use qr_scan::metrics::ScanMetrics;
//!
//! let metrics = ScanMetrics::new().expect("Failed to create registry");
//! metrics.frame_captured();
//!
//! assert_eq!(metrics.snapshot().frames_captured, 1);
//! ```

mod collector;

pub use collector::{MetricsError, MetricsSnapshot, ScanMetrics};
