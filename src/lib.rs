//! QR Scan Library
//!
//! Opens a camera, streams frames through a QR decoder and returns the
//! first decoded value to the caller. The decoding itself is delegated to
//! `rqrr`, frame acquisition to `nokhwa` (feature `camera`) or to still
//! image files.
//!
//! # Architecture
//!
//! ```text
//! permission → session (capture → preview + analysis) → relay → decoder
//!                                                          ↓
//!                              screen ← reporter (first match wins)
//! ```
//!
//! # Threads
//!
//! - **UI thread**: the caller of [`ScanScreen::run`]; owns all screen state
//! - **capture thread**: one per bound session; never blocks on analysis
//!   under the default backpressure policy
//! - **analysis worker**: single thread, one frame in flight at a time
//! - **decoder thread**: completes decode requests asynchronously
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use qr_scan::{
//!     capture::{ready_provider, CaptureConfig, MockProvider, ScanConfig},
//!     decode::QrDecoder,
//!     metrics::ScanMetrics,
//!     permission::StaticPermissions,
//!     screen::{ConsoleNotifier, ScanScreen, ScreenDeps},
//!     session::LogPreview,
//! };
//!
//! let scan = ScanConfig::default();
//! let deps = ScreenDeps {
//!     permissions: Arc::new(StaticPermissions::granted()),
//!     provider: ready_provider(Arc::new(MockProvider::new())),
//!     decoder: Arc::new(QrDecoder::spawn(scan.max_dimension).unwrap()),
//!     preview: Arc::new(LogPreview::new()),
//!     notifier: Arc::new(ConsoleNotifier),
//!     metrics: Arc::new(ScanMetrics::new().unwrap()),
//! };
//!
//! let mut screen = ScanScreen::new(CaptureConfig::default(), scan, deps).unwrap();
//! let result = screen.run();
//! println!("{:?}", result.qr_result);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod capture;
pub mod decode;
pub mod metrics;
pub mod permission;
pub mod screen;
pub mod session;

// Re-export commonly used types at crate root
pub use capture::{Camera, CaptureConfig, FileConfig, Frame, MockCamera, ScanConfig};
pub use decode::{Barcode, Decoder, QrDecoder};
pub use permission::{PermissionGate, PermissionState};
pub use screen::{ResultCode, ScanResult, ScanScreen, ScreenDeps, ScreenState, QR_RESULT_KEY};
pub use session::Backpressure;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
