//! Camera session management.
//!
//! Binds a preview surface and a single-frame analysis stream to one
//! camera, and runs the dedicated worker that feeds analyzed frames to
//! the frame relay.
//!
//! ```text
//! capture thread ──render──▶ preview
//!        │
//!        └──offer──▶ LatestSlot ──take──▶ analysis worker ──▶ FrameRelay
//! ```

mod executor;
mod manager;
mod preview;
mod slot;

pub use executor::AnalysisExecutor;
pub use manager::{CameraSession, ImageAnalysis, SessionError, SessionManager};
pub use preview::{LogPreview, NullPreview, PreviewSurface};
pub use slot::{Backpressure, LatestSlot, Offer};
