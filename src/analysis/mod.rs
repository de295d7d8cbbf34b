//! Frame analysis and result reporting.
//!
//! The [`FrameRelay`] hands each analyzed frame to the decoder and
//! releases it once decoding completes; the [`ResultReporter`] commits the
//! first decoded value and forwards it to the screen.

mod relay;
mod reporter;

pub use relay::FrameRelay;
pub use reporter::ResultReporter;
