//! Barcode decoding.
//!
//! The decoder is an external engine seen through the [`Decoder`] trait:
//! it takes an image with its rotation and completes asynchronously with
//! zero or more [`Barcode`] candidates, or a failure.

mod qr;
mod scripted;

pub use qr::{decode_luma, QrDecoder};
pub use scripted::ScriptedDecoder;

use crate::capture::FrameImage;
use thiserror::Error;

/// Errors reported by a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The pixel buffer does not describe an image.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Rotation is not 0, 90, 180 or 270 degrees.
    #[error("unsupported rotation: {0} degrees")]
    UnsupportedRotation(u16),
    /// The decoder has been shut down.
    #[error("decoder unavailable")]
    Unavailable,
    /// The decoding engine reported a failure.
    #[error("decoder failed: {0}")]
    Engine(String),
}

/// Completion callback of a decode request.
pub type DecodeCallback = Box<dyn FnOnce(Result<Vec<Barcode>, DecodeError>) + Send>;

/// Image submitted for decoding.
#[derive(Debug, Clone)]
pub struct InputImage {
    image: FrameImage,
    rotation_degrees: u16,
}

impl InputImage {
    /// Wraps a frame image with its rotation metadata.
    pub fn from_frame_image(image: FrameImage, rotation_degrees: u16) -> Self {
        Self {
            image,
            rotation_degrees,
        }
    }

    /// Luma image to decode.
    pub fn image(&self) -> &FrameImage {
        &self.image
    }

    /// Clockwise rotation needed to make the image upright.
    pub fn rotation_degrees(&self) -> u16 {
        self.rotation_degrees
    }
}

/// One decoded candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barcode {
    /// Text payload; `None` when the symbol was located but not decoded.
    pub raw_value: Option<String>,
    /// Corner points in the upright image, if known.
    pub corners: Vec<(i32, i32)>,
}

impl Barcode {
    /// A candidate carrying `value`.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            raw_value: Some(value.into()),
            corners: Vec::new(),
        }
    }

    /// A candidate without a payload.
    pub fn unreadable() -> Self {
        Self {
            raw_value: None,
            corners: Vec::new(),
        }
    }
}

/// An asynchronous barcode decoder.
pub trait Decoder: Send + Sync {
    /// Submits `image` for decoding.
    ///
    /// `on_complete` is invoked exactly once, on a thread of the decoder's
    /// choosing.
    fn process(&self, image: InputImage, on_complete: DecodeCallback);
}
