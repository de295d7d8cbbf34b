//! Captured frames and the release contract of analysis frames.

use std::time::Instant;

/// Callback invoked exactly once when a frame is released.
///
/// Receives the sequence number of the released frame.
pub type ReleaseHook = Box<dyn FnOnce(u64) + Send>;

/// Luma image payload of a frame.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameImage {
    /// Grayscale pixel data, one byte per pixel, row-major.
    pixels: Vec<u8>,
    /// Image width in pixels.
    width: u32,
    /// Image height in pixels.
    height: u32,
}

impl FrameImage {
    /// Creates an image from grayscale pixels.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Converts packed RGB pixels (3 bytes per pixel) to a luma image.
    pub fn from_rgb(rgb: &[u8], width: u32, height: u32) -> Self {
        let pixels = rgb
            .chunks_exact(3)
            .map(|px| {
                // ITU-R BT.601 luma weights
                let y = 299 * u32::from(px[0]) + 587 * u32::from(px[1]) + 114 * u32::from(px[2]);
                (y / 1000) as u8
            })
            .collect();
        Self::new(pixels, width, height)
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the image width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the image height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixel_count() > 0 && self.pixels.len() == self.pixel_count()
    }
}

impl std::fmt::Debug for FrameImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// A single captured frame from the camera.
///
/// A frame may arrive without an image payload (a malformed buffer).
/// Every frame handed to the analysis stream carries a release hook that
/// fires exactly once: either through [`Frame::release`] or, if the frame
/// is dropped unreleased, from `Drop`.
pub struct Frame {
    /// Image payload, absent for malformed buffers.
    image: Option<FrameImage>,
    /// Clockwise rotation needed to display the image upright.
    rotation_degrees: u16,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number.
    sequence: u64,
    /// Fires once on release.
    release_hook: Option<ReleaseHook>,
}

impl Frame {
    /// Creates a new frame with an image payload.
    pub fn new(image: FrameImage, rotation_degrees: u16, sequence: u64) -> Self {
        Self {
            image: Some(image),
            rotation_degrees,
            timestamp: Instant::now(),
            sequence,
            release_hook: None,
        }
    }

    /// Creates a frame whose buffer carries no image.
    pub fn without_image(sequence: u64) -> Self {
        Self {
            image: None,
            rotation_degrees: 0,
            timestamp: Instant::now(),
            sequence,
            release_hook: None,
        }
    }

    /// Attaches the hook fired when this frame is released.
    ///
    /// Replaces any previously attached hook without firing it.
    pub fn with_release_hook(mut self, hook: ReleaseHook) -> Self {
        self.release_hook = Some(hook);
        self
    }

    /// Returns the image payload, if any.
    pub fn image(&self) -> Option<&FrameImage> {
        self.image.as_ref()
    }

    /// Moves the image payload out of the frame.
    pub fn take_image(&mut self) -> Option<FrameImage> {
        self.image.take()
    }

    /// Returns the rotation metadata in degrees.
    #[inline]
    pub fn rotation_degrees(&self) -> u16 {
        self.rotation_degrees
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Releases the frame buffer back to the producer.
    pub fn release(mut self) {
        self.fire_release();
    }

    fn fire_release(&mut self) {
        if let Some(hook) = self.release_hook.take() {
            tracing::trace!(sequence = self.sequence, "Frame released");
            hook(self.sequence);
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.fire_release();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("image", &self.image)
            .field("rotation_degrees", &self.rotation_degrees)
            .field("sequence", &self.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_hook(counter: &Arc<AtomicUsize>) -> ReleaseHook {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(FrameImage::new(vec![0u8; 640 * 480], 640, 480), 90, 1);

        assert_eq!(frame.rotation_degrees(), 90);
        assert_eq!(frame.sequence(), 1);
        assert!(frame.image().unwrap().is_valid());
    }

    #[test]
    fn test_image_invalid_size() {
        let image = FrameImage::new(vec![0u8; 100], 640, 480);
        assert!(!image.is_valid());
    }

    #[test]
    fn test_rgb_to_luma() {
        let image = FrameImage::from_rgb(&[255, 255, 255, 0, 0, 0], 2, 1);
        assert_eq!(image.pixels(), &[255, 0]);
    }

    #[test]
    fn test_explicit_release_fires_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let frame = Frame::without_image(3).with_release_hook(counting_hook(&released));

        frame.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_unreleased_frame() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let _frame = Frame::without_image(4).with_release_hook(counting_hook(&released));
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
