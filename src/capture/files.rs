//! Still-image camera source.
//!
//! Replays image files as camera frames, one per frame interval, and
//! ends the stream after the last file.

use super::{Camera, CameraError, CameraProvider, CaptureConfig, Frame, FrameImage};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Provider of cameras that read frames from image files.
#[derive(Debug, Clone)]
pub struct ImageFileProvider {
    paths: Vec<PathBuf>,
}

impl ImageFileProvider {
    /// Creates a provider over the given files, in order.
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

impl CameraProvider for ImageFileProvider {
    fn create_camera(&self, _config: &CaptureConfig) -> Result<Box<dyn Camera>, CameraError> {
        if self.paths.is_empty() {
            return Err(CameraError::DeviceNotFound("no image files given".into()));
        }
        Ok(Box::new(ImageFileCamera::new(self.paths.clone())))
    }
}

/// Camera that yields one frame per image file.
#[derive(Debug)]
pub struct ImageFileCamera {
    paths: Vec<PathBuf>,
    next: usize,
    rotation_degrees: u16,
    interval: Duration,
    last_capture: Option<Instant>,
    open: bool,
}

impl ImageFileCamera {
    /// Creates a closed camera over `paths`, read in order.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            next: 0,
            rotation_degrees: 0,
            interval: Duration::ZERO,
            last_capture: None,
            open: false,
        }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_capture {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_capture = Some(Instant::now());
    }
}

impl Camera for ImageFileCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        if let Some(missing) = self.paths.iter().find(|p| !p.is_file()) {
            return Err(CameraError::DeviceNotFound(missing.display().to_string()));
        }
        self.rotation_degrees = config.rotation_degrees;
        self.interval = config.frame_interval();
        self.next = 0;
        self.last_capture = None;
        self.open = true;
        tracing::info!(files = self.paths.len(), "Image file source opened");
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        let path = self.paths.get(self.next).ok_or(CameraError::EndOfStream)?.clone();
        self.next += 1;
        self.pace();

        let luma = image::open(&path)
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {}", path.display(), e)))?
            .to_luma8();
        let (width, height) = luma.dimensions();

        tracing::debug!(path = %path.display(), width, height, "Loaded image frame");
        Ok(Frame::new(
            FrameImage::new(luma.into_raw(), width, height),
            self.rotation_degrees,
            self.next as u64,
        ))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_png(name: &str, width: u32, height: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("qr-scan-{}-{}.png", std::process::id(), name));
        image::GrayImage::from_pixel(width, height, image::Luma([200u8]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_replays_files_then_ends() {
        let a = temp_png("a", 4, 3);
        let b = temp_png("b", 2, 2);
        let provider = ImageFileProvider::new([a.clone(), b.clone()]);
        let mut camera = provider.create_camera(&CaptureConfig::default()).unwrap();
        camera.open(&CaptureConfig::default()).unwrap();

        let first = camera.capture().unwrap();
        let image = first.image().unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
        assert!(image.pixels().iter().all(|&p| p == 200));
        assert_eq!(camera.capture().unwrap().sequence(), 2);
        assert!(matches!(camera.capture(), Err(CameraError::EndOfStream)));

        let _ = std::fs::remove_file(a);
        let _ = std::fs::remove_file(b);
    }

    #[test]
    fn test_missing_file_fails_open() {
        let mut camera = ImageFileCamera::new(vec![PathBuf::from("/nonexistent/qr.png")]);
        assert!(matches!(
            camera.open(&CaptureConfig::default()),
            Err(CameraError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_empty_provider_rejected() {
        let provider = ImageFileProvider::new(Vec::new());
        assert!(provider.create_camera(&CaptureConfig::default()).is_err());
    }
}
