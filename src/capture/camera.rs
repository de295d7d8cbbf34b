//! Camera handles and the providers that open them.
//!
//! A [`ProviderFactory`] asynchronously yields a [`CameraProvider`], which in
//! turn opens [`Camera`] handles. Real hardware, still images and mock
//! implementations all sit behind these traits.

use super::{CaptureConfig, Frame, FrameImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Clone, Error)]
pub enum CameraError {
    /// The requested device or file does not exist.
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    /// No camera backend could be obtained.
    #[error("camera provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// The device exists but could not be opened.
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    /// The capture configuration was rejected.
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    /// A single frame could not be read.
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    /// A finite source has no more frames.
    #[error("camera stream ended")]
    EndOfStream,
    /// The camera was used before `open`.
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
///
/// Handles are created and used on the capture thread only, so they
/// need not be `Send`.
pub trait Camera {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Captures a single frame.
    ///
    /// Returns [`CameraError::EndOfStream`] once a finite source is exhausted.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

/// A handle to the camera subsystem, able to open camera instances.
pub trait CameraProvider: Send + Sync {
    /// Creates an unopened camera for the given configuration.
    fn create_camera(&self, config: &CaptureConfig) -> Result<Box<dyn Camera>, CameraError>;
}

/// Acquires a camera provider. Called on a background thread.
pub trait ProviderFactory: Send + Sync {
    /// Blocks until the provider is available or acquisition fails.
    fn acquire(&self) -> Result<Arc<dyn CameraProvider>, CameraError>;
}

impl<F> ProviderFactory for F
where
    F: Fn() -> Result<Arc<dyn CameraProvider>, CameraError> + Send + Sync,
{
    fn acquire(&self) -> Result<Arc<dyn CameraProvider>, CameraError> {
        self()
    }
}

/// Returns a factory that always yields `provider`.
pub fn ready_provider(provider: Arc<dyn CameraProvider>) -> Arc<dyn ProviderFactory> {
    Arc::new(move || -> Result<Arc<dyn CameraProvider>, CameraError> {
        Ok(Arc::clone(&provider))
    })
}

/// Returns a factory whose acquisition always fails.
pub fn unavailable_provider(reason: impl Into<String>) -> Arc<dyn ProviderFactory> {
    let reason = reason.into();
    Arc::new(move || -> Result<Arc<dyn CameraProvider>, CameraError> {
        Err(CameraError::ProviderUnavailable(reason.clone()))
    })
}

/// One scripted capture of a [`MockCamera`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFrame {
    /// A frame with a synthetic image.
    Pattern,
    /// A malformed frame carrying no image.
    NoImage,
}

/// Camera stand-in producing synthetic luma frames.
///
/// Without a script it produces pattern frames forever; with a script it
/// replays the script and then reports end of stream.
#[derive(Debug, Default)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
    script: Option<VecDeque<ScriptedFrame>>,
    live: Option<Arc<AtomicUsize>>,
}

impl MockCamera {
    /// Creates a camera producing pattern frames until closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a camera that replays `script` and then ends.
    pub fn scripted(script: impl IntoIterator<Item = ScriptedFrame>) -> Self {
        Self {
            config: None,
            sequence: 0,
            script: Some(script.into_iter().collect()),
            live: None,
        }
    }

    /// Tracks the number of open cameras in `live`.
    fn tracking(mut self, live: Arc<AtomicUsize>) -> Self {
        self.live = Some(live);
        self
    }

    fn pattern(&self, config: &CaptureConfig) -> FrameImage {
        let pixels: Vec<u8> = (0..config.pixel_count())
            .map(|i| ((i as u64 ^ self.sequence) % 256) as u8)
            .collect();
        FrameImage::new(pixels, config.width, config.height)
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        if self.config.is_none() {
            if let Some(live) = &self.live {
                live.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.config = Some(config.clone());
        self.sequence = 0;
        tracing::debug!(
            width = config.width,
            height = config.height,
            scripted = self.script.is_some(),
            "Mock camera opened"
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        let shot = match self.script.as_mut() {
            Some(script) => script.pop_front().ok_or(CameraError::EndOfStream)?,
            None => ScriptedFrame::Pattern,
        };

        self.sequence += 1;
        Ok(match shot {
            ScriptedFrame::Pattern => {
                Frame::new(self.pattern(config), config.rotation_degrees, self.sequence)
            }
            ScriptedFrame::NoImage => Frame::without_image(self.sequence),
        })
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        if self.config.take().is_some() {
            if let Some(live) = &self.live {
                live.fetch_sub(1, Ordering::SeqCst);
            }
            tracing::debug!(frames = self.sequence, "Mock camera closed");
        }
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        self.close();
    }
}

/// Provider of [`MockCamera`]s that counts how many are open.
#[derive(Debug, Default)]
pub struct MockProvider {
    script: Option<Vec<ScriptedFrame>>,
    live: Arc<AtomicUsize>,
    created: AtomicUsize,
}

impl MockProvider {
    /// Provider of endless pattern cameras.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose cameras replay `script` and then end.
    pub fn scripted(script: impl IntoIterator<Item = ScriptedFrame>) -> Self {
        Self {
            script: Some(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Number of cameras currently open.
    pub fn open_cameras(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Number of cameras created over the provider's lifetime.
    pub fn created_cameras(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl CameraProvider for MockProvider {
    fn create_camera(&self, _config: &CaptureConfig) -> Result<Box<dyn Camera>, CameraError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let camera = match &self.script {
            Some(script) => MockCamera::scripted(script.iter().copied()),
            None => MockCamera::new(),
        };
        Ok(Box::new(camera.tracking(Arc::clone(&self.live))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_lifecycle() {
        let mut camera = MockCamera::new();
        let config = CaptureConfig::default();

        assert!(!camera.is_open());

        camera.open(&config).unwrap();
        assert!(camera.is_open());

        let frame = camera.capture().unwrap();
        assert!(frame.image().unwrap().is_valid());
        assert_eq!(frame.sequence(), 1);

        let frame2 = camera.capture().unwrap();
        assert_eq!(frame2.sequence(), 2);

        camera.close();
        assert!(!camera.is_open());
    }

    #[test]
    fn test_pattern_fills_non_square_frame() {
        let mut camera = MockCamera::new();
        camera.open(&CaptureConfig::with_dimensions(7, 3)).unwrap();

        let frame = camera.capture().unwrap();
        let image = frame.image().unwrap();
        assert_eq!(image.pixels().len(), 21);
        assert_eq!(image.pixel_count(), 21);
    }

    #[test]
    fn test_capture_without_open() {
        let mut camera = MockCamera::new();
        assert!(matches!(
            camera.capture(),
            Err(CameraError::NotInitialized)
        ));
    }

    #[test]
    fn test_scripted_camera_ends() {
        let mut camera = MockCamera::scripted([ScriptedFrame::NoImage, ScriptedFrame::Pattern]);
        camera.open(&CaptureConfig::with_dimensions(8, 8)).unwrap();

        assert!(camera.capture().unwrap().image().is_none());
        assert!(camera.capture().unwrap().image().is_some());
        assert!(matches!(camera.capture(), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn test_provider_tracks_open_cameras() {
        let provider = MockProvider::new();
        let mut camera = provider.create_camera(&CaptureConfig::default()).unwrap();
        assert_eq!(provider.open_cameras(), 0);

        camera.open(&CaptureConfig::default()).unwrap();
        assert_eq!(provider.open_cameras(), 1);

        drop(camera);
        assert_eq!(provider.open_cameras(), 0);
        assert_eq!(provider.created_cameras(), 1);
    }

    #[test]
    fn test_factories() {
        let provider: Arc<dyn CameraProvider> = Arc::new(MockProvider::new());
        assert!(ready_provider(provider).acquire().is_ok());
        assert!(matches!(
            unavailable_provider("no backend").acquire(),
            Err(CameraError::ProviderUnavailable(_))
        ));
    }
}
