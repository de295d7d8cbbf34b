//! Hardware camera source backed by nokhwa.

use super::{Camera, CameraError, CameraProvider, CaptureConfig, Frame, FrameImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};

/// Basic information about an attached camera.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device index as accepted by `capture.device_id`.
    pub index: String,
    /// Human readable device name.
    pub name: String,
}

/// Lists cameras known to the native backend.
pub fn list_devices() -> Result<Vec<DeviceInfo>, CameraError> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| CameraError::ProviderUnavailable(e.to_string()))?;
    Ok(cameras
        .into_iter()
        .map(|info| DeviceInfo {
            index: info.index().to_string(),
            name: info.human_name(),
        })
        .collect())
}

/// Provider of native cameras.
#[derive(Debug, Default)]
pub struct DeviceProvider;

impl DeviceProvider {
    /// Acquires the native camera backend.
    ///
    /// Fails when the platform exposes no camera at all.
    pub fn acquire() -> Result<Self, CameraError> {
        let devices = list_devices()?;
        if devices.is_empty() {
            return Err(CameraError::ProviderUnavailable("no cameras attached".into()));
        }
        tracing::info!(count = devices.len(), "Camera backend ready");
        Ok(Self)
    }
}

impl CameraProvider for DeviceProvider {
    fn create_camera(&self, _config: &CaptureConfig) -> Result<Box<dyn Camera>, CameraError> {
        Ok(Box::new(DeviceCamera::default()))
    }
}

/// Native camera capturing RGB frames converted to luma.
#[derive(Default)]
pub struct DeviceCamera {
    inner: Option<nokhwa::Camera>,
    rotation_degrees: u16,
    sequence: u64,
}

impl Camera for DeviceCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = nokhwa::Camera::new(CameraIndex::Index(config.device_id), requested)
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        tracing::info!(
            device = config.device_id,
            format = ?camera.camera_format(),
            "Camera stream opened"
        );

        self.inner = Some(camera);
        self.rotation_degrees = config.rotation_degrees;
        self.sequence = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let camera = self.inner.as_mut().ok_or(CameraError::NotInitialized)?;
        let buffer = camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        self.sequence += 1;
        // Undecodable buffers still count as frames, just without an image.
        let frame = match buffer.decode_image::<RgbFormat>() {
            Ok(rgb) => {
                let (width, height) = (rgb.width(), rgb.height());
                let image = FrameImage::from_rgb(&rgb.into_raw(), width, height);
                Frame::new(image, self.rotation_degrees, self.sequence)
            }
            Err(e) => {
                tracing::debug!(error = %e, sequence = self.sequence, "Failed to decode camera buffer");
                Frame::without_image(self.sequence)
            }
        };
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.inner.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!(error = %e, "Failed to stop camera stream");
            }
            tracing::info!("Camera closed");
        }
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        self.close();
    }
}
