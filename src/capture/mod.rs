//! Camera input and frame handling.
//!
//! This module provides abstractions for acquiring a camera provider,
//! opening cameras and capturing frames. Frames come from hardware
//! (`camera` feature), still image files, or mock sources for tests.

mod camera;
mod config;
#[cfg(feature = "camera")]
mod device;
mod files;
mod frame;

pub use camera::{
    ready_provider, unavailable_provider, Camera, CameraError, CameraProvider, MockCamera,
    MockProvider, ProviderFactory, ScriptedFrame,
};
pub use config::{CaptureConfig, ConfigError, FileConfig, ScanConfig};
#[cfg(feature = "camera")]
pub use device::{list_devices, DeviceCamera, DeviceInfo, DeviceProvider};
pub use files::{ImageFileCamera, ImageFileProvider};
pub use frame::{Frame, FrameImage, ReleaseHook};
