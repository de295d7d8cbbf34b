//! Capture and scan configuration.
//!
//! Settings come from a TOML file and are then overridden by command-line
//! flags. Both halves are validated before a scan starts.

use crate::session::Backpressure;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for camera capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index.
    pub device_id: u32,
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Clockwise rotation of the sensor relative to upright (0, 90, 180, 270).
    pub rotation_degrees: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            fps: 30,
            rotation_degrees: 0,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Number of pixels in a frame of the configured size.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Interval between frames at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if !matches!(self.rotation_degrees, 0 | 90 | 180 | 270) {
            return Err(ConfigError::InvalidRotation(self.rotation_degrees));
        }
        Ok(())
    }
}

/// Scan behaviour configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Backpressure policy of the analysis stream.
    pub backpressure: Backpressure,
    /// Frames larger than this are downscaled before decoding.
    pub max_dimension: u32,
    /// Give up after this many seconds (0 waits forever).
    pub timeout_secs: u64,
    /// Treat camera access as already granted.
    pub assume_permission: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            backpressure: Backpressure::KeepOnlyLatest,
            max_dimension: 1280,
            timeout_secs: 0,
            assume_permission: false,
        }
    }
}

impl ScanConfig {
    /// Returns the scan timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dimension < 64 {
            return Err(ConfigError::InvalidMaxDimension(self.max_dimension));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Frame rate outside 1-120 fps.
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    /// Rotation is not a multiple of 90 below 360.
    #[error("invalid rotation {0} (must be 0, 90, 180 or 270)")]
    InvalidRotation(u16),
    /// Decoder size limit below 64 pixels.
    #[error("invalid max dimension {0} (must be at least 64)")]
    InvalidMaxDimension(u32),
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The configuration file is not valid TOML.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Camera settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Scan behaviour settings.
    #[serde(default)]
    pub scan: ScanConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates both configuration sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.scan.validate()
    }
}
