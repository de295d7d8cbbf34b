//! Camera permission negotiation.
//!
//! Access is either already granted, or requested once with a fixed
//! correlation token. The answer arrives asynchronously and is final for
//! the lifetime of the screen.

mod device;
mod fixed;

pub use device::DevicePermissions;
pub use fixed::StaticPermissions;

use std::sync::atomic::{AtomicU8, Ordering};

/// Correlation token carried by the camera permission request.
pub const CAMERA_PERMISSION_REQUEST: u32 = 1001;

/// Callback receiving the answer to a permission request.
pub type PermissionCallback = Box<dyn FnOnce(PermissionResponse) + Send>;

/// Answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionResponse {
    /// Token of the request being answered.
    pub request_code: u32,
    /// Whether camera access was granted.
    pub granted: bool,
}

/// Source of camera access decisions.
pub trait PermissionGate: Send + Sync {
    /// Returns true if camera access is already granted.
    fn has_camera_access(&self) -> bool;

    /// Asks for camera access. `callback` runs once with the answer,
    /// possibly on another thread.
    fn request_camera_access(&self, request_code: u32, callback: PermissionCallback);
}

/// Outcome of permission negotiation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionState {
    /// No decision yet.
    #[default]
    Unknown,
    /// Camera access was granted.
    Granted,
    /// Camera access was refused.
    Denied,
}

/// A [`PermissionState`] that can be decided once and never reverts.
#[derive(Debug, Default)]
pub struct PermissionCell(AtomicU8);

impl PermissionCell {
    const UNKNOWN: u8 = 0;
    const GRANTED: u8 = 1;
    const DENIED: u8 = 2;

    /// Creates an undecided cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the decision. Returns false if one was already recorded.
    pub fn decide(&self, granted: bool) -> bool {
        let value = if granted { Self::GRANTED } else { Self::DENIED };
        self.0
            .compare_exchange(Self::UNKNOWN, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns the current decision.
    pub fn get(&self) -> PermissionState {
        match self.0.load(Ordering::Acquire) {
            Self::GRANTED => PermissionState::Granted,
            Self::DENIED => PermissionState::Denied,
            _ => PermissionState::Unknown,
        }
    }
}
