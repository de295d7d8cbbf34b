//! Permission gate with predetermined answers.

use super::{PermissionCallback, PermissionGate, PermissionResponse};
use std::sync::{Mutex, PoisonError};

/// Gate that answers from fixed values and records requests.
#[derive(Debug)]
pub struct StaticPermissions {
    pre_granted: bool,
    grant_on_request: bool,
    requests: Mutex<Vec<u32>>,
}

impl StaticPermissions {
    /// Access already granted; no request will be needed.
    pub fn granted() -> Self {
        Self::new(true, true)
    }

    /// Access not granted; a request will be answered with `grant`.
    pub fn on_request(grant: bool) -> Self {
        Self::new(false, grant)
    }

    fn new(pre_granted: bool, grant_on_request: bool) -> Self {
        Self {
            pre_granted,
            grant_on_request,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Request codes received so far.
    pub fn requests(&self) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PermissionGate for StaticPermissions {
    fn has_camera_access(&self) -> bool {
        self.pre_granted
    }

    fn request_camera_access(&self, request_code: u32, callback: PermissionCallback) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request_code);
        callback(PermissionResponse {
            request_code,
            granted: self.grant_on_request,
        });
    }
}
