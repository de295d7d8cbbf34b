//! Caller-facing scan outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Key under which the decoded value is returned to the caller.
pub const QR_RESULT_KEY: &str = "qrResult";

/// Outcome flag of a finished screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// A value was scanned.
    Ok,
    /// The screen ended without a value.
    Canceled,
}

/// Why the screen terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// A value was decoded.
    Decoded,
    /// Camera access was refused.
    PermissionDenied,
    /// The camera provider or camera could not be obtained.
    ProviderUnavailable,
    /// The user cancelled the scan.
    Cancelled,
    /// No value was decoded before the timeout.
    TimedOut,
    /// A finite source ended without a decodable code.
    SourceExhausted,
}

/// Result delivered when a scan screen terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Outcome flag.
    pub code: ResultCode,
    /// Decoded value, set only on success.
    #[serde(rename = "qrResult", skip_serializing_if = "Option::is_none")]
    pub qr_result: Option<String>,
    /// Why the screen ended.
    pub reason: TerminationReason,
    /// When the screen ended.
    pub finished_at: DateTime<Utc>,
}

impl ScanResult {
    /// A successful outcome carrying `value`.
    pub fn success(value: impl Into<String>) -> Self {
        Self {
            code: ResultCode::Ok,
            qr_result: Some(value.into()),
            reason: TerminationReason::Decoded,
            finished_at: Utc::now(),
        }
    }

    /// A cancelled outcome without a value.
    pub fn canceled(reason: TerminationReason) -> Self {
        Self {
            code: ResultCode::Canceled,
            qr_result: None,
            reason,
            finished_at: Utc::now(),
        }
    }

    /// Returns true if a value was scanned.
    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Ok
    }

    /// Looks up a result field by key.
    pub fn extra(&self, key: &str) -> Option<&str> {
        (key == QR_RESULT_KEY)
            .then_some(self.qr_result.as_deref())
            .flatten()
    }
}
