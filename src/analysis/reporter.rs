//! First-match-wins result reporting.

use crate::decode::Barcode;
use crate::metrics::ScanMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Commits at most one decoded value per screen lifetime.
///
/// Candidates without a payload are skipped. The first non-empty payload
/// is forwarded to the accept callback; every later one, from the same
/// frame or a later frame, is ignored.
pub struct ResultReporter {
    accepted: AtomicBool,
    on_accept: Box<dyn Fn(String) + Send + Sync>,
    metrics: Arc<ScanMetrics>,
}

impl ResultReporter {
    /// Creates a reporter forwarding the accepted value to `on_accept`.
    pub fn new<F>(metrics: Arc<ScanMetrics>, on_accept: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        Self {
            accepted: AtomicBool::new(false),
            on_accept: Box::new(on_accept),
            metrics,
        }
    }

    /// Reports the candidates decoded from one frame.
    ///
    /// Returns true if this call committed the result.
    pub fn report(&self, candidates: &[Barcode]) -> bool {
        let Some(value) = candidates
            .iter()
            .filter_map(|c| c.raw_value.as_deref())
            .find(|v| !v.is_empty())
        else {
            tracing::trace!(candidates = candidates.len(), "No readable candidate");
            return false;
        };

        if self.accepted.swap(true, Ordering::AcqRel) {
            tracing::debug!("Result already accepted, ignoring later decode");
            return false;
        }

        self.metrics.code_reported();
        tracing::info!(value = %value, "QR code accepted");
        (self.on_accept)(value.to_owned());
        true
    }

    /// Returns true once a value has been accepted.
    pub fn has_accepted(&self) -> bool {
        self.accepted.load(Ordering::Acquire)
    }
}
