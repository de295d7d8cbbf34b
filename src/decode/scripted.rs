//! Decoder replaying scripted outcomes, for tests and demos.

use super::{Barcode, DecodeCallback, DecodeError, Decoder, InputImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Decoder that answers requests with a fixed sequence of outcomes.
///
/// Each request consumes the next outcome; once the script is exhausted
/// every request yields no candidates. Completions run on a separate
/// thread, like a real asynchronous engine.
#[derive(Debug, Default)]
pub struct ScriptedDecoder {
    outcomes: Mutex<VecDeque<Result<Vec<Barcode>, DecodeError>>>,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    /// Creates a decoder replaying `outcomes` in order.
    pub fn new(outcomes: impl IntoIterator<Item = Result<Vec<Barcode>, DecodeError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of decode requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for ScriptedDecoder {
    fn process(&self, image: InputImage, on_complete: DecodeCallback) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        tracing::trace!(
            width = image.image().width(),
            rotation = image.rotation_degrees(),
            "Scripted decode"
        );
        let spawned = thread::Builder::new()
            .name("scripted-decoder".into())
            .spawn(move || on_complete(outcome));
        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to spawn decoder completion");
        }
    }
}
