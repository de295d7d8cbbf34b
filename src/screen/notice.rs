//! Transient user notices.

use std::sync::{Mutex, PoisonError};

/// How long a notice stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeDuration {
    /// A brief message.
    Short,
    /// A message the user should not miss.
    Long,
}

/// Surface for transient messages to the user. Called on the UI thread.
pub trait Notifier: Send + Sync {
    /// Shows `message` for roughly `duration`.
    fn show(&self, message: &str, duration: NoticeDuration);
}

/// Writes notices to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show(&self, message: &str, duration: NoticeDuration) {
        tracing::debug!(?duration, "Showing notice");
        eprintln!("{}", message);
    }
}

/// Keeps every notice shown, for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(String, NoticeDuration)>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices shown so far, oldest first.
    pub fn notices(&self) -> Vec<(String, NoticeDuration)> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, message: &str, duration: NoticeDuration) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.to_owned(), duration));
    }
}
