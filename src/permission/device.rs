//! Terminal-consent permission gate for camera devices.

use super::{PermissionCallback, PermissionGate, PermissionResponse};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Grants camera access on user consent.
///
/// Consent is either given up front (configuration or `--yes`) or asked
/// for on the terminal. When a device node is set, access additionally
/// requires that the node can be opened.
#[derive(Debug, Clone)]
pub struct DevicePermissions {
    device: Option<PathBuf>,
    pre_granted: bool,
}

impl DevicePermissions {
    /// Creates a gate for `device`, consenting up front if `pre_granted`.
    pub fn new(device: Option<PathBuf>, pre_granted: bool) -> Self {
        Self {
            device,
            pre_granted,
        }
    }

    /// Device node path for a camera index on this platform.
    pub fn device_node(device_id: u32) -> Option<PathBuf> {
        cfg!(target_os = "linux").then(|| PathBuf::from(format!("/dev/video{}", device_id)))
    }

    fn device_accessible(&self) -> bool {
        self.device.as_deref().map_or(true, node_accessible)
    }
}

fn node_accessible(path: &Path) -> bool {
    match std::fs::OpenOptions::new().read(true).open(path) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(device = %path.display(), error = %e, "Camera device not accessible");
            false
        }
    }
}

fn is_consent(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl PermissionGate for DevicePermissions {
    fn has_camera_access(&self) -> bool {
        self.pre_granted && self.device_accessible()
    }

    fn request_camera_access(&self, request_code: u32, callback: PermissionCallback) {
        let gate = self.clone();
        ask_on_thread(
            |task| {
                thread::Builder::new()
                    .name("permission-prompt".into())
                    .spawn(task)
                    .map(drop)
            },
            request_code,
            callback,
            move || read_consent() && gate.device_accessible(),
        );
    }
}

fn read_consent() -> bool {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "Allow qr-scan to use the camera? [y/N] ");
    let _ = stderr.flush();

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_consent(&answer),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read permission answer");
            false
        }
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// Runs `ask` through `spawn` and answers `callback` with its outcome.
///
/// The callback is answered exactly once: with a denial if the task
/// cannot be started.
fn ask_on_thread<S, A>(spawn: S, request_code: u32, callback: PermissionCallback, ask: A)
where
    S: FnOnce(Task) -> std::io::Result<()>,
    A: FnOnce() -> bool + Send + 'static,
{
    let pending = Arc::new(Mutex::new(Some(callback)));
    let task: Task = {
        let pending = Arc::clone(&pending);
        Box::new(move || {
            let granted = ask();
            answer(&pending, request_code, granted);
        })
    };
    if let Err(e) = spawn(task) {
        tracing::error!(error = %e, "Failed to spawn permission prompt, denying access");
        answer(&pending, request_code, false);
    }
}

fn answer(pending: &Mutex<Option<PermissionCallback>>, request_code: u32, granted: bool) {
    let callback = pending.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(callback) = callback {
        callback(PermissionResponse {
            request_code,
            granted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_answers() {
        assert!(is_consent("y\n"));
        assert!(is_consent(" YES "));
        assert!(!is_consent("\n"));
        assert!(!is_consent("no"));
    }

    #[test]
    fn test_missing_device_denies_access() {
        let gate = DevicePermissions::new(Some(PathBuf::from("/nonexistent/video9")), true);
        assert!(!gate.has_camera_access());
    }

    #[test]
    fn test_pre_granted_without_device() {
        assert!(DevicePermissions::new(None, true).has_camera_access());
        assert!(!DevicePermissions::new(None, false).has_camera_access());
    }

    fn recorder() -> (PermissionCallback, std::sync::mpsc::Receiver<PermissionResponse>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (Box::new(move |response| tx.send(response).unwrap()), rx)
    }

    #[test]
    fn test_spawn_failure_denies() {
        let (callback, responses) = recorder();
        ask_on_thread(
            |_task| Err(std::io::Error::new(std::io::ErrorKind::Other, "no threads")),
            1001,
            callback,
            || true,
        );

        let response = responses.try_recv().unwrap();
        assert_eq!(response.request_code, 1001);
        assert!(!response.granted);
        assert!(responses.try_recv().is_err());
    }

    #[test]
    fn test_prompt_answer_forwarded_once() {
        let (callback, responses) = recorder();
        ask_on_thread(
            |task| {
                task();
                Ok(())
            },
            1001,
            callback,
            || true,
        );

        let response = responses.try_recv().unwrap();
        assert!(response.granted);
        assert!(responses.try_recv().is_err());
    }
}
