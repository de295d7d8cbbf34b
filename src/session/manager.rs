//! Camera session lifecycle.
//!
//! A session is the pairing of a preview surface and an analysis stream,
//! fed by one capture thread. Binding always unbinds the previous session
//! first, so at most one session is ever live per manager.

use super::preview::PreviewSurface;
use super::slot::{Backpressure, LatestSlot, Offer};
use crate::capture::{Camera, CameraError, CameraProvider, CaptureConfig, Frame, ProviderFactory};
use crate::metrics::ScanMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors that can occur while starting or binding a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The camera failed to open.
    #[error(transparent)]
    Camera(#[from] CameraError),
    /// The capture thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The capture thread ended without reporting.
    #[error("capture thread exited before the camera opened")]
    CaptureThreadExited,
}

/// Analysis output of a session: frames are offered to `slot` under
/// `backpressure`.
#[derive(Clone)]
pub struct ImageAnalysis {
    slot: Arc<LatestSlot<Frame>>,
    backpressure: Backpressure,
}

impl ImageAnalysis {
    /// Creates an analysis stream feeding `slot`.
    pub fn new(slot: Arc<LatestSlot<Frame>>, backpressure: Backpressure) -> Self {
        Self { slot, backpressure }
    }

    /// Returns the configured backpressure policy.
    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    fn offer(&self, frame: Frame) -> Offer<Frame> {
        self.slot.offer(frame, self.backpressure)
    }

    fn end_of_stream(&self) {
        self.slot.close();
    }
}

/// A bound preview + analysis pipeline.
///
/// Dropping the session stops its capture thread and closes the camera.
pub struct CameraSession {
    stop: Arc<AtomicBool>,
    capture: Option<JoinHandle<()>>,
}

impl CameraSession {
    /// Stops capture and waits for the camera to close.
    pub fn stop(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        if capture.join().is_err() {
            tracing::error!("Capture thread panicked");
        }
        tracing::info!("Camera session unbound");
    }

    /// Returns true while frames are being captured.
    pub fn is_active(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| !c.is_finished())
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the camera session of one scan screen.
pub struct SessionManager {
    factory: Arc<dyn ProviderFactory>,
    config: CaptureConfig,
    metrics: Arc<ScanMetrics>,
    session: Option<CameraSession>,
}

impl SessionManager {
    /// Creates a manager with no bound session.
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        config: CaptureConfig,
        metrics: Arc<ScanMetrics>,
    ) -> Self {
        Self {
            factory,
            config,
            metrics,
            session: None,
        }
    }

    /// Acquires the camera provider on a background thread.
    ///
    /// `on_ready` runs on that thread with the acquisition result.
    pub fn start_session<F>(&self, on_ready: F) -> Result<(), SessionError>
    where
        F: FnOnce(Result<Arc<dyn CameraProvider>, CameraError>) + Send + 'static,
    {
        let factory = Arc::clone(&self.factory);
        thread::Builder::new()
            .name("camera-provider".into())
            .spawn(move || {
                let provider = factory.acquire();
                if let Err(e) = &provider {
                    tracing::error!(error = %e, "Camera provider acquisition failed");
                }
                on_ready(provider);
            })?;
        Ok(())
    }

    /// Binds a new session, replacing any previous one.
    ///
    /// Returns once the camera is open. If opening fails, no session is
    /// left bound.
    pub fn bind(
        &mut self,
        provider: Arc<dyn CameraProvider>,
        preview: Arc<dyn PreviewSurface>,
        analysis: ImageAnalysis,
    ) -> Result<(), SessionError> {
        self.unbind_all();

        let stop = Arc::new(AtomicBool::new(false));
        let (opened_tx, opened_rx) = mpsc::sync_channel::<Result<(), CameraError>>(1);
        let config = self.config.clone();
        let metrics = Arc::clone(&self.metrics);
        let backpressure = analysis.backpressure();

        let capture = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("camera-capture".into())
                .spawn(move || {
                    let camera = provider.create_camera(&config).and_then(|mut camera| {
                        camera.open(&config)?;
                        Ok(camera)
                    });
                    match camera {
                        Ok(camera) => {
                            let _ = opened_tx.send(Ok(()));
                            capture_loop(camera, &config, &stop, &*preview, &analysis, &metrics);
                        }
                        Err(e) => {
                            let _ = opened_tx.send(Err(e));
                        }
                    }
                })?
        };

        let opened = opened_rx.recv();
        let mut session = CameraSession {
            stop,
            capture: Some(capture),
        };
        match opened {
            Ok(Ok(())) => {
                tracing::info!(
                    device = self.config.device_id,
                    backpressure = ?backpressure,
                    "Camera session bound"
                );
                self.session = Some(session);
                Ok(())
            }
            Ok(Err(e)) => {
                session.stop();
                Err(SessionError::Camera(e))
            }
            Err(_) => {
                session.stop();
                Err(SessionError::CaptureThreadExited)
            }
        }
    }

    /// Unbinds the current session, if any.
    pub fn unbind_all(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }

    /// Returns true if a session is bound.
    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }

    /// Returns true if the bound session is still capturing.
    pub fn is_capturing(&self) -> bool {
        self.session.as_ref().is_some_and(CameraSession::is_active)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

fn capture_loop(
    mut camera: Box<dyn Camera>,
    config: &CaptureConfig,
    stop: &AtomicBool,
    preview: &dyn PreviewSurface,
    analysis: &ImageAnalysis,
    metrics: &ScanMetrics,
) {
    while !stop.load(Ordering::Acquire) {
        match camera.capture() {
            Ok(frame) => {
                metrics.frame_captured();
                preview.render(&frame);
                match analysis.offer(frame) {
                    Offer::Accepted => {}
                    Offer::Replaced(stale) => {
                        metrics.frame_dropped();
                        tracing::trace!(sequence = stale.sequence(), "Dropped stale frame");
                    }
                    Offer::Closed(_) => {
                        tracing::debug!("Analysis stream closed, stopping capture");
                        break;
                    }
                }
            }
            Err(CameraError::EndOfStream) => {
                tracing::info!("Camera stream ended");
                analysis.end_of_stream();
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Frame capture failed");
                thread::sleep(config.frame_interval());
            }
        }
    }
    camera.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ready_provider, unavailable_provider, MockProvider, ScriptedFrame};
    use crate::session::NullPreview;
    use std::time::Duration;

    fn manager(factory: Arc<dyn ProviderFactory>) -> SessionManager {
        SessionManager::new(
            factory,
            CaptureConfig::with_dimensions(16, 16),
            Arc::new(ScanMetrics::new().unwrap()),
        )
    }

    fn analysis() -> (Arc<LatestSlot<Frame>>, ImageAnalysis) {
        let slot = Arc::new(LatestSlot::new());
        let analysis = ImageAnalysis::new(Arc::clone(&slot), Backpressure::KeepOnlyLatest);
        (slot, analysis)
    }

    #[test]
    fn test_start_session_delivers_provider() {
        let provider: Arc<dyn CameraProvider> = Arc::new(MockProvider::new());
        let sessions = manager(ready_provider(provider));
        let (tx, rx) = mpsc::channel();

        sessions.start_session(move |result| tx.send(result.is_ok()).unwrap()).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn test_start_session_reports_acquisition_failure() {
        let sessions = manager(unavailable_provider("offline"));
        let (tx, rx) = mpsc::channel();

        sessions.start_session(move |result| tx.send(result.err()).unwrap()).unwrap();
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Some(CameraError::ProviderUnavailable(_))
        ));
    }

    #[test]
    fn test_rebinding_leaves_one_session() {
        let provider = Arc::new(MockProvider::new());
        let mut sessions = manager(ready_provider(provider.clone()));
        let (slot, analysis) = analysis();

        sessions.bind(provider.clone(), Arc::new(NullPreview), analysis.clone()).unwrap();
        sessions.bind(provider.clone(), Arc::new(NullPreview), analysis).unwrap();

        assert!(sessions.is_bound());
        assert_eq!(provider.created_cameras(), 2);
        assert_eq!(provider.open_cameras(), 1);
        assert!(slot.take().is_some());

        sessions.unbind_all();
        assert!(!sessions.is_bound());
        assert_eq!(provider.open_cameras(), 0);
    }

    #[test]
    fn test_failed_open_leaves_nothing_bound() {
        let provider = Arc::new(MockProvider::new());
        let mut sessions = SessionManager::new(
            ready_provider(provider.clone()),
            CaptureConfig::with_dimensions(0, 0),
            Arc::new(ScanMetrics::new().unwrap()),
        );
        let (_slot, analysis) = analysis();

        let result = sessions.bind(provider.clone(), Arc::new(NullPreview), analysis);
        assert!(matches!(
            result,
            Err(SessionError::Camera(CameraError::ConfigFailed(_)))
        ));
        assert!(!sessions.is_bound());
        assert_eq!(provider.open_cameras(), 0);
    }

    #[test]
    fn test_end_of_stream_closes_analysis() {
        let provider = Arc::new(MockProvider::scripted([ScriptedFrame::Pattern]));
        let mut sessions = manager(ready_provider(provider.clone()));
        let (slot, analysis) = analysis();

        sessions.bind(provider, Arc::new(NullPreview), analysis).unwrap();

        assert!(slot.take().is_some());
        assert!(slot.take().is_none());
        assert!(slot.is_closed());
    }
}
