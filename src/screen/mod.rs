//! The scan screen: permission, camera session and result, driven from
//! one UI thread.
//!
//! Background threads never touch screen state directly. Permission
//! answers, provider acquisition, decoded values and stream exhaustion are
//! posted as events to the thread running [`ScanScreen::run`].

mod notice;
mod result;
mod state;

pub use notice::{ConsoleNotifier, NoticeDuration, Notifier, RecordingNotifier};
pub use result::{ResultCode, ScanResult, TerminationReason, QR_RESULT_KEY};
pub use state::ScreenState;

use crate::analysis::{FrameRelay, ResultReporter};
use crate::capture::{CameraError, CameraProvider, CaptureConfig, Frame, ProviderFactory, ScanConfig};
use crate::decode::Decoder;
use crate::metrics::ScanMetrics;
use crate::permission::{
    PermissionCell, PermissionGate, PermissionResponse, PermissionState, CAMERA_PERMISSION_REQUEST,
};
use crate::session::{
    AnalysisExecutor, ImageAnalysis, LatestSlot, PreviewSurface, SessionError, SessionManager,
};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

const DENIED_NOTICE: &str = "Camera permission denied";
const UNAVAILABLE_NOTICE: &str = "Camera unavailable";
const NOT_FOUND_NOTICE: &str = "No code found";

/// Errors surfaced by the scan screen.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The user refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// The camera provider or camera could not be obtained.
    #[error("camera provider unavailable: {0}")]
    ProviderUnavailable(#[from] CameraError),
    /// The camera session could not be bound.
    #[error("camera session failed: {0}")]
    Session(#[from] SessionError),
    /// A worker thread could not be started.
    #[error("failed to start worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Collaborators of a scan screen.
pub struct ScreenDeps {
    /// Camera permission source.
    pub permissions: Arc<dyn PermissionGate>,
    /// Camera provider acquisition.
    pub provider: Arc<dyn ProviderFactory>,
    /// Barcode decoder.
    pub decoder: Arc<dyn Decoder>,
    /// Preview output.
    pub preview: Arc<dyn PreviewSurface>,
    /// Transient user messages.
    pub notifier: Arc<dyn Notifier>,
    /// Scan counters.
    pub metrics: Arc<ScanMetrics>,
}

enum UiEvent {
    Permission(PermissionResponse),
    ProviderReady(Result<Arc<dyn CameraProvider>, CameraError>),
    Decoded(String),
    StreamDrained,
    Cancel,
}

/// Posts to a running screen from other threads.
#[derive(Clone)]
pub struct ScreenHandle {
    events: Sender<UiEvent>,
}

impl ScreenHandle {
    /// Cancels the scan, like a user backing out of the screen.
    pub fn cancel(&self) {
        let _ = self.events.send(UiEvent::Cancel);
    }
}

/// A single scan: asks for camera access, streams frames through the
/// decoder and terminates on the first decoded value.
pub struct ScanScreen {
    scan: ScanConfig,
    state: ScreenState,
    history: Vec<ScreenState>,
    permission: PermissionCell,
    permissions: Arc<dyn PermissionGate>,
    preview: Arc<dyn PreviewSurface>,
    notifier: Arc<dyn Notifier>,
    sessions: SessionManager,
    slot: Arc<LatestSlot<Frame>>,
    executor: AnalysisExecutor,
    events_tx: Sender<UiEvent>,
    events: Receiver<UiEvent>,
    result: Option<ScanResult>,
    destroyed: bool,
}

impl ScanScreen {
    /// Creates the screen and its analysis worker.
    pub fn new(capture: CaptureConfig, scan: ScanConfig, deps: ScreenDeps) -> Result<Self, ScanError> {
        let (events_tx, events) = mpsc::channel();

        let reporter = {
            let tx = events_tx.clone();
            Arc::new(ResultReporter::new(Arc::clone(&deps.metrics), move |value| {
                let _ = tx.send(UiEvent::Decoded(value));
            }))
        };
        let relay = FrameRelay::new(deps.decoder, reporter, Arc::clone(&deps.metrics));

        let slot = Arc::new(LatestSlot::new());
        let executor = {
            let tx = events_tx.clone();
            AnalysisExecutor::spawn(
                "frame-analysis",
                Arc::clone(&slot),
                Arc::clone(&deps.metrics),
                move |frame| relay.on_frame(frame),
                move || {
                    let _ = tx.send(UiEvent::StreamDrained);
                },
            )?
        };

        Ok(Self {
            scan,
            state: ScreenState::AwaitingPermission,
            history: vec![ScreenState::AwaitingPermission],
            permission: PermissionCell::new(),
            permissions: deps.permissions,
            preview: deps.preview,
            notifier: deps.notifier,
            sessions: SessionManager::new(deps.provider, capture, deps.metrics),
            slot,
            executor,
            events_tx,
            events,
            result: None,
            destroyed: false,
        })
    }

    /// Returns a handle for posting to the screen from other threads.
    pub fn handle(&self) -> ScreenHandle {
        ScreenHandle {
            events: self.events_tx.clone(),
        }
    }

    /// Runs the screen on the calling thread until it terminates.
    ///
    /// A screen runs once; later calls return the first outcome.
    pub fn run(&mut self) -> ScanResult {
        if self.destroyed {
            return self
                .result
                .clone()
                .unwrap_or_else(|| ScanResult::canceled(TerminationReason::Cancelled));
        }
        self.on_create();

        let deadline = self.scan.timeout().map(|t| Instant::now() + t);
        while !self.state.is_terminal() {
            let event = match deadline {
                Some(deadline) => self
                    .events
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self.events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match event {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {
                    tracing::info!("Scan timed out");
                    self.notifier.show(NOT_FOUND_NOTICE, NoticeDuration::Short);
                    self.finish(ScanResult::canceled(TerminationReason::TimedOut));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.finish(ScanResult::canceled(TerminationReason::Cancelled));
                }
            }
        }

        self.on_destroy();
        self.result
            .clone()
            .unwrap_or_else(|| ScanResult::canceled(TerminationReason::Cancelled))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScreenState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[ScreenState] {
        &self.history
    }

    /// Outcome of permission negotiation.
    pub fn permission_state(&self) -> PermissionState {
        self.permission.get()
    }

    fn on_create(&mut self) {
        tracing::info!("Scan screen created");
        if self.permissions.has_camera_access() {
            self.permission.decide(true);
            self.start_camera();
        } else {
            let tx = self.events_tx.clone();
            tracing::info!(request_code = CAMERA_PERMISSION_REQUEST, "Requesting camera access");
            self.permissions.request_camera_access(
                CAMERA_PERMISSION_REQUEST,
                Box::new(move |response| {
                    let _ = tx.send(UiEvent::Permission(response));
                }),
            );
        }
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Permission(response) => self.on_permission_result(response),
            UiEvent::ProviderReady(provider) => self.on_provider_ready(provider),
            UiEvent::Decoded(value) => self.on_decoded(value),
            UiEvent::StreamDrained => {
                if self.state == ScreenState::Scanning {
                    tracing::info!("Source exhausted without a code");
                    self.notifier.show(NOT_FOUND_NOTICE, NoticeDuration::Short);
                    self.finish(ScanResult::canceled(TerminationReason::SourceExhausted));
                }
            }
            UiEvent::Cancel => {
                tracing::info!(state = %self.state, "Scan cancelled");
                self.finish(ScanResult::canceled(TerminationReason::Cancelled));
            }
        }
    }

    fn on_permission_result(&mut self, response: PermissionResponse) {
        if self.state != ScreenState::AwaitingPermission {
            tracing::debug!(?response, "Ignoring late permission response");
            return;
        }
        let granted = response.request_code == CAMERA_PERMISSION_REQUEST && response.granted;
        self.permission.decide(granted);
        if granted {
            self.start_camera();
        } else {
            tracing::warn!(error = %ScanError::PermissionDenied, "Camera access refused");
            self.notifier.show(DENIED_NOTICE, NoticeDuration::Long);
            self.finish(ScanResult::canceled(TerminationReason::PermissionDenied));
        }
    }

    fn start_camera(&mut self) {
        if !self.transition(ScreenState::SessionStarting) {
            return;
        }
        let tx = self.events_tx.clone();
        let started = self.sessions.start_session(move |provider| {
            let _ = tx.send(UiEvent::ProviderReady(provider));
        });
        if let Err(e) = started {
            self.camera_unavailable(e.into());
        }
    }

    fn on_provider_ready(&mut self, provider: Result<Arc<dyn CameraProvider>, CameraError>) {
        if self.state != ScreenState::SessionStarting {
            return;
        }
        let bound = provider.map_err(ScanError::from).and_then(|provider| {
            let analysis = ImageAnalysis::new(Arc::clone(&self.slot), self.scan.backpressure);
            self.sessions
                .bind(provider, Arc::clone(&self.preview), analysis)
                .map_err(ScanError::from)
        });
        match bound {
            Ok(()) => {
                self.transition(ScreenState::Scanning);
            }
            Err(e) => self.camera_unavailable(e),
        }
    }

    fn camera_unavailable(&mut self, error: ScanError) {
        tracing::error!(error = %error, "Camera session could not be started");
        self.notifier.show(UNAVAILABLE_NOTICE, NoticeDuration::Long);
        self.finish(ScanResult::canceled(TerminationReason::ProviderUnavailable));
    }

    fn on_decoded(&mut self, value: String) {
        if !self.transition(ScreenState::Finishing) {
            return;
        }
        self.notifier.show(&format!("QR: {}", value), NoticeDuration::Short);
        self.finish(ScanResult::success(value));
    }

    fn finish(&mut self, result: ScanResult) {
        if !self.transition(ScreenState::Terminated) {
            return;
        }
        tracing::info!(code = ?result.code, reason = ?result.reason, "Scan screen finished");
        self.result = Some(result);
    }

    fn transition(&mut self, next: ScreenState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::debug!(from = %self.state, to = %next, "Ignoring invalid transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "Screen state changed");
        self.state = next;
        self.history.push(next);
        true
    }

    fn on_destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        // Closing the analysis slot first unblocks a producer waiting on it.
        self.executor.shutdown();
        self.sessions.unbind_all();
        tracing::info!("Scan screen destroyed");
    }
}

impl Drop for ScanScreen {
    fn drop(&mut self) {
        self.on_destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ready_provider, unavailable_provider, MockProvider, ScriptedFrame};
    use crate::decode::{Barcode, DecodeError, ScriptedDecoder};
    use crate::permission::StaticPermissions;
    use crate::session::{Backpressure, NullPreview};
    use std::time::Duration;

    struct Fixture {
        permissions: Arc<StaticPermissions>,
        provider: Arc<MockProvider>,
        decoder: Arc<ScriptedDecoder>,
        notifier: Arc<RecordingNotifier>,
        metrics: Arc<ScanMetrics>,
    }

    impl Fixture {
        fn new(
            permissions: StaticPermissions,
            provider: MockProvider,
            outcomes: Vec<Result<Vec<Barcode>, DecodeError>>,
        ) -> Self {
            Self {
                permissions: Arc::new(permissions),
                provider: Arc::new(provider),
                decoder: Arc::new(ScriptedDecoder::new(outcomes)),
                notifier: Arc::new(RecordingNotifier::new()),
                metrics: Arc::new(ScanMetrics::new().unwrap()),
            }
        }

        fn screen(&self, backpressure: Backpressure) -> ScanScreen {
            let provider: Arc<dyn CameraProvider> = self.provider.clone();
            self.screen_with(ready_provider(provider), backpressure)
        }

        fn screen_with(&self, factory: Arc<dyn ProviderFactory>, backpressure: Backpressure) -> ScanScreen {
            let scan = ScanConfig {
                backpressure,
                timeout_secs: 5,
                ..ScanConfig::default()
            };
            let deps = ScreenDeps {
                permissions: self.permissions.clone(),
                provider: factory,
                decoder: self.decoder.clone(),
                preview: Arc::new(NullPreview),
                notifier: self.notifier.clone(),
                metrics: Arc::clone(&self.metrics),
            };
            ScanScreen::new(CaptureConfig::with_dimensions(16, 16), scan, deps).unwrap()
        }

        fn notices(&self) -> Vec<String> {
            self.notifier.notices().into_iter().map(|(text, _)| text).collect()
        }
    }

    #[test]
    fn test_pre_granted_scan_returns_value() {
        let fixture = Fixture::new(
            StaticPermissions::granted(),
            MockProvider::new(),
            vec![Ok(vec![Barcode::text("ABC123")])],
        );
        let mut screen = fixture.screen(Backpressure::KeepOnlyLatest);

        let result = screen.run();

        assert_eq!(result.code, ResultCode::Ok);
        assert_eq!(result.extra(QR_RESULT_KEY), Some("ABC123"));
        assert!(fixture.permissions.requests().is_empty());
        assert_eq!(fixture.notices(), vec!["QR: ABC123".to_string()]);
        assert_eq!(
            screen.history(),
            &[
                ScreenState::AwaitingPermission,
                ScreenState::SessionStarting,
                ScreenState::Scanning,
                ScreenState::Finishing,
                ScreenState::Terminated,
            ]
        );
        assert_eq!(fixture.provider.open_cameras(), 0);
    }

    #[test]
    fn test_requested_permission_granted() {
        let fixture = Fixture::new(
            StaticPermissions::on_request(true),
            MockProvider::new(),
            vec![Ok(vec![Barcode::text("https://example.com")])],
        );
        let mut screen = fixture.screen(Backpressure::KeepOnlyLatest);

        let result = screen.run();

        assert_eq!(result.qr_result.as_deref(), Some("https://example.com"));
        assert_eq!(fixture.permissions.requests(), vec![CAMERA_PERMISSION_REQUEST]);
        assert_eq!(screen.permission_state(), PermissionState::Granted);
    }

    #[test]
    fn test_permission_denied_cancels() {
        let fixture = Fixture::new(StaticPermissions::on_request(false), MockProvider::new(), vec![]);
        let mut screen = fixture.screen(Backpressure::KeepOnlyLatest);

        let result = screen.run();

        assert_eq!(result.code, ResultCode::Canceled);
        assert_eq!(result.reason, TerminationReason::PermissionDenied);
        assert_eq!(result.extra(QR_RESULT_KEY), None);
        assert_eq!(
            fixture.notifier.notices(),
            vec![(DENIED_NOTICE.to_string(), NoticeDuration::Long)]
        );
        assert_eq!(fixture.permissions.requests(), vec![CAMERA_PERMISSION_REQUEST]);
        assert_eq!(
            screen.history(),
            &[ScreenState::AwaitingPermission, ScreenState::Terminated]
        );
        assert_eq!(screen.permission_state(), PermissionState::Denied);
        assert_eq!(fixture.provider.created_cameras(), 0);
        assert_eq!(fixture.decoder.calls(), 0);
    }

    #[test]
    fn test_malformed_frame_skipped_without_decode() {
        let fixture = Fixture::new(
            StaticPermissions::granted(),
            MockProvider::scripted([ScriptedFrame::NoImage, ScriptedFrame::Pattern]),
            vec![Ok(vec![Barcode::text("XYZ")])],
        );
        let mut screen = fixture.screen(Backpressure::BlockProducer);

        let result = screen.run();

        assert_eq!(result.qr_result.as_deref(), Some("XYZ"));
        assert_eq!(fixture.decoder.calls(), 1);
        let snapshot = fixture.metrics.snapshot();
        assert_eq!(snapshot.frames_malformed, 1);
        assert_eq!(snapshot.decode_requests, 1);
    }

    #[test]
    fn test_provider_unavailable_terminates() {
        let fixture = Fixture::new(StaticPermissions::granted(), MockProvider::new(), vec![]);
        let mut screen =
            fixture.screen_with(unavailable_provider("camera service missing"), Backpressure::KeepOnlyLatest);

        let result = screen.run();

        assert_eq!(result.code, ResultCode::Canceled);
        assert_eq!(result.reason, TerminationReason::ProviderUnavailable);
        assert_eq!(fixture.notices(), vec![UNAVAILABLE_NOTICE.to_string()]);
        assert!(!screen.history().contains(&ScreenState::Scanning));
    }

    #[test]
    fn test_exhausted_source_without_code() {
        let fixture = Fixture::new(
            StaticPermissions::granted(),
            MockProvider::scripted([ScriptedFrame::Pattern, ScriptedFrame::Pattern]),
            vec![Ok(Vec::new()), Err(DecodeError::Engine("model failed".into()))],
        );
        let mut screen = fixture.screen(Backpressure::BlockProducer);

        let result = screen.run();

        assert_eq!(result.reason, TerminationReason::SourceExhausted);
        assert_eq!(fixture.notices(), vec![NOT_FOUND_NOTICE.to_string()]);
        assert_eq!(fixture.decoder.calls(), 2);
        let snapshot = fixture.metrics.snapshot();
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.frames_released, 2);
    }

    #[test]
    fn test_first_decoded_value_wins() {
        let fixture = Fixture::new(
            StaticPermissions::granted(),
            MockProvider::scripted([ScriptedFrame::Pattern, ScriptedFrame::Pattern]),
            vec![
                Ok(vec![Barcode::unreadable(), Barcode::text("FIRST"), Barcode::text("OTHER")]),
                Ok(vec![Barcode::text("SECOND")]),
            ],
        );
        let mut screen = fixture.screen(Backpressure::BlockProducer);

        let result = screen.run();

        assert_eq!(result.qr_result.as_deref(), Some("FIRST"));
        assert_eq!(fixture.metrics.snapshot().codes_reported, 1);
        assert_eq!(fixture.notices(), vec!["QR: FIRST".to_string()]);
    }

    #[test]
    fn test_cancel_before_session_ready() {
        let fixture = Fixture::new(StaticPermissions::granted(), MockProvider::new(), vec![]);
        let mut screen = fixture.screen(Backpressure::KeepOnlyLatest);
        screen.handle().cancel();

        let result = screen.run();

        assert_eq!(result.reason, TerminationReason::Cancelled);
        assert_eq!(screen.state(), ScreenState::Terminated);
        assert_eq!(fixture.provider.open_cameras(), 0);
    }

    #[test]
    fn test_timeout_without_code() {
        let fixture = Fixture::new(StaticPermissions::granted(), MockProvider::new(), vec![]);
        let provider: Arc<dyn CameraProvider> = fixture.provider.clone();
        let deps = ScreenDeps {
            permissions: fixture.permissions.clone(),
            provider: ready_provider(provider),
            decoder: fixture.decoder.clone(),
            preview: Arc::new(NullPreview),
            notifier: fixture.notifier.clone(),
            metrics: Arc::clone(&fixture.metrics),
        };
        let scan = ScanConfig {
            timeout_secs: 1,
            ..ScanConfig::default()
        };
        let mut screen = ScanScreen::new(CaptureConfig::with_dimensions(16, 16), scan, deps).unwrap();

        let result = screen.run();

        assert_eq!(result.reason, TerminationReason::TimedOut);
        assert_eq!(fixture.notices(), vec![NOT_FOUND_NOTICE.to_string()]);
        assert_eq!(fixture.provider.open_cameras(), 0);
    }

    #[test]
    fn test_run_is_once_only() {
        let fixture = Fixture::new(StaticPermissions::on_request(false), MockProvider::new(), vec![]);
        let mut screen = fixture.screen(Backpressure::KeepOnlyLatest);

        let first = screen.run();
        let second = screen.run();

        assert_eq!(first, second);
        assert_eq!(fixture.permissions.requests().len(), 1);
    }

    /// Gate answering every request with a fixed response.
    struct FixedResponse(PermissionResponse);

    impl PermissionGate for FixedResponse {
        fn has_camera_access(&self) -> bool {
            false
        }

        fn request_camera_access(&self, _request_code: u32, callback: crate::permission::PermissionCallback) {
            callback(self.0);
        }
    }

    #[test]
    fn test_foreign_request_code_is_denial() {
        let fixture = Fixture::new(StaticPermissions::granted(), MockProvider::new(), vec![]);
        let provider: Arc<dyn CameraProvider> = fixture.provider.clone();
        let deps = ScreenDeps {
            permissions: Arc::new(FixedResponse(PermissionResponse {
                request_code: 7,
                granted: true,
            })),
            provider: ready_provider(provider),
            decoder: fixture.decoder.clone(),
            preview: Arc::new(NullPreview),
            notifier: fixture.notifier.clone(),
            metrics: Arc::clone(&fixture.metrics),
        };
        let mut screen =
            ScanScreen::new(CaptureConfig::with_dimensions(16, 16), ScanConfig::default(), deps).unwrap();

        let result = screen.run();

        assert_eq!(result.reason, TerminationReason::PermissionDenied);
        assert_eq!(
            fixture.notifier.notices(),
            vec![(DENIED_NOTICE.to_string(), NoticeDuration::Long)]
        );
        assert_eq!(screen.permission_state(), PermissionState::Denied);
        assert_eq!(fixture.provider.created_cameras(), 0);
    }

    #[test]
    fn test_late_permission_response_ignored() {
        let fixture = Fixture::new(StaticPermissions::granted(), MockProvider::new(), vec![]);
        let mut screen = fixture.screen(Backpressure::KeepOnlyLatest);

        screen.on_create();
        while screen.state() != ScreenState::Scanning {
            let event = screen.events.recv_timeout(Duration::from_secs(5)).unwrap();
            screen.handle_event(event);
        }
        assert!(screen.sessions.is_capturing());

        screen.on_permission_result(PermissionResponse {
            request_code: CAMERA_PERMISSION_REQUEST,
            granted: false,
        });

        assert_eq!(screen.state(), ScreenState::Scanning);
        assert_eq!(screen.permission_state(), PermissionState::Granted);
        assert!(fixture.notices().is_empty());

        screen.on_destroy();
        assert!(!screen.sessions.is_capturing());
        assert_eq!(fixture.provider.open_cameras(), 0);
    }
}
