//! Detection session controller.
//!
//! Coordinates the capture → submit → accept loop: records fixed-duration
//! video chunks from the capture source, submits them to the prediction
//! service, and appends accepted labels to the transcript. Each `start()`
//! mints a new session id; in-flight submissions carry the id they were
//! issued under and their responses are dropped once that id is no longer
//! active, so nothing stale ever reaches the transcript.

use crate::capture::CaptureSource;
use crate::predict_client::{PredictionResponse, Predictor};
use crate::scheduler::RepeatingTask;
use crate::settings::AppSettings;
use crate::transcript::Transcript;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Where chunks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Repeating fixed-duration segments from a live source.
    Camera,
    /// One whole user-selected file, then back to idle.
    Upload,
}

/// Current state of the detection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    /// No session in progress
    Idle,
    /// Recording a chunk
    Capturing,
    /// A submission is outstanding
    Submitting,
}

/// Events emitted during a detection session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum DetectionEvent {
    /// Session started
    Started { mode: CaptureMode, session_id: u64 },
    /// Session returned to idle
    Stopped,
    /// A chunk was handed to the prediction service
    Processing { session_id: u64 },
    /// A response arrived while its session was still active
    Result { prediction: PredictionResponse },
    /// The label cleared the acceptance filter and joined the transcript
    Accepted { label: String },
    /// Non-fatal failure, session state unchanged apart from upload one-shot
    Error { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no capture source is ready")]
    CaptureUnavailable,
}

/// Configuration for a detection session.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Predictions at or below this confidence are rejected
    pub acceptance_threshold: f64,
    /// Length of each recorded camera segment
    pub chunk_duration: Duration,
    /// Cadence of the camera capture loop
    pub chunk_interval: Duration,
    /// Labels that never reach the transcript regardless of confidence
    pub discard_labels: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.5,
            chunk_duration: Duration::from_millis(3000),
            chunk_interval: Duration::from_millis(3500),
            discard_labels: vec![
                "No Motion".to_string(),
                "No Hands Detected".to_string(),
                "Uncertain".to_string(),
            ],
        }
    }
}

impl DetectionConfig {
    /// Load config from app settings.
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            acceptance_threshold: settings.acceptance_threshold,
            chunk_duration: Duration::from_millis(settings.chunk_duration_ms),
            chunk_interval: Duration::from_millis(settings.chunk_interval_ms),
            discard_labels: settings.discard_labels.clone(),
        }
    }
}

/// Controller for detection sessions.
///
/// Clones share all state, so the controller can ride inside the capture
/// loop and submission tasks it spawns. Teardown is explicit via
/// [`DetectionManager::shutdown`].
#[derive(Clone)]
pub struct DetectionManager {
    /// Current capture mode
    mode: Arc<Mutex<CaptureMode>>,

    /// Current session state
    state: Arc<Mutex<DetectionState>>,

    /// Monotonically increasing session id; each `start()` takes the next one
    next_session_id: Arc<AtomicU64>,

    /// The session id responses are currently accepted under; 0 means idle
    active_session_id: Arc<AtomicU64>,

    /// Where chunks come from
    source: Arc<dyn CaptureSource>,

    /// Where chunks go
    predictor: Arc<dyn Predictor>,

    /// Accepted labels, in arrival order
    transcript: Arc<Transcript>,

    /// Most recent non-stale response
    current_result: Arc<Mutex<Option<PredictionResponse>>>,

    /// The camera-mode capture loop, when one is running
    capture_loop: Arc<Mutex<Option<RepeatingTask>>>,

    /// Event sink for the UI layer
    events: UnboundedSender<DetectionEvent>,

    config: DetectionConfig,
}

impl DetectionManager {
    /// Create a new detection manager and the receiving end of its event
    /// stream.
    pub fn new(
        source: Arc<dyn CaptureSource>,
        predictor: Arc<dyn Predictor>,
        config: DetectionConfig,
    ) -> (Self, UnboundedReceiver<DetectionEvent>) {
        let (events, receiver) = unbounded_channel();
        let manager = Self {
            mode: Arc::new(Mutex::new(CaptureMode::Camera)),
            state: Arc::new(Mutex::new(DetectionState::Idle)),
            next_session_id: Arc::new(AtomicU64::new(1)),
            active_session_id: Arc::new(AtomicU64::new(0)),
            source,
            predictor,
            transcript: Arc::new(Transcript::new()),
            current_result: Arc::new(Mutex::new(None)),
            capture_loop: Arc::new(Mutex::new(None)),
            events,
            config,
        };
        (manager, receiver)
    }

    /// Start a detection session in the current mode.
    ///
    /// Camera mode runs a repeating record-and-submit cycle at the
    /// configured cadence until stopped. Upload mode performs exactly one
    /// cycle and returns to idle once the submission settles. Fails without
    /// any state change when the capture source is not ready.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<u64, DetectionError> {
        if !self.source.is_ready() {
            return Err(DetectionError::CaptureUnavailable);
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let previous = self.active_session_id.swap(session_id, Ordering::SeqCst);
        if previous != 0 {
            warn!(
                "Starting session {} while session {} was still active",
                session_id, previous
            );
            self.halt_capture_loop();
        }

        let mode = *self.mode.lock().unwrap();
        *self.current_result.lock().unwrap() = None;
        *self.state.lock().unwrap() = DetectionState::Capturing;
        self.emit(DetectionEvent::Started { mode, session_id });
        info!("Detection session {} started in {:?} mode", session_id, mode);

        match mode {
            CaptureMode::Camera => {
                let manager = self.clone();
                let task = RepeatingTask::spawn(self.config.chunk_interval, move || {
                    let manager = manager.clone();
                    async move { manager.camera_cycle(session_id).await }
                });
                *self.capture_loop.lock().unwrap() = Some(task);
            }
            CaptureMode::Upload => {
                let manager = self.clone();
                tokio::spawn(async move {
                    manager.upload_cycle(session_id).await;
                });
            }
        }

        Ok(session_id)
    }

    /// Stop the session and return to idle.
    ///
    /// Cancels any scheduled capture and retires the active session id, so
    /// every in-flight submission becomes stale: its response, success or
    /// failure, is silently dropped.
    pub fn stop(&self) {
        let previous = self.active_session_id.swap(0, Ordering::SeqCst);
        self.halt_capture_loop();
        *self.state.lock().unwrap() = DetectionState::Idle;
        *self.current_result.lock().unwrap() = None;

        if previous != 0 {
            info!("Detection session {} stopped", previous);
            self.emit(DetectionEvent::Stopped);
        }
    }

    /// Switch capture mode. An active session is stopped first and the
    /// capture source is released.
    pub fn set_mode(&self, mode: CaptureMode) {
        if self.is_active() {
            self.stop();
        }
        self.source.release();
        let mut current = self.mode.lock().unwrap();
        if *current != mode {
            debug!("Capture mode changed: {:?} -> {:?}", *current, mode);
            *current = mode;
        }
    }

    /// Stop the session and release the capture source. Called on teardown.
    pub fn shutdown(&self) {
        self.stop();
        self.source.release();
    }

    pub fn mode(&self) -> CaptureMode {
        *self.mode.lock().unwrap()
    }

    pub fn state(&self) -> DetectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_active(&self) -> bool {
        self.active_session_id.load(Ordering::SeqCst) != 0
    }

    /// The most recent response accepted by the staleness guard, whether or
    /// not its label cleared the acceptance filter.
    pub fn current_result(&self) -> Option<PredictionResponse> {
        self.current_result.lock().unwrap().clone()
    }

    pub fn transcript(&self) -> Arc<Transcript> {
        self.transcript.clone()
    }

    pub fn clear_transcript(&self) {
        self.transcript.clear();
    }

    fn is_session_active(&self, session_id: u64) -> bool {
        self.active_session_id.load(Ordering::SeqCst) == session_id
    }

    fn halt_capture_loop(&self) {
        if let Some(task) = self.capture_loop.lock().unwrap().take() {
            task.cancel();
        }
    }

    fn emit(&self, event: DetectionEvent) {
        // Receiver may be gone in tests that only watch the transcript.
        let _ = self.events.send(event);
    }

    /// One tick of the camera loop: record a chunk, then submit it in the
    /// background so the next tick starts on cadence rather than after the
    /// response. Returns false to end the loop once the session is stale.
    async fn camera_cycle(&self, session_id: u64) -> bool {
        if !self.is_session_active(session_id) {
            return false;
        }

        *self.state.lock().unwrap() = DetectionState::Capturing;
        let chunk = match self.source.record(self.config.chunk_duration).await {
            Ok(chunk) => chunk,
            Err(e) => {
                if self.is_session_active(session_id) {
                    self.emit(DetectionEvent::Error {
                        message: format!("Capture failed: {}", e),
                    });
                }
                return self.is_session_active(session_id);
            }
        };

        if !self.is_session_active(session_id) {
            debug!("Session {} stopped during capture, dropping chunk", session_id);
            return false;
        }

        *self.state.lock().unwrap() = DetectionState::Submitting;
        self.emit(DetectionEvent::Processing { session_id });

        let manager = self.clone();
        tokio::spawn(async move {
            let outcome = manager.predictor.predict(&chunk).await;
            manager.handle_response(session_id, outcome);
            if manager.is_session_active(session_id) {
                *manager.state.lock().unwrap() = DetectionState::Capturing;
            }
        });

        true
    }

    /// The single record-and-submit cycle of upload mode. The session
    /// returns to idle once the submission settles, success or failure.
    async fn upload_cycle(&self, session_id: u64) {
        let chunk = match self.source.record(self.config.chunk_duration).await {
            Ok(chunk) => chunk,
            Err(e) => {
                if self.is_session_active(session_id) {
                    self.emit(DetectionEvent::Error {
                        message: format!("Capture failed: {}", e),
                    });
                }
                self.settle_upload(session_id);
                return;
            }
        };

        if !self.is_session_active(session_id) {
            return;
        }

        *self.state.lock().unwrap() = DetectionState::Submitting;
        self.emit(DetectionEvent::Processing { session_id });

        let outcome = self.predictor.predict(&chunk).await;
        self.handle_response(session_id, outcome);
        self.settle_upload(session_id);
    }

    /// Return an upload session to idle, unless it was already superseded.
    fn settle_upload(&self, session_id: u64) {
        let was_active = self
            .active_session_id
            .compare_exchange(session_id, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if was_active {
            *self.state.lock().unwrap() = DetectionState::Idle;
            info!("Upload session {} settled", session_id);
            self.emit(DetectionEvent::Stopped);
        }
    }

    /// Handle a settled submission. Responses whose session id is no longer
    /// active are dropped without a trace; live errors are surfaced as
    /// non-fatal events; live results pass through the acceptance filter.
    fn handle_response(&self, session_id: u64, outcome: Result<PredictionResponse, String>) {
        if !self.is_session_active(session_id) {
            debug!(
                "Dropping stale response for session {} (active: {})",
                session_id,
                self.active_session_id.load(Ordering::SeqCst)
            );
            return;
        }

        match outcome {
            Ok(prediction) => {
                debug!(
                    "Session {} result: '{}' ({:.3})",
                    session_id, prediction.prediction, prediction.confidence
                );
                *self.current_result.lock().unwrap() = Some(prediction.clone());
                let label = prediction.prediction.clone();
                let confidence = prediction.confidence;
                self.emit(DetectionEvent::Result { prediction });

                if self.accepts(&label, confidence) {
                    self.transcript.append(&label);
                    self.emit(DetectionEvent::Accepted { label });
                }
            }
            Err(message) => {
                warn!("Session {} submission failed: {}", session_id, message);
                self.emit(DetectionEvent::Error { message });
            }
        }
    }

    /// Strictly above the threshold, non-empty, and not a null-class label.
    fn accepts(&self, label: &str, confidence: f64) -> bool {
        confidence > self.config.acceptance_threshold
            && !label.is_empty()
            && !self.config.discard_labels.iter().any(|l| l == label)
    }
}
