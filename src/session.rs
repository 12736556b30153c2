use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::analysis::Analyzer;
use crate::dispatch;
use crate::events::EventBus;
use crate::stt_stream::{StreamEvent, StreamRequest, StreamingTranscriber};

/// Depth of the per-session stream event queue
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Bound on waiting for the stream worker thread to exit after a stop
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// User location attached to clinic suggestions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
}

/// Session error types
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum SessionError {
    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),
}

/// Settings shared between the controller and the analysis stages.
/// The location persists across sessions once set.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub language: String,
    pub location: Option<GeoPoint>,
}

impl SessionSettings {
    pub fn new(default_language: &str) -> Self {
        Self {
            language: default_language.to_string(),
            location: None,
        }
    }
}

/// Lower-case the requested language, falling back to the configured default
fn normalize_language(language: Option<&str>, default_language: &str) -> String {
    match language {
        Some(l) if !l.trim().is_empty() => l.trim().to_lowercase(),
        _ => default_language.to_string(),
    }
}

/// Single-session slot guarded by the controller mutex.
///
/// The generation counter detects stale stream events: each started session
/// gets a new generation, and state transitions driven by a previous
/// session's events are discarded.
struct SessionSlot {
    state: SessionState,
    stream_id: Option<String>,
    stop_flag: Option<Arc<AtomicBool>>,
    worker: Option<std::thread::JoinHandle<()>>,
    generation: u64,
}

impl SessionSlot {
    fn next_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

/// Outcome of an idle transition request
pub(crate) struct CloseOutcome {
    /// Whether the transition applied (false when stale or already idle)
    pub(crate) applied: bool,
    /// Worker handle taken from the slot, to be joined by the caller
    pub(crate) worker: Option<std::thread::JoinHandle<()>>,
}

/// Session state shared with the dispatch task
pub(crate) struct SessionShared {
    slot: Mutex<SessionSlot>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            slot: Mutex::new(SessionSlot {
                state: SessionState::Idle,
                stream_id: None,
                stop_flag: None,
                worker: None,
                generation: 0,
            }),
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the stream id and move Connecting -> Open.
    /// Returns false when the event is stale or a stop is already underway.
    pub(crate) fn try_open(&self, generation: u64, stream_id: &str) -> bool {
        let mut slot = self.lock_slot();
        if slot.generation != generation || slot.state != SessionState::Connecting {
            return false;
        }
        slot.state = SessionState::Open;
        slot.stream_id = Some(stream_id.to_string());
        true
    }

    /// Move the slot back to Idle and clear the stream id.
    /// Stale generations leave the slot untouched.
    pub(crate) fn try_close(&self, generation: u64) -> CloseOutcome {
        let mut slot = self.lock_slot();
        if slot.generation != generation || slot.state == SessionState::Idle {
            return CloseOutcome {
                applied: false,
                worker: None,
            };
        }
        slot.state = SessionState::Idle;
        slot.stream_id = None;
        slot.stop_flag = None;
        CloseOutcome {
            applied: true,
            worker: slot.worker.take(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.lock_slot().state
    }

    pub(crate) fn stream_id(&self) -> Option<String> {
        self.lock_slot().stream_id.clone()
    }
}

/// Join a finished or stopping worker thread without blocking the caller.
/// The join itself is bounded; a worker that outlives the bound is reported
/// and left to exit on its own.
pub(crate) fn spawn_worker_join(handle: std::thread::JoinHandle<()>) {
    tokio::spawn(async move {
        let join = tokio::task::spawn_blocking(move || {
            let _ = handle.join();
        });
        if tokio::time::timeout(WORKER_JOIN_TIMEOUT, join).await.is_err() {
            warn!(
                "Stream worker did not exit within {:?}",
                WORKER_JOIN_TIMEOUT
            );
        }
    });
}

/// Owns the single active transcription session.
///
/// `toggle` starts a session when idle and stops the active one otherwise.
/// The live stream runs on a dedicated worker thread for its whole lifetime;
/// stream events cross onto the runtime through a bounded channel consumed
/// by one dispatch task per session.
pub struct SessionController {
    shared: Arc<SessionShared>,
    settings: Arc<Mutex<SessionSettings>>,
    transcriber: Arc<dyn StreamingTranscriber>,
    analyzer: Arc<Analyzer>,
    events: EventBus,
    sample_rate: u32,
    default_language: String,
}

impl SessionController {
    pub fn new(
        transcriber: Arc<dyn StreamingTranscriber>,
        analyzer: Arc<Analyzer>,
        events: EventBus,
        settings: Arc<Mutex<SessionSettings>>,
        sample_rate: u32,
        default_language: &str,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared::new()),
            settings,
            transcriber,
            analyzer,
            events,
            sample_rate,
            default_language: default_language.to_string(),
        }
    }

    /// Start a session when idle, stop the active one otherwise.
    ///
    /// The slot mutex is held across the whole read-modify-write so two
    /// concurrent toggles can never both observe Idle and start two streams.
    /// Returns quickly in both directions; connection and shutdown complete
    /// asynchronously and are observed through session events.
    pub fn toggle(
        &self,
        language: Option<String>,
        location: Option<GeoPoint>,
    ) -> Result<(), SessionError> {
        let mut slot = self.shared.lock_slot();
        match slot.state {
            SessionState::Idle => {
                let request = self.apply_settings(language.as_deref(), location);
                let generation = slot.next_generation();
                let stop_flag = Arc::new(AtomicBool::new(false));
                let (tx, rx) = mpsc::channel::<StreamEvent>(EVENT_QUEUE_DEPTH);

                info!(
                    "Starting transcription session (language={}, generation={})",
                    request.language, generation
                );

                let transcriber = Arc::clone(&self.transcriber);
                let flag_for_worker = Arc::clone(&stop_flag);
                let worker = std::thread::spawn(move || {
                    let result = transcriber.stream(&request, &flag_for_worker, &mut |event| {
                        let _ = tx.blocking_send(event);
                    });
                    if let Err(message) = result {
                        let _ = tx.blocking_send(StreamEvent::Error { message });
                    }
                    let _ = tx.blocking_send(StreamEvent::Closed);
                });

                slot.state = SessionState::Connecting;
                slot.stream_id = None;
                slot.stop_flag = Some(stop_flag);
                slot.worker = Some(worker);
                drop(slot);

                dispatch::spawn(
                    rx,
                    generation,
                    Arc::clone(&self.shared),
                    Arc::clone(&self.analyzer),
                    self.events.clone(),
                );
                Ok(())
            }
            SessionState::Connecting | SessionState::Open => {
                info!("Stopping transcription session");
                slot.state = SessionState::Closing;
                if let Some(flag) = slot.stop_flag.take() {
                    flag.store(true, Ordering::Relaxed);
                }
                let worker = slot.worker.take();
                drop(slot);

                if let Some(handle) = worker {
                    spawn_worker_join(handle);
                }
                Ok(())
            }
            SessionState::Closing => Err(SessionError::InvalidTransition(
                "session is still closing".to_string(),
            )),
        }
    }

    /// Stop the active session if there is one. Used on shutdown.
    pub fn stop_if_active(&self) {
        if self.is_active() {
            if let Err(e) = self.toggle(None, None) {
                warn!("Failed to stop session on shutdown: {}", e);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.shared.state(),
            SessionState::Connecting | SessionState::Open
        )
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn stream_id(&self) -> Option<String> {
        self.shared.stream_id()
    }

    /// Store normalized language and merge the location, returning the
    /// stream request for the session being started.
    fn apply_settings(
        &self,
        language: Option<&str>,
        location: Option<GeoPoint>,
    ) -> StreamRequest {
        let mut settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        settings.language = normalize_language(language, &self.default_language);
        if let Some(point) = location {
            settings.location = Some(point);
        }
        StreamRequest {
            language: settings.language.clone(),
            sample_rate: self.sample_rate,
        }
    }
}
