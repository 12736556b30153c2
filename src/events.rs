//! Outbound notification bus for analysis results
//!
//! Every pipeline stage publishes its result here as soon as it exists.
//! Delivery is fire-and-forget: subscribers that lag past the channel
//! capacity skip ahead, and emitting with no subscribers is not an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Channel capacity before lagging subscribers start skipping
const EVENT_CAPACITY: usize = 100;

/// Notification published by the pipeline, serialized as a tagged JSON
/// object on the client WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// Transcription stream opened and ready for audio
    SessionOpened { stream_id: String },
    /// Transcription stream fully closed
    SessionClosed,
    /// Session-level failure (stream could not open, or died mid-session)
    SessionError { message: String },
    /// In-progress fragment for live display, may still change
    PartialTranscript { text: String },
    /// Finalized fragment, about to be analyzed
    Transcript { text: String },
    /// Annotated HTML for one finalized fragment
    FormattedTranscript { html: String },
    /// Precaution list derived from the detected diagnosis
    Precautions { html: String },
    /// Severity assessment derived from the detected diagnosis
    Severity { html: String },
    /// Nearby-clinic list derived from the detected diagnosis
    ClinicSuggestions { html: String },
    /// Alternatives for a word the clinician flagged as misheard
    CorrectionSuggestions {
        word: String,
        suggestions: Vec<String>,
    },
}

/// Broadcast bus carrying [`AnalysisEvent`]s to all connected clients.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnalysisEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn emit(&self, event: AnalysisEvent) {
        // Send only fails when there are no receivers, which is fine here
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
