//! Transcript event router
//!
//! One dispatch task per session consumes stream events in arrival order:
//! partials feed the live view, finals feed the analysis pipeline, empty
//! text is discarded. Analyses run sequentially on this task so report
//! appends preserve fragment order, and a failure inside one analysis never
//! blocks the next final fragment.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::analysis::Analyzer;
use crate::events::{AnalysisEvent, EventBus};
use crate::session::{spawn_worker_join, SessionShared};
use crate::stt_stream::StreamEvent;

/// Spawn the dispatch task for one session.
///
/// The task runs until the stream worker drops its sender. Session state
/// transitions are generation-guarded so a task outliving its session can
/// never clobber a newer one; final fragments are analyzed unconditionally.
pub(crate) fn spawn(
    mut rx: mpsc::Receiver<StreamEvent>,
    generation: u64,
    shared: Arc<SessionShared>,
    analyzer: Arc<Analyzer>,
    events: EventBus,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Opened { stream_id } => {
                    if shared.try_open(generation, &stream_id) {
                        info!("Transcription stream open: {}", stream_id);
                        events.emit(AnalysisEvent::SessionOpened { stream_id });
                    } else {
                        debug!("Discarding stale stream open: {}", stream_id);
                    }
                }
                StreamEvent::Partial { text } => {
                    if text.is_empty() {
                        debug!("Discarding empty partial fragment");
                        continue;
                    }
                    events.emit(AnalysisEvent::PartialTranscript { text });
                }
                StreamEvent::Final { text } => {
                    if text.is_empty() {
                        debug!("Discarding empty final fragment");
                        continue;
                    }
                    info!("Final fragment received: {} chars", text.len());
                    events.emit(AnalysisEvent::Transcript { text: text.clone() });
                    analyzer.analyze(&text, false).await;
                }
                StreamEvent::Error { message } => {
                    let outcome = shared.try_close(generation);
                    if outcome.applied {
                        error!("Transcription stream error: {}", message);
                        events.emit(AnalysisEvent::SessionError { message });
                    } else {
                        debug!("Discarding stale stream error: {}", message);
                    }
                    if let Some(handle) = outcome.worker {
                        spawn_worker_join(handle);
                    }
                }
                StreamEvent::Closed => {
                    let outcome = shared.try_close(generation);
                    if outcome.applied {
                        info!("Transcription stream closed");
                        events.emit(AnalysisEvent::SessionClosed);
                    }
                    if let Some(handle) = outcome.worker {
                        spawn_worker_join(handle);
                    }
                }
            }
        }

        // Channel closed without a terminal event (worker died mid-stream)
        let outcome = shared.try_close(generation);
        if outcome.applied {
            warn!("Stream event channel closed without a terminal event");
            events.emit(AnalysisEvent::SessionClosed);
        }
        if let Some(handle) = outcome.worker {
            spawn_worker_join(handle);
        }
    })
}
