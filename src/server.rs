//! HTTP and WebSocket surface of the analysis service
//!
//! Three read-only endpoints expose health, chart metrics, and the current
//! report. The WebSocket endpoint streams pipeline events to every connected
//! client and accepts the client commands that drive the pipeline.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::events::{AnalysisEvent, EventBus};
use crate::extract;
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::report::ReportBuffer;
use crate::session::{GeoPoint, SessionController};

/// Outbound events queued per client ahead of the socket write loop
const CLIENT_QUEUE_DEPTH: usize = 64;

/// Shared handles every endpoint works against
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub analyzer: Arc<Analyzer>,
    pub report: Arc<Mutex<ReportBuffer>>,
    pub metrics: Arc<Mutex<MetricsAggregator>>,
    pub events: EventBus,
}

/// Commands clients send over the WebSocket, tagged the same way the
/// outbound events are.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    ToggleTranscription {
        language: Option<String>,
        location: Option<GeoPoint>,
    },
    ReAnalyzeTranscript {
        updated_transcript: String,
    },
    SuggestCorrection {
        word: String,
        #[serde(default)]
        context: String,
    },
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_endpoint))
        .route("/chart_data", get(chart_data_endpoint))
        .route("/report", get(report_endpoint))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind and serve until ctrl-c, stopping any active session on the way out
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let controller = Arc::clone(&state.controller);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            controller.stop_if_active();
        })
        .await
        .context("Server error")?;

    Ok(())
}

/// Liveness check reporting the current session alongside lock health
async fn health_endpoint(State(state): State<AppState>) -> Json<Value> {
    let healthy = state.report.lock().is_ok();
    Json(json!({
        "healthy": healthy,
        "service": "medscribe",
        "session": state.controller.state(),
        "stream_id": state.controller.stream_id(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn chart_data_endpoint(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    let snapshot = {
        let metrics = state.metrics.lock().unwrap_or_else(|e| e.into_inner());
        metrics.snapshot()
    };
    Json(snapshot)
}

async fn report_endpoint(State(state): State<AppState>) -> Json<Value> {
    let html = {
        let report = state.report.lock().unwrap_or_else(|e| e.into_inner());
        report.html().to_string()
    };
    let categories = extract::extract_categories(&html);
    Json(json!({
        "categories": categories,
        "report_html": html,
    }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-client loop. A dedicated sender task owns the sink; the select loop
/// multiplexes inbound commands with the pipeline event feed.
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::channel::<AnalysisEvent>(CLIENT_QUEUE_DEPTH);

    let sender = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut feed = state.events.subscribe();

    loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_client_command(&state, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("WebSocket receive error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            event = feed.recv() => {
                match event {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client fell behind, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    drop(tx);
    let _ = sender.await;
    info!("WebSocket client disconnected");
}

/// Apply one client command. Malformed messages are logged and ignored so a
/// misbehaving client cannot take the connection down.
fn handle_client_command(state: &AppState, text: &str) {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            warn!("Ignoring malformed client message: {}", e);
            return;
        }
    };

    match command {
        ClientCommand::ToggleTranscription { language, location } => {
            if let Err(e) = state.controller.toggle(language, location) {
                warn!("Toggle rejected: {}", e);
                state.events.emit(AnalysisEvent::SessionError {
                    message: e.to_string(),
                });
            }
        }
        ClientCommand::ReAnalyzeTranscript { updated_transcript } => {
            if updated_transcript.trim().is_empty() {
                debug!("Ignoring re-analysis request with empty transcript");
                return;
            }
            // Runs off the socket loop so a long pass never stalls the feed
            let analyzer = Arc::clone(&state.analyzer);
            tokio::spawn(async move {
                analyzer.analyze(&updated_transcript, true).await;
            });
        }
        ClientCommand::SuggestCorrection { word, context } => {
            let analyzer = Arc::clone(&state.analyzer);
            tokio::spawn(async move {
                analyzer.suggest_corrections(&word, &context).await;
            });
        }
    }
}
