mod analysis;
mod config;
mod dispatch;
mod events;
mod extract;
mod keywords;
mod llm_client;
mod metrics;
mod prompts;
mod report;
mod server;
mod session;
mod stt_stream;


use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use analysis::Analyzer;
use config::Config;
use events::EventBus;
use llm_client::{LLMClient, LanguageModel};
use metrics::MetricsAggregator;
use report::ReportBuffer;
use server::AppState;
use session::{SessionController, SessionSettings};
use stt_stream::{SttStreamClient, StreamingTranscriber};

/// Wire the pipeline together and serve until shutdown
pub async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Medscribe analysis service starting...");

    let config = Config::load_or_default();
    if let Ok(path) = Config::config_path() {
        if !path.exists() {
            // First run: persist the defaults, not the env-overridden values
            if let Err(e) = Config::default().save() {
                warn!("Could not write default config: {}", e);
            }
        }
    }

    let events = EventBus::new();
    let report = Arc::new(Mutex::new(ReportBuffer::new()));
    let metrics = Arc::new(Mutex::new(MetricsAggregator::new()));
    let settings = Arc::new(Mutex::new(SessionSettings::new(&config.default_language)));

    let llm: Arc<dyn LanguageModel> = Arc::new(
        LLMClient::new(
            &config.llm_url,
            &config.llm_api_key,
            &config.client_id,
            &config.llm_model,
            Duration::from_secs(config.llm_timeout_secs),
        )
        .map_err(anyhow::Error::msg)?,
    );
    let transcriber: Arc<dyn StreamingTranscriber> = Arc::new(
        SttStreamClient::new(&config.stt_url, &config.stt_api_key).map_err(anyhow::Error::msg)?,
    );

    let analyzer = Arc::new(Analyzer::new(
        llm,
        Arc::clone(&report),
        Arc::clone(&metrics),
        Arc::clone(&settings),
        events.clone(),
    ));
    let controller = Arc::new(SessionController::new(
        transcriber,
        Arc::clone(&analyzer),
        events.clone(),
        settings,
        config.sample_rate,
        &config.default_language,
    ));

    let state = AppState {
        controller,
        analyzer,
        report,
        metrics,
        events,
    };
    server::serve(state, config.listen_port).await
}
