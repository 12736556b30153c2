//! Analysis orchestrator
//!
//! Runs the staged annotation pipeline over each final transcript fragment:
//! structured metric extraction and markup formatting first (concurrently),
//! then the advisory stages gated on a detected diagnosis. Each stage is
//! fail-soft: a failed call is logged and its fragment omitted, and the
//! remaining stages still run. Only a markup failure cuts the pass short,
//! since every later stage consumes its output.

use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::events::{AnalysisEvent, EventBus};
use crate::extract;
use crate::keywords;
use crate::llm_client::{
    extract_first_json_array, extract_first_json_object, strip_think_tags, tasks, LanguageModel,
};
use crate::metrics::{self, GraphData, MetricsAggregator};
use crate::prompts::{
    build_clinic_prompt, build_correction_prompt, build_graph_data_prompt, build_markup_prompt,
    build_precautions_prompt, build_severity_prompt,
};
use crate::report::ReportBuffer;
use crate::session::SessionSettings;

/// Decode a structured graph-data response after the usual hygiene passes.
/// Any shape violation rejects the whole response so the caller can fall
/// back to deterministic keyword counting.
fn decode_graph_data(response: &str) -> Option<GraphData> {
    let cleaned = strip_think_tags(response);
    let json = extract_first_json_object(&cleaned)?;
    match serde_json::from_str::<GraphData>(&json) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("Graph data response did not decode: {}", e);
            None
        }
    }
}

/// Parse a correction response into at most three suggestions.
/// Anything that is not a JSON string array yields no suggestions.
fn parse_suggestions(response: &str) -> Vec<String> {
    let cleaned = strip_think_tags(response);
    let json = match extract_first_json_array(&cleaned) {
        Some(json) => json,
        None => return Vec::new(),
    };
    match serde_json::from_str::<Vec<String>>(&json) {
        Ok(mut suggestions) => {
            suggestions.truncate(3);
            suggestions
        }
        Err(e) => {
            warn!("Correction response did not decode: {}", e);
            Vec::new()
        }
    }
}

/// Orchestrates the annotation stages for one transcript fragment at a time
pub struct Analyzer {
    llm: Arc<dyn LanguageModel>,
    report: Arc<Mutex<ReportBuffer>>,
    metrics: Arc<Mutex<MetricsAggregator>>,
    settings: Arc<Mutex<SessionSettings>>,
    events: EventBus,
}

impl Analyzer {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        report: Arc<Mutex<ReportBuffer>>,
        metrics: Arc<Mutex<MetricsAggregator>>,
        settings: Arc<Mutex<SessionSettings>>,
        events: EventBus,
    ) -> Self {
        Self {
            llm,
            report,
            metrics,
            settings,
            events,
        }
    }

    /// Run the full annotation pass over one transcript fragment.
    ///
    /// On re-analysis the formatted transcript replaces the report instead
    /// of appending; every later fragment of the same pass appends as usual.
    /// Metrics are never reset by a re-analysis.
    pub async fn analyze(&self, transcript: &str, is_reanalysis: bool) {
        info!(
            "Analyzing fragment: {} chars (reanalysis={})",
            transcript.len(),
            is_reanalysis
        );

        let (_, formatted) = tokio::join!(
            self.update_metrics(transcript),
            self.format_markup(transcript),
        );

        let formatted = match formatted {
            Some(html) => html,
            None => return,
        };

        {
            let mut report = self.report.lock().unwrap_or_else(|e| e.into_inner());
            if is_reanalysis {
                report.replace(&formatted);
            } else {
                report.append(&formatted);
            }
        }
        self.events.emit(AnalysisEvent::FormattedTranscript {
            html: formatted.clone(),
        });

        let diagnosis = match extract::first_diagnosis(&formatted) {
            Some(d) => d,
            None => {
                debug!("No diagnosis in fragment, skipping advisory stages");
                return;
            }
        };
        info!("Diagnosis span found ({} chars)", diagnosis.len());

        self.precautions_stage(&diagnosis).await;
        self.severity_stage(&diagnosis).await;
        self.clinic_stage(&diagnosis).await;
    }

    /// Produce up to three replacement suggestions for a misheard word.
    /// Failures yield an empty list; the notification fires either way.
    pub async fn suggest_corrections(&self, word: &str, context: &str) -> Vec<String> {
        let (system, user) = build_correction_prompt(word, context);
        let suggestions = match self.llm.generate(&system, &user, tasks::CORRECTION).await {
            Ok(response) => parse_suggestions(&response),
            Err(e) => {
                warn!("Correction suggestion call failed: {}", e);
                Vec::new()
            }
        };
        info!(
            "Correction suggestions for word ({} chars): {} candidates",
            word.len(),
            suggestions.len()
        );
        self.events.emit(AnalysisEvent::CorrectionSuggestions {
            word: word.to_string(),
            suggestions: suggestions.clone(),
        });
        suggestions
    }

    /// Stage 1: structured extraction with deterministic keyword fallback
    async fn update_metrics(&self, transcript: &str) {
        let (system, user) = build_graph_data_prompt(transcript);
        let decoded = match self.llm.generate(&system, &user, tasks::GRAPH_DATA).await {
            Ok(response) => decode_graph_data(&response),
            Err(e) => {
                warn!("Structured extraction call failed: {}", e);
                None
            }
        };

        match decoded {
            Some(data) => {
                let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
                metrics.merge_structured(data);
            }
            None => {
                let language = {
                    let settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
                    settings.language.clone()
                };
                let counts = keywords::count_symptom_mentions(transcript, &language);
                if counts.is_empty() {
                    debug!("Keyword fallback found no symptom mentions");
                } else {
                    info!("Keyword fallback counted {} symptom terms", counts.len());
                }
                let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
                metrics.add_keyword_counts(counts);
            }
        }
    }

    /// Stage 2: markup formatting. None means the whole pass stops here.
    async fn format_markup(&self, transcript: &str) -> Option<String> {
        let (system, user) = build_markup_prompt(transcript);
        match self.llm.generate(&system, &user, tasks::MARKUP).await {
            Ok(response) => Some(strip_think_tags(&response)),
            Err(e) => {
                warn!("Markup stage failed, skipping dependent stages: {}", e);
                None
            }
        }
    }

    async fn precautions_stage(&self, diagnosis: &str) {
        let (system, user) = build_precautions_prompt(diagnosis);
        match self.llm.generate(&system, &user, tasks::PRECAUTIONS).await {
            Ok(response) => {
                let html = strip_think_tags(&response);
                self.append_fragment(&html);
                self.events.emit(AnalysisEvent::Precautions { html });
            }
            Err(e) => warn!("Precautions stage failed: {}", e),
        }
    }

    async fn severity_stage(&self, diagnosis: &str) {
        let (system, user) = build_severity_prompt(diagnosis);
        match self.llm.generate(&system, &user, tasks::SEVERITY).await {
            Ok(response) => {
                let html = strip_think_tags(&response);
                self.append_fragment(&html);
                self.events.emit(AnalysisEvent::Severity { html: html.clone() });
                match metrics::parse_severity_assessment(&html) {
                    Some(level) => {
                        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
                        metrics.push_trend_now(level);
                    }
                    None => debug!("No recognized severity level in assessment"),
                }
            }
            Err(e) => warn!("Severity stage failed: {}", e),
        }
    }

    async fn clinic_stage(&self, diagnosis: &str) {
        let location = {
            let settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
            settings.location
        };
        let (system, user) = build_clinic_prompt(diagnosis, location.as_ref());
        match self.llm.generate(&system, &user, tasks::CLINIC_SEARCH).await {
            Ok(response) => {
                let html = strip_think_tags(&response);
                self.append_fragment(&html);
                self.events.emit(AnalysisEvent::ClinicSuggestions { html });
            }
            Err(e) => warn!("Clinic suggestion stage failed: {}", e),
        }
    }

    fn append_fragment(&self, html: &str) {
        let mut report = self.report.lock().unwrap_or_else(|e| e.into_inner());
        report.append(html);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_graph_data_full() {
        let response = r#"{
            "symptom_counts": {"fever": 2, "cough": 1},
            "severity_trends": [{"time": "10:02:11", "severity": "HIGH"}],
            "symptom_timeline": [{"time": "10:02:11", "symptom": "fever"}]
        }"#;
        let data = decode_graph_data(response).unwrap();
        assert_eq!(data.symptom_counts.unwrap()["fever"], 2);
        assert_eq!(data.severity_trends.unwrap().len(), 1);
        assert_eq!(data.symptom_timeline.unwrap()[0].symptom, "fever");
    }

    #[test]
    fn test_decode_graph_data_partial_keys() {
        let response = r#"{"symptom_counts": {"nausea": 3}}"#;
        let data = decode_graph_data(response).unwrap();
        assert_eq!(data.symptom_counts.unwrap()["nausea"], 3);
        assert!(data.severity_trends.is_none());
        assert!(data.symptom_timeline.is_none());
    }

    #[test]
    fn test_decode_graph_data_fenced_and_prosed() {
        let response = "Here is the data:\n```json\n{\"symptom_counts\": {\"pain\": 1}}\n```";
        let data = decode_graph_data(response).unwrap();
        assert_eq!(data.symptom_counts.unwrap()["pain"], 1);
    }

    #[test]
    fn test_decode_graph_data_think_tags() {
        let response = "<think>counting symptoms</think>{\"symptom_counts\": {\"fever\": 1}}";
        let data = decode_graph_data(response).unwrap();
        assert_eq!(data.symptom_counts.unwrap()["fever"], 1);
    }

    #[test]
    fn test_decode_graph_data_wrong_shape_rejected() {
        // A string where a map is expected rejects the whole response
        let response = r#"{"symptom_counts": "lots"}"#;
        assert!(decode_graph_data(response).is_none());
    }

    #[test]
    fn test_decode_graph_data_no_json() {
        assert!(decode_graph_data("I could not produce data.").is_none());
    }

    #[test]
    fn test_parse_suggestions_truncates_to_three() {
        let response = r#"["dyspnea", "dysphagia", "dysplasia", "dystonia", "dysuria"]"#;
        let suggestions = parse_suggestions(response);
        assert_eq!(suggestions, vec!["dyspnea", "dysphagia", "dysplasia"]);
    }

    #[test]
    fn test_parse_suggestions_fenced() {
        let response = "```json\n[\"angina\", \"anemia\"]\n```";
        assert_eq!(parse_suggestions(response), vec!["angina", "anemia"]);
    }

    #[test]
    fn test_parse_suggestions_prose_around_array() {
        let response = "Possible matches: [\"edema\"] based on the context.";
        assert_eq!(parse_suggestions(response), vec!["edema"]);
    }

    #[test]
    fn test_parse_suggestions_garbage() {
        assert!(parse_suggestions("no array here").is_empty());
        assert!(parse_suggestions("[1, 2, 3]").is_empty());
    }
}
