//! Metrics aggregator for chart data
//!
//! Holds the symptom counts, severity trend, and symptom timeline derived
//! from the transcript. Structured extraction merge-replaces whatever keys
//! the model produced; the keyword fallback only ever adds. Nothing here is
//! reset by a re-analysis, so the trend keeps its full session history.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity classification used by the trend chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    High,
    Moderate,
    Low,
}

impl SeverityLevel {
    /// Parse a severity token, any case. Anything outside the three known
    /// levels is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HIGH" => Some(Self::High),
            "MODERATE" => Some(Self::Moderate),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

/// One point on the severity trend chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Wall-clock time formatted HH:MM:SS
    pub time: String,
    pub severity: SeverityLevel,
}

/// One point on the symptom timeline chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Wall-clock time formatted HH:MM:SS
    pub time: String,
    pub symptom: String,
}

/// Structured chart data decoded from the extraction model's JSON.
///
/// Every key is optional: an absent key leaves the aggregator untouched,
/// while a present key with the wrong shape fails the whole decode and
/// sends the caller down the keyword-fallback path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub symptom_counts: Option<HashMap<String, u64>>,
    #[serde(default)]
    pub severity_trends: Option<Vec<TrendPoint>>,
    #[serde(default)]
    pub symptom_timeline: Option<Vec<TimelinePoint>>,
}

/// Read-model returned to chart consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub symptom_counts: HashMap<String, u64>,
    pub severity_trends: Vec<TrendPoint>,
    pub symptom_timeline: Vec<TimelinePoint>,
}

/// Current wall-clock time in the HH:MM:SS form the charts plot
pub fn now_hms() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Pull the severity level out of a severity assessment fragment.
/// Matching is case-insensitive; only the three known levels count.
pub fn parse_severity_assessment(html: &str) -> Option<SeverityLevel> {
    let re = Regex::new(r"(?i)Severity:\s*(HIGH|MODERATE|LOW)").unwrap();
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .and_then(|m| SeverityLevel::parse(m.as_str()))
}

/// Chart metrics store. Owners guard it with a lock.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    symptom_counts: HashMap<String, u64>,
    severity_trend: Vec<TrendPoint>,
    symptom_timeline: Vec<TimelinePoint>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whichever sections the structured extraction produced,
    /// leaving absent sections at their prior values.
    pub fn merge_structured(&mut self, data: GraphData) {
        if let Some(counts) = data.symptom_counts {
            self.symptom_counts = counts;
        }
        if let Some(trend) = data.severity_trends {
            self.severity_trend = trend;
        }
        if let Some(timeline) = data.symptom_timeline {
            self.symptom_timeline = timeline;
        }
    }

    /// Add fallback keyword counts on top of existing counts
    pub fn add_keyword_counts(&mut self, counts: HashMap<String, u64>) {
        for (symptom, count) in counts {
            *self.symptom_counts.entry(symptom).or_insert(0) += count;
        }
    }

    /// Append a severity observation stamped with the current time
    pub fn push_trend_now(&mut self, level: SeverityLevel) {
        self.severity_trend.push(TrendPoint {
            time: now_hms(),
            severity: level,
        });
    }

    /// Snapshot for chart consumers. Empty counts and an empty trend come
    /// back as fixed placeholders so the charts always have axes to draw;
    /// the placeholders are never written into the store.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let symptom_counts = if self.symptom_counts.is_empty() {
            HashMap::from([
                ("fever".to_string(), 0),
                ("cough".to_string(), 0),
                ("pain".to_string(), 0),
            ])
        } else {
            self.symptom_counts.clone()
        };

        let severity_trends = if self.severity_trend.is_empty() {
            vec![TrendPoint {
                time: now_hms(),
                severity: SeverityLevel::Low,
            }]
        } else {
            self.severity_trend.clone()
        };

        MetricsSnapshot {
            symptom_counts,
            severity_trends,
            symptom_timeline: self.symptom_timeline.clone(),
        }
    }
}
