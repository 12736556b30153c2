//! Tagged-span extraction from report HTML
//!
//! The markup stage wraps each clinical category in a fixed HTML tag; these
//! helpers pull the inner texts back out for the report view and for the
//! diagnosis gate. Matching is case-insensitive with non-greedy capture, so
//! a span's inner markup comes back verbatim.

use regex::Regex;
use serde::{Deserialize, Serialize};

const PHI_PATTERN: &str = r#"(?i)<span\s+style="color:\s*red;">(.*?)</span>"#;
const HISTORY_PATTERN: &str = r#"(?i)<span\s+style="background-color:\s*lightgreen;">(.*?)</span>"#;
const ANATOMY_PATTERN: &str = r"(?i)<em>(.*?)</em>";
const MEDICATION_PATTERN: &str = r#"(?i)<span\s+style="background-color:\s*yellow;">(.*?)</span>"#;
const TESTS_PATTERN: &str = r#"(?i)<span\s+style="color:\s*darkblue;">(.*?)</span>"#;
const DIAGNOSIS_PATTERN: &str = r#"(?i)<span\s+style="color:\s*blue;">(.*?)</span>"#;
const SEVERITY_PATTERN: &str = r#"(?i)<span\s+class="severity">(.*?)</span>"#;

/// Report content grouped by annotation category, in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportCategories {
    pub phi: Vec<String>,
    pub medical_history: Vec<String>,
    pub anatomy: Vec<String>,
    pub medication: Vec<String>,
    pub tests: Vec<String>,
    pub diagnosis: Vec<String>,
    pub severity: Vec<String>,
}

fn capture_all(pattern: &str, html: &str) -> Vec<String> {
    let re = Regex::new(pattern).unwrap();
    re.captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Extract every annotated span from the report HTML
pub fn extract_categories(html: &str) -> ReportCategories {
    ReportCategories {
        phi: capture_all(PHI_PATTERN, html),
        medical_history: capture_all(HISTORY_PATTERN, html),
        anatomy: capture_all(ANATOMY_PATTERN, html),
        medication: capture_all(MEDICATION_PATTERN, html),
        tests: capture_all(TESTS_PATTERN, html),
        diagnosis: capture_all(DIAGNOSIS_PATTERN, html),
        severity: capture_all(SEVERITY_PATTERN, html),
    }
}

/// First diagnosis span in the HTML, if any
pub fn first_diagnosis(html: &str) -> Option<String> {
    let re = Regex::new(DIAGNOSIS_PATTERN).unwrap();
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}
