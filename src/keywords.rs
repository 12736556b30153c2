//! Fallback symptom vocabularies for deterministic keyword counting
//!
//! When structured metric extraction fails, symptom counts come from these
//! lists instead. Lookup is keyed by the session language; unknown languages
//! use the English list.

use std::collections::HashMap;

const ENGLISH: &[&str] = &["fever", "cough", "pain", "nausea", "dizziness", "headache"];
const SPANISH: &[&str] = &["fiebre", "tos", "dolor", "náusea", "mareo", "cefalea"];
const HINDI: &[&str] = &["बुखार", "खांसी", "दर्द", "मतली", "चक्कर", "सिरदर्द"];
const FRENCH: &[&str] = &["fièvre", "toux", "douleur", "nausée", "vertige", "céphalée"];

/// Symptom vocabulary for a session language
pub fn symptom_vocabulary(language: &str) -> &'static [&'static str] {
    match language.to_lowercase().as_str() {
        "spanish" | "español" => SPANISH,
        "hindi" => HINDI,
        "french" | "français" => FRENCH,
        _ => ENGLISH,
    }
}

/// Count case-insensitive, non-overlapping occurrences of each vocabulary
/// term in the transcript. Terms that do not occur are absent from the map.
pub fn count_symptom_mentions(transcript: &str, language: &str) -> HashMap<String, u64> {
    let haystack = transcript.to_lowercase();
    let mut counts = HashMap::new();

    for keyword in symptom_vocabulary(language) {
        let count = haystack.matches(keyword).count() as u64;
        if count > 0 {
            counts.insert(keyword.to_string(), count);
        }
    }

    counts
}
