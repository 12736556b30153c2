//! Prompt contracts for the analysis stages
//!
//! Each builder returns a (system, user) message pair for the chat API.
//! The HTML tags, class names, severity templates, and URL shape fixed here
//! are load-bearing: the extraction utilities and the report view parse
//! them back out, so wording may drift but the markup contracts must not.

use crate::session::GeoPoint;

/// Markup stage: annotate the transcript and predict a diagnosis.
pub fn build_markup_prompt(transcript: &str) -> (String, String) {
    let system = r#"You are a medical transcript analyzer. Return the exact transcript with the following modifications:
1. Wrap any Protected Health Information (PHI) (such as names, ages, nationalities, gender identities, organizations) in <span style="color: red;"> ... </span>.
2. Highlight any Medical History (illnesses, symptoms, conditions) using <span style="background-color: lightgreen;"> ... </span>.
3. Italicize mentions of Anatomy (body parts) using <em> ... </em>.
4. Wrap any Medication names in <span style="background-color: yellow;"> ... </span>.
5. Wrap any Tests, Treatments, & Procedures in <span style="color: darkblue;"> ... </span>.
6. Based solely on the transcript, predict the most likely diagnosis and output it on its own separate line, enclosed in <span style="color: blue;"> and </span> with no extra text.
If there is insufficient information to predict a diagnosis or apply modifications, simply return the transcript verbatim.
Return only the formatted transcript without any additional commentary."#;

    (system.to_string(), transcript.to_string())
}

/// Structured extraction stage: symptom counts, severity trend, timeline.
pub fn build_graph_data_prompt(transcript: &str) -> (String, String) {
    let system = r#"You are an assistant that extracts structured data from a medical transcript.
Analyze the symptoms mentioned in the transcript and their severity over time.
Produce a JSON object with the following keys:
"symptom_counts": a dictionary mapping each symptom (string) to its frequency (integer),
"severity_trends": an array of objects, each with keys "time" (formatted as HH:MM:SS) and "severity" (one of HIGH, MODERATE, LOW),
"symptom_timeline": an array of objects, each with keys "time" (formatted as HH:MM:SS) and "symptom" (string).
Return only valid JSON with no additional commentary."#;

    (system.to_string(), transcript.to_string())
}

/// Precautions stage, conditioned on the predicted diagnosis.
pub fn build_precautions_prompt(diagnosis: &str) -> (String, String) {
    let system = r#"You are a medical advisor. Based on the predicted diagnosis provided below, suggest practical precautions (including recommended food items and home remedies).
Format your answer in HTML as follows:
<div class="precautions">
  <ul>
    <li>Precaution 1</li>
    <li>Precaution 2</li>
  </ul>
</div>
Do not include extra text."#;

    (system.to_string(), diagnosis.to_string())
}

/// Severity stage, conditioned on the predicted diagnosis.
pub fn build_severity_prompt(diagnosis: &str) -> (String, String) {
    let system = r#"You are a medical advisor. Based on the predicted diagnosis provided below, evaluate its severity and provide a short recommendation.
Format your answer in HTML as follows:
<span class="severity">Severity: HIGH - Please consult a doctor immediately.</span>
or
<span class="severity">Severity: MODERATE - Monitor your symptoms and consider consulting a doctor.</span>
or
<span class="severity">Severity: LOW - Maintain healthy habits.</span>
Return only the HTML formatted text."#;

    (system.to_string(), diagnosis.to_string())
}

/// Clinic suggestion stage, conditioned on diagnosis and patient location.
pub fn build_clinic_prompt(diagnosis: &str, location: Option<&GeoPoint>) -> (String, String) {
    let system = format!(
        r#"You are a healthcare advisor. The patient is located at {}. Based on the predicted diagnosis provided below, suggest a list of nearby clinics and hospitals that specialize in this condition.
Format your answer in HTML as an unordered list (<ul>...</ul>).
For each suggestion, include:
- The Clinic/Hospital Name
- The Address
- The Contact Information
- A "Get Directions" button that is an anchor tag (<a>) opening Google Maps in a new tab.
Format the "Get Directions" link so that the href is: "https://www.google.com/maps/search/?api=1&query=CLINIC_ADDRESS"
Do not include any extra commentary."#,
        location_phrase(location)
    );

    (system, diagnosis.to_string())
}

/// Correction stage: alternatives for a word the clinician flagged.
pub fn build_correction_prompt(word: &str, context: &str) -> (String, String) {
    let system = r#"You are an AI language assistant specialized in medical transcription.
An unclear word from a transcript is given along with its surrounding context.
Provide three correction suggestions that are phonetically similar and medically appropriate.
Return your answer as a JSON array of strings with no extra commentary."#;

    let user = format!(
        "Unclear word: \"{}\"\nTranscript context:\n\"{}\"",
        word, context
    );

    (system.to_string(), user)
}

/// How the patient's position is described to the clinic advisor
fn location_phrase(location: Option<&GeoPoint>) -> String {
    match location {
        Some(point) => format!("latitude {}, longitude {}", point.latitude, point.longitude),
        None => "a generic urban area".to_string(),
    }
}
