//! Generative extraction of triage vitals and symptoms from free text.
//!
//! [`ExtractionClient`] asks the LLM router (OpenAI-compatible chat
//! completions) for a JSON blob and recovers it from whatever prose or code
//! fences the model wraps around it.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::parser::celsius_from_unitless;
use crate::retry::{
    calculate_backoff, is_retryable_error, is_retryable_status, validate_base_url,
    DEFAULT_MAX_RETRIES,
};
use crate::symptoms::Symptom;
use crate::vitals::{VitalField, VitalsRecord};

/// Default timeout for extraction requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Value for the X-Clinic-Task header
pub const TRIAGE_EXTRACTION_TASK: &str = "triage_extraction";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Nothing to extract from")]
    EmptyInput,
    #[error("{0}")]
    InvalidUrl(String),
    #[error("Failed to connect to LLM router: {0}")]
    Request(String),
    #[error("LLM router returned error: {status} - {detail}")]
    Server { status: u16, detail: String },
    #[error("No response choices returned")]
    NoChoices,
    #[error("Extraction rejected: {0}")]
    Rejected(String),
    #[error("Failed to parse extraction: {0}")]
    InvalidResponse(String),
}

/// Accepts a number, a numeric string, or null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%' || c == '°')
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn lenient_symptoms<'de, D>(deserializer: D) -> Result<BTreeMap<Symptom, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<Symptom, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(symptom, value)| {
            let present = match value {
                serde_json::Value::Bool(b) => b,
                serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
                serde_json::Value::String(s) => {
                    matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
                }
                _ => false,
            };
            (symptom, present)
        })
        .collect())
}

/// Vitals as extracted by the model; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedVitals {
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub hr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub bp_systolic: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub bp_diastolic: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub rr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub spo2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub gcs_e: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub gcs_v: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub gcs_m: Option<f64>,
    /// Capillary refill time in seconds
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub capillary_refill: Option<f64>,
}

impl ExtractedVitals {
    /// The subset that maps onto the vitals record (capillary refill does not).
    ///
    /// Temperatures come back without a unit; anything above 50 is read as
    /// Fahrenheit and stored in Celsius.
    pub fn to_record(&self) -> VitalsRecord {
        VitalsRecord {
            hr: self.hr,
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            rr: self.rr,
            spo2: self.spo2,
            temperature: self.temperature.map(celsius_from_unitless),
            gcs_e: self.gcs_e,
            gcs_v: self.gcs_v,
            gcs_m: self.gcs_m,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_record().is_empty() && self.capillary_refill.is_none()
    }
}

/// Machine-extracted data pending clinician review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionBatch {
    #[serde(default)]
    pub vitals: ExtractedVitals,
    #[serde(default, deserialize_with = "lenient_symptoms")]
    pub symptoms: BTreeMap<Symptom, bool>,
}

impl ExtractionBatch {
    /// Symptoms flagged present, in clinical order.
    pub fn present_symptoms(&self) -> impl Iterator<Item = &Symptom> {
        self.symptoms
            .iter()
            .filter(|(_, present)| **present)
            .map(|(symptom, _)| symptom)
    }

    /// Copy every present vital into `record`, leaving absent ones untouched.
    pub fn merge_into(&self, record: &mut VitalsRecord) {
        let extracted = self.vitals.to_record();
        for field in VitalField::ALL {
            if let Some(value) = extracted.get(field) {
                record.set(field, Some(value));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vitals.is_empty() && self.present_symptoms().next().is_none()
    }
}

/// Turns free clinical text into an extraction batch.
#[async_trait(?Send)]
pub trait ExtractionService {
    async fn extract(&self, text: &str) -> Result<ExtractionBatch, ExtractionError>;
}

/// OpenAI-compatible chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for the LLM router
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    client_id: String,
    model: String,
    max_retries: u32,
}

impl ExtractionClient {
    /// Create a new extraction client with URL validation
    ///
    /// # Arguments
    /// * `base_url` - The LLM router URL (e.g., "http://localhost:4000")
    /// * `api_key` - API key for authentication (may be empty)
    /// * `client_id` - Client identifier for the X-Client-Id header
    /// * `model` - Model used for extraction
    pub fn new(
        base_url: &str,
        api_key: &str,
        client_id: &str,
        model: &str,
    ) -> Result<Self, ExtractionError> {
        let base_url =
            validate_base_url(base_url, "LLM router").map_err(ExtractionError::InvalidUrl)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ExtractionError::Request(format!("Failed to create HTTP client: {}", e)))?;

        info!("ExtractionClient created for {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            client_id: client_id.to_string(),
            model: model.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build authentication headers for requests
    fn auth_headers(&self, task: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if !self.api_key.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers.insert(
            "X-Client-Id",
            HeaderValue::from_str(&self.client_id)
                .unwrap_or_else(|_| HeaderValue::from_static("vitalscribe")),
        );

        headers.insert(
            "X-Clinic-Task",
            HeaderValue::from_str(task).unwrap_or_else(|_| HeaderValue::from_static("unknown")),
        );

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        headers
    }

    /// Run one chat completion with retry logic
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_content: &str,
        task: &str,
    ) -> Result<String, ExtractionError> {
        if user_content.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("Generating with model {} at {}", self.model, url);

        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_content.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        };

        let mut last_error = ExtractionError::Request("no attempts made".to_string());

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt - 1);
                warn!(
                    "LLM generate attempt {} failed, retrying in {:?}",
                    attempt, backoff
                );
                tokio::time::sleep(backoff).await;
            }

            match self
                .client
                .post(&url)
                .headers(self.auth_headers(task))
                .json(&request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let chat_response = response
                            .json::<ChatCompletionResponse>()
                            .await
                            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;
                        return chat_response
                            .choices
                            .into_iter()
                            .next()
                            .map(|choice| choice.message.content)
                            .ok_or(ExtractionError::NoChoices);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = ExtractionError::Server {
                        status: status.as_u16(),
                        detail: body,
                    };
                    if is_retryable_status(status) {
                        last_error = err;
                        continue;
                    }
                    error!("LLM generate failed: {}", err);
                    return Err(err);
                }
                Err(e) => {
                    let err = ExtractionError::Request(e.to_string());
                    if is_retryable_error(&e) {
                        last_error = err;
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        error!(
            "LLM generate failed after {} attempts: {}",
            self.max_retries, last_error
        );
        Err(last_error)
    }
}

#[async_trait(?Send)]
impl ExtractionService for ExtractionClient {
    async fn extract(&self, text: &str) -> Result<ExtractionBatch, ExtractionError> {
        info!("Extracting triage data from {}-char text", text.len());
        let response = self
            .generate(&build_extraction_prompt(), text, TRIAGE_EXTRACTION_TASK)
            .await?;
        parse_extraction_response(&response)
    }
}

/// System prompt describing the expected JSON shape.
pub fn build_extraction_prompt() -> String {
    let vital_keys: Vec<&str> = VitalField::ALL
        .iter()
        .map(|f| f.key())
        .chain(std::iter::once("capillary_refill"))
        .collect();
    let symptom_keys: Vec<&str> = Symptom::KNOWN.iter().map(|s| s.key()).collect();

    format!(
        "You extract triage data from an emergency clinician's dictation.\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"vitals\": {{...}}, \"symptoms\": {{...}}}}\n\n\
         \"vitals\" may contain these keys: {}.\n\
         Use numbers only. Temperature in Celsius, capillary_refill in seconds. \
         Use null for anything not stated; never guess.\n\n\
         \"symptoms\" maps these keys to true or false: {}.\n\
         Only mark a symptom true if it is explicitly described.",
        vital_keys.join(", "),
        symptom_keys.join(", ")
    )
}

/// Strip code fences and surrounding prose, returning the outermost object.
fn extract_json_from_response(response: &str) -> &str {
    let text = response.trim();
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Recover an [`ExtractionBatch`] from a model reply.
///
/// Accepts a bare batch or a `{success, data}` wrapper.
pub fn parse_extraction_response(response: &str) -> Result<ExtractionBatch, ExtractionError> {
    let json_str = extract_json_from_response(response);
    debug!("Extracted JSON for parsing: {} chars", json_str.len());

    let mut value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

    if let Some(success) = value.get("success").and_then(|s| s.as_bool()) {
        if !success {
            let detail = value
                .get("detail")
                .or_else(|| value.get("error"))
                .and_then(|d| d.as_str())
                .unwrap_or("Extraction failed")
                .to_string();
            return Err(ExtractionError::Rejected(detail));
        }
        if let Some(data) = value.get_mut("data") {
            value = data.take();
        }
    }

    serde_json::from_value(value).map_err(|e| ExtractionError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new() {
        let client = ExtractionClient::new("http://localhost:4000/", "key", "vitalscribe", "fast-model")
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:4000");
        assert_eq!(client.max_retries, DEFAULT_MAX_RETRIES);

        assert!(matches!(
            ExtractionClient::new("ftp://localhost:4000", "", "id", "m"),
            Err(ExtractionError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_auth_headers() {
        let client =
            ExtractionClient::new("http://localhost:4000", "secret", "vitalscribe", "fast-model")
                .unwrap();
        let headers = client.auth_headers(TRIAGE_EXTRACTION_TASK);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
        assert_eq!(headers.get("X-Client-Id").unwrap(), "vitalscribe");
        assert_eq!(headers.get("X-Clinic-Task").unwrap(), "triage_extraction");

        let anonymous = ExtractionClient::new("http://localhost:4000", "", "vitalscribe", "m").unwrap();
        assert!(anonymous.auth_headers("x").get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_parse_bare_batch() {
        let batch = parse_extraction_response(
            r#"{"vitals": {"hr": 110, "bp_systolic": 130, "bp_diastolic": 90}, "symptoms": {"chest_pain": true, "fever": false}}"#,
        )
        .unwrap();
        assert_eq!(batch.vitals.hr, Some(110.0));
        assert_eq!(batch.vitals.bp_diastolic, Some(90.0));
        assert!(batch.vitals.spo2.is_none());
        let present: Vec<&Symptom> = batch.present_symptoms().collect();
        assert_eq!(present, vec![&Symptom::ChestPain]);
    }

    #[test]
    fn test_parse_fenced_reply_with_prose() {
        let reply = "Here is the extraction:\n```json\n{\"vitals\": {\"spo2\": 88}, \"symptoms\": {}}\n```\nLet me know!";
        let batch = parse_extraction_response(reply).unwrap();
        assert_eq!(batch.vitals.spo2, Some(88.0));
    }

    #[test]
    fn test_parse_wrapped_response() {
        let batch = parse_extraction_response(
            r#"{"success": true, "data": {"vitals": {"temperature": "38.3"}, "symptoms": {"sepsis": "true"}}}"#,
        )
        .unwrap();
        assert_eq!(batch.vitals.temperature, Some(38.3));
        assert_eq!(batch.symptoms.get(&Symptom::Sepsis), Some(&true));

        let err = parse_extraction_response(r#"{"success": false, "detail": "No clinical content"}"#)
            .unwrap_err();
        assert_eq!(err, ExtractionError::Rejected("No clinical content".to_string()));
    }

    #[test]
    fn test_parse_lenient_values() {
        let batch = parse_extraction_response(
            r#"{"vitals": {"hr": "110 bpm", "spo2": "88%", "rr": null, "gcs_e": "unknown", "capillary_refill": 3}, "symptoms": {"cyanosis": 1, "apnea": 0, "new_thing": "yes"}}"#,
        )
        .unwrap();
        assert_eq!(batch.vitals.hr, Some(110.0));
        assert_eq!(batch.vitals.spo2, Some(88.0));
        assert!(batch.vitals.rr.is_none());
        assert!(batch.vitals.gcs_e.is_none());
        assert_eq!(batch.vitals.capillary_refill, Some(3.0));
        assert_eq!(batch.symptoms.get(&Symptom::Cyanosis), Some(&true));
        assert_eq!(batch.symptoms.get(&Symptom::Apnea), Some(&false));
        assert_eq!(batch.symptoms.get(&Symptom::from_key("new_thing")), Some(&true));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(
            parse_extraction_response("I could not find any vitals."),
            Err(ExtractionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_merge_into_keeps_existing_values() {
        let mut record = VitalsRecord {
            hr: Some(80.0),
            rr: Some(16.0),
            ..Default::default()
        };
        let batch = ExtractionBatch {
            vitals: ExtractedVitals {
                hr: Some(110.0),
                spo2: Some(88.0),
                capillary_refill: Some(3.0),
                ..Default::default()
            },
            symptoms: BTreeMap::new(),
        };
        batch.merge_into(&mut record);
        assert_eq!(record.hr, Some(110.0));
        assert_eq!(record.rr, Some(16.0));
        assert_eq!(record.spo2, Some(88.0));
    }

    #[test]
    fn test_merge_into_converts_fahrenheit() {
        let mut record = VitalsRecord::default();
        let batch = parse_extraction_response(r#"{"vitals": {"temperature": 101}}"#).unwrap();
        batch.merge_into(&mut record);
        assert_eq!(record.temperature, Some(38.3));

        let batch = parse_extraction_response(r#"{"vitals": {"temperature": "37.9"}}"#).unwrap();
        batch.merge_into(&mut record);
        assert_eq!(record.temperature, Some(37.9));
    }

    #[test]
    fn test_batch_is_empty() {
        assert!(ExtractionBatch::default().is_empty());
        let mut batch = ExtractionBatch::default();
        batch.symptoms.insert(Symptom::Fever, false);
        assert!(batch.is_empty());
        batch.symptoms.insert(Symptom::Fever, true);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_prompt_lists_keys() {
        let prompt = build_extraction_prompt();
        assert!(prompt.contains("bp_systolic"));
        assert!(prompt.contains("capillary_refill"));
        assert!(prompt.contains("chest_pain_with_hypotension"));
        assert!(prompt.contains("abdominal_pain_mild"));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_input() {
        let client = ExtractionClient::new("http://localhost:4000", "", "vitalscribe", "m").unwrap();
        assert_eq!(
            client.extract("   ").await.unwrap_err(),
            ExtractionError::EmptyInput
        );
    }
}
