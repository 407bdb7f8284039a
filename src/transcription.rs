//! Speech-to-text collaborator.
//!
//! The session only sees [`TranscriptionService`]; [`TranscriptionClient`] is
//! the HTTP implementation talking to the clinic's transcription server
//! (`POST {base}/transcribe-audio`, multipart field `audio`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::audio::AudioClip;
use crate::retry::{
    calculate_backoff, is_retryable_error, is_retryable_status, validate_base_url,
    DEFAULT_MAX_RETRIES,
};

/// Default timeout for transcription requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TranscriptionError {
    #[error("No audio to transcribe")]
    EmptyAudio,
    #[error("{0}")]
    InvalidUrl(String),
    #[error("Failed to reach transcription server: {0}")]
    Request(String),
    #[error("Transcription server error: {status} - {detail}")]
    Server { status: u16, detail: String },
    #[error("Transcription failed: {0}")]
    Rejected(String),
    #[error("Invalid transcription response: {0}")]
    InvalidResponse(String),
}

/// Turns a recorded clip into text.
#[async_trait(?Send)]
pub trait TranscriptionService {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, TranscriptionError>;
}

/// Reply body of `/transcribe-audio`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl TranscriptionResponse {
    fn into_text(self) -> Result<String, TranscriptionError> {
        if self.success {
            Ok(self.transcription.unwrap_or_default())
        } else {
            Err(TranscriptionError::Rejected(
                self.detail
                    .unwrap_or_else(|| "Transcription failed".to_string()),
            ))
        }
    }
}

/// Health check response from the transcription server
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Error body FastAPI-style servers send with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.to_string(),
    }
}

/// HTTP client for the transcription server
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    client: reqwest::Client,
    base_url: String,
    language: String,
    max_retries: u32,
}

impl TranscriptionClient {
    /// Create a new transcription client with URL validation
    pub fn new(base_url: &str, language: &str) -> Result<Self, TranscriptionError> {
        let base_url = validate_base_url(base_url, "Transcription server")
            .map_err(TranscriptionError::InvalidUrl)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TranscriptionError::Request(format!("Failed to create HTTP client: {}", e)))?;

        info!("TranscriptionClient created for {}", base_url);

        Ok(Self {
            client,
            base_url,
            language: language.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the attempt count (minimum one attempt)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check server health via /health endpoint
    pub async fn check_health(&self) -> Result<HealthResponse, TranscriptionError> {
        let url = format!("{}/health", self.base_url);
        debug!("Checking transcription server health at {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Server {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        response
            .json::<HealthResponse>()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))
    }

    fn build_form(&self, clip: &AudioClip) -> Result<reqwest::multipart::Form, TranscriptionError> {
        let file_part = reqwest::multipart::Part::bytes(clip.bytes().to_vec())
            .file_name("recording.wav")
            .mime_str(clip.mime_type())
            .map_err(|e| TranscriptionError::Request(format!("Failed to create file part: {}", e)))?;

        let mut form = reqwest::multipart::Form::new().part("audio", file_part);
        if self.language != "auto" && !self.language.is_empty() {
            form = form.text("language", self.language.clone());
        }
        Ok(form)
    }
}

#[async_trait(?Send)]
impl TranscriptionService for TranscriptionClient {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, TranscriptionError> {
        if clip.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let url = format!("{}/transcribe-audio", self.base_url);
        debug!(
            "Transcribing {} bytes ({}ms) via {}",
            clip.bytes().len(),
            clip.duration_ms(),
            url
        );

        let mut last_error = TranscriptionError::Request("no attempts made".to_string());

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt - 1);
                warn!(
                    "Transcribe attempt {} failed, retrying in {:?}",
                    attempt, backoff
                );
                tokio::time::sleep(backoff).await;
            }

            let form = self.build_form(clip)?;

            match self.client.post(&url).multipart(form).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let result = response
                            .json::<TranscriptionResponse>()
                            .await
                            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;
                        let text = result.into_text()?;
                        debug!("Transcription result: {} chars", text.len());
                        return Ok(text);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = TranscriptionError::Server {
                        status: status.as_u16(),
                        detail: error_detail(&body),
                    };
                    if is_retryable_status(status) {
                        last_error = err;
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = TranscriptionError::Request(e.to_string());
                    if is_retryable_error(&e) {
                        last_error = err;
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        error!(
            "Transcribe failed after {} attempts: {}",
            self.max_retries, last_error
        );
        Err(last_error)
    }
}
