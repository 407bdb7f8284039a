//! Retry policy shared by the HTTP collaborators.

use std::time::Duration;

/// Default number of retry attempts for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;

/// Maximum backoff delay
const MAX_BACKOFF_MS: u64 = 5000;

/// Check if a reqwest error is retryable (transient network issues)
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    if let Some(status) = err.status() {
        return is_retryable_status(status);
    }
    false
}

/// Check if an HTTP status code is retryable
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Calculate backoff delay with exponential increase and jitter
pub fn calculate_backoff(attempt: u32) -> Duration {
    let base_delay = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    let capped_delay = base_delay.min(MAX_BACKOFF_MS);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_millis() as u64)
        % 100;
    Duration::from_millis(capped_delay + jitter)
}

/// Reject anything but plain http(s) URLs without embedded credentials.
///
/// Returns the URL with trailing slashes removed.
pub fn validate_base_url(base_url: &str, service: &str) -> Result<String, String> {
    let cleaned_url = base_url.trim_end_matches('/');

    let parsed = reqwest::Url::parse(cleaned_url)
        .map_err(|e| format!("Invalid {} URL '{}': {}", service, cleaned_url, e))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!(
            "{} URL must use http or https scheme, got: {}",
            service,
            parsed.scheme()
        ));
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(format!("{} URL must not contain credentials", service));
    }

    Ok(cleaned_url.to_string())
}
