//! HTTP plumbing shared by the providers: client construction, status and
//! transport error mapping, and credential-safe error text.

use std::time::Duration;

use pipeline::GenerationError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};

/// Longest provider error text passed through verbatim.
const MAX_ERROR_CHARS: usize = 200;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, GenerationError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::NotConfigured(format!("HTTP client: {e}")))
}

/// Masks an API key for `Debug` output.
pub(crate) fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 || !key.is_ascii() {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

/// Keeps provider error text short and free of anything key-like.
pub(crate) fn sanitize_error(body: &str, api_key: &str) -> String {
    let lower = body.to_lowercase();
    if lower.contains("api key")
        || lower.contains("api_key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "authentication failed; check the configured API key".to_string();
    }
    let mut text: String = body.trim().chars().take(MAX_ERROR_CHARS).collect();
    if !api_key.is_empty() && text.contains(api_key) {
        text = text.replace(api_key, "[REDACTED]");
    }
    text
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub(crate) fn map_transport(err: &reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::Transport(err.to_string())
    }
}

/// Turns a non-success response into the matching [`GenerationError`].
pub(crate) async fn map_status(response: Response, api_key: &str) -> GenerationError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return GenerationError::RateLimited {
            retry_after: retry_after(response.headers()),
        };
    }
    let body = response.text().await.unwrap_or_default();
    GenerationError::Provider {
        status: status.as_u16(),
        message: sanitize_error(&body, api_key),
    }
}
