//! Shared HTTP plumbing for web-backed metadata providers.
//!
//! Builds the [`reqwest::Client`] each provider owns and classifies
//! transport failures into [`ProviderError`] kinds.

use std::time::Duration;

use folio_metadata::ProviderError;
use serde::de::DeserializeOwned;

use crate::config::HttpProviderConfig;

/// Longest response-body excerpt carried in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Build a [`reqwest::Client`] for one provider.
///
/// The client applies the configured per-request timeout and user agent.
///
/// # Errors
///
/// Returns [`ProviderError::Provider`] if the client cannot be constructed.
pub fn build_client(config: &HttpProviderConfig) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ProviderError::Provider(format!("failed to build HTTP client: {e}")))
}

/// Join `base_url` and `path` without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Send `request` and decode a JSON body.
///
/// - connect and transport failures, non-2xx statuses: [`ProviderError::Network`]
/// - request timeouts: [`ProviderError::Timeout`]
/// - bodies that are not the expected JSON: [`ProviderError::Parse`]
pub async fn get_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(map_transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_error(status, &body));
    }

    let bytes = response.bytes().await.map_err(map_transport_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::Parse(format!("unexpected response body: {e}")))
}

/// Classify a reqwest error.
pub fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if err.is_decode() {
        ProviderError::Parse(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Map a non-success HTTP status to a typed error.
pub fn map_http_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let detail = if body.trim().is_empty() {
        "no response body".to_owned()
    } else {
        body.chars().take(MAX_ERROR_BODY_CHARS).collect()
    };
    match status.as_u16() {
        408 | 504 => ProviderError::Timeout(format!("HTTP {status}: {detail}")),
        _ => ProviderError::Network(format!("HTTP {status}: {detail}")),
    }
}
