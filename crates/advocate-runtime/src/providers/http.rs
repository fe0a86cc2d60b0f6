//! HTTP plumbing shared by the hosted providers.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::ProviderError;

/// Build the client a provider keeps for its lifetime.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client unavailable: {}", e)))
}

/// Map a send failure.
pub(crate) fn send_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::HttpError(error.to_string())
    }
}

/// Turn a response into its decoded body, or the matching provider error.
///
/// `error_message` pulls the human-readable message out of the provider's
/// error envelope; the raw body is used when it returns `None`.
pub(crate) async fn decode<T, F>(response: Response, error_message: F) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
    F: Fn(&serde_json::Value) -> Option<String>,
{
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            retry_after: retry_after(response.headers()),
        });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::AuthError);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or(body);

        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
