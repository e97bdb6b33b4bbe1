//! Shared HTTP plumbing for the provider clients.

use std::time::Duration;

use reqwest::StatusCode;

use super::error::ProviderError;

/// Maximum number of body characters echoed into error messages.
const ERROR_BODY_CHARS: usize = 500;

/// Build an HTTP client with the given request timeout.
pub(super) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(http)
}

/// Send a request and return the body of a successful response.
///
/// Status codes are mapped onto [`ProviderError`] so the caller can tell
/// transient failures from permanent ones.
pub(super) async fn fetch_body(
    request: reqwest::RequestBuilder,
    provider: &'static str,
) -> Result<String, ProviderError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::Unauthorized { provider });
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited { provider });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message: truncate(&body),
        });
    }

    Ok(response.text().await?)
}

/// Decode a JSON body, keeping a prefix of the body in the error.
pub(super) fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(format!("{e} (body: {})", truncate(body))))
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_CHARS).collect()
}
