//! Provider error types.

use std::error::Error as _;

use crate::domain::InvalidFare;

/// Errors from the external data providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API
    #[error("rate limited by {provider}")]
    RateLimited { provider: &'static str },

    /// Invalid API key or unauthorized
    #[error("unauthorized by {provider}: check the API key")]
    Unauthorized { provider: &'static str },

    /// Response body did not have the expected shape
    #[error("malformed response: {message}")]
    Malformed { message: String },

    /// Fare string was not a two-decimal amount
    #[error(transparent)]
    InvalidFare(#[from] InvalidFare),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, connection failures, bodies cut off mid-transfer, 429s and
    /// 5xx responses are transient.
    /// Authentication failures, other 4xx responses and unexpected payloads
    /// will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || is_interrupted_body(e)
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::RateLimited { .. } => true,
            ProviderError::Unauthorized { .. }
            | ProviderError::Malformed { .. }
            | ProviderError::InvalidFare(_) => false,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ProviderError::Malformed {
            message: message.into(),
        }
    }
}

/// Whether the response body stopped arriving before it was complete.
///
/// Reading a truncated body surfaces as a decode error wrapping the body or
/// I/O error underneath, so the source chain is searched for either.
fn is_interrupted_body(e: &reqwest::Error) -> bool {
    if e.is_body() {
        return true;
    }
    if !e.is_decode() {
        return false;
    }

    let mut source = e.source();
    while let Some(cause) = source {
        if cause.is::<std::io::Error>()
            || cause
                .downcast_ref::<reqwest::Error>()
                .is_some_and(|inner| inner.is_body())
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Fare;

    #[test]
    fn error_display() {
        let err = ProviderError::Api {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "API error 503: Service Unavailable");

        let err = ProviderError::RateLimited { provider: "graphhopper" };
        assert_eq!(err.to_string(), "rate limited by graphhopper");

        let err = ProviderError::malformed("missing root.trip.fare");
        assert_eq!(err.to_string(), "malformed response: missing root.trip.fare");
    }

    #[test]
    fn server_errors_are_transient() {
        let err = ProviderError::Api {
            status: 502,
            message: String::new(),
        };
        assert!(err.is_transient());
        assert!(ProviderError::RateLimited { provider: "bart" }.is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = ProviderError::Api {
            status: 400,
            message: "bad point".into(),
        };
        assert!(!err.is_transient());
        assert!(!ProviderError::Unauthorized { provider: "bart" }.is_transient());
        assert!(!ProviderError::malformed("nope").is_transient());

        let err: ProviderError = Fare::parse("2.5").unwrap_err().into();
        assert!(!err.is_transient());
    }
}
