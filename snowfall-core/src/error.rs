use reqwest::StatusCode;
use thiserror::Error;

use crate::provider::ProviderId;

/// Errors returned by forecast adapters, the cache and the repository.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Transport level failure: DNS, connect, timeout, body read.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response that carried no recognizable provider error payload.
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// Well-formed error payload returned by the provider.
    #[error("Provider error {code}: {message}")]
    Api { code: String, message: String },

    #[error("No API key configured for provider '{0}'")]
    MissingApiKey(ProviderId),

    /// Unexpected payload shape or any other failure.
    #[error("Unexpected error: {0}")]
    Unknown(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl ForecastError {
    /// Whether a scheduler should try the sweep again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http { .. })
    }
}

impl From<rusqlite::Error> for ForecastError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unknown(format!("Failed to parse response: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_failures_are_retryable() {
        let err = ForecastError::Http {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "busy".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn api_and_unknown_failures_are_terminal() {
        let api = ForecastError::Api {
            code: "401".into(),
            message: "Invalid API key".into(),
        };
        assert!(!api.is_retryable());
        assert!(!ForecastError::Unknown("boom".into()).is_retryable());
        assert!(!ForecastError::MissingApiKey(ProviderId::TomorrowIo).is_retryable());
        assert!(!ForecastError::Cache("locked".into()).is_retryable());
    }

    #[test]
    fn parse_errors_map_to_unknown() {
        let err: ForecastError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ForecastError::Unknown(_)));
    }
}
