use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when using the Gemini API client
#[derive(Debug, Error)]
pub enum GeminiError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// API error returned by Gemini
    #[error("API error: {0:?}")]
    Api(ApiErrorObject),

    /// Configuration error (e.g., missing credentials)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(String),
}

/// API error object from Gemini
///
/// Gemini wraps errors as `{"error": {"code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorObject {
    /// HTTP status code
    #[serde(default)]
    pub code: Option<u16>,
    /// Human-readable error message
    #[serde(default)]
    pub message: String,
    /// Canonical status string (e.g. `RESOURCE_EXHAUSTED`)
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorObject,
}

impl GeminiError {
    /// Returns the HTTP status carried by this error, if any
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api(obj) => obj.code,
            Self::Reqwest(e) => e.status().map(|s| s.as_u16()),
            Self::Config(_) | Self::Serde(_) => None,
        }
    }

    /// Determines if this error signals quota exhaustion for the credential
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Api(obj) => {
                obj.code.is_some_and(is_rate_limit_status)
                    || obj.status.as_deref() == Some("RESOURCE_EXHAUSTED")
            }
            Self::Reqwest(e) => e.status().is_some_and(|s| is_rate_limit_status(s.as_u16())),
            Self::Config(_) | Self::Serde(_) => false,
        }
    }

    /// Determines if this error was a client-side timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Reqwest(e) if e.is_timeout())
    }
}

/// Determines if an HTTP status code means the credential is rate limited
#[must_use]
pub const fn is_rate_limit_status(code: u16) -> bool {
    code == 429
}

/// Maps a serde deserialization error to a `GeminiError` with context
#[must_use]
pub fn map_deser(e: &serde_json::Error, body: &[u8]) -> GeminiError {
    let snippet = String::from_utf8_lossy(&body[..body.len().min(400)]).to_string();
    GeminiError::Serde(format!("{e}: {snippet}"))
}

/// Deserializes an API error from the response body
///
/// Attempts to parse the error envelope as JSON, falling back to plain text on failure.
#[must_use]
pub fn deserialize_api_error(status: StatusCode, body: &[u8]) -> GeminiError {
    let code = Some(status.as_u16());

    if let Ok(envelope) = serde_json::from_slice::<ApiErrorEnvelope>(body) {
        let mut obj = envelope.error;
        obj.code = code;
        return GeminiError::Api(obj);
    }

    // Server may return plain text or HTML on 5xx; cap body to avoid log/memory bloat
    GeminiError::Api(ApiErrorObject {
        code,
        message: String::from_utf8_lossy(&body[..body.len().min(400)]).into_owned(),
        status: Some(format!("http_{}", status.as_u16())),
    })
}
