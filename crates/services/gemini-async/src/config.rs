use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Default Gemini API base URL (model resources live directly under it)
pub const GEMINI_DEFAULT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Query parameter carrying the API key
pub const QUERY_KEY: &str = "key";
/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the Gemini client
///
/// Debug output automatically redacts `api_key` via [`SecretString`].
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    api_base: String,
    api_key: Option<SecretString>,
    request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(SecretString::from);

        let api_base = std::env::var("GEMINI_BASE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| GEMINI_DEFAULT_BASE.into());

        Self {
            api_base,
            api_key,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl GeminiConfig {
    /// Creates a new configuration with default settings
    ///
    /// Attempts to read from environment variables:
    /// - `GEMINI_API_KEY` for API key authentication
    /// - `GEMINI_BASE_URL` for custom API base URL
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the API key from an already-wrapped secret
    #[must_use]
    pub fn with_secret_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the timeout applied to every HTTP request
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the configured API base URL
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the per-request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Configuration trait for the Gemini client
///
/// Implement this trait to provide custom authentication and API configuration.
pub trait Config: Send + Sync {
    /// Returns HTTP headers to include in requests
    ///
    /// # Errors
    ///
    /// Returns an error if header values contain invalid characters.
    fn headers(&self) -> Result<HeaderMap, crate::error::GeminiError>;

    /// Constructs the full URL for an API endpoint
    fn url(&self, path: &str) -> String;

    /// Returns query parameters to include in requests
    fn query(&self) -> Vec<(&str, &str)>;

    /// Validates that authentication credentials are present.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication is not properly configured.
    fn validate_auth(&self) -> Result<(), crate::error::GeminiError>;
}

impl Config for GeminiConfig {
    fn headers(&self) -> Result<HeaderMap, crate::error::GeminiError> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(h)
    }

    fn url(&self, path: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn query(&self) -> Vec<(&str, &str)> {
        match &self.api_key {
            Some(secret) => vec![(QUERY_KEY, secret.expose_secret().trim())],
            None => vec![],
        }
    }

    fn validate_auth(&self) -> Result<(), crate::error::GeminiError> {
        match &self.api_key {
            Some(secret) if !secret.expose_secret().trim().is_empty() => Ok(()),
            _ => Err(crate::error::GeminiError::Config(
                "Missing Gemini credentials: set GEMINI_API_KEY environment variable".into(),
            )),
        }
    }
}
