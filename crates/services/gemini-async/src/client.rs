use secrecy::SecretString;
use serde::{Serialize, de::DeserializeOwned};

use crate::{config::Config, error::GeminiError};

/// Gemini API client
///
/// The client is generic over a [`Config`] implementation that provides authentication
/// and API configuration. Requests are sent exactly once; callers that rotate
/// credentials decide what happens after a failure.
#[derive(Debug, Clone)]
pub struct Client<C: Config> {
    http: reqwest::Client,
    config: C,
}

impl Client<crate::config::GeminiConfig> {
    /// Creates a new client with default configuration
    ///
    /// Uses environment variables for authentication:
    /// - `GEMINI_API_KEY` for API key authentication
    /// - `GEMINI_BASE_URL` for custom API base URL
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(crate::config::GeminiConfig::new())
    }

    /// Creates a new client with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the reqwest client cannot be built.
    #[must_use]
    pub fn with_config(config: crate::config::GeminiConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(config.request_timeout())
            .build()
            .expect("reqwest client");
        Self { http, config }
    }

    /// Returns a client that shares this client's connection pool but
    /// authenticates with a different key
    #[must_use]
    pub fn with_credential(&self, key: SecretString) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone().with_secret_key(key),
        }
    }
}

impl Default for Client<crate::config::GeminiConfig> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Config> Client<C> {
    /// Returns a reference to the client's configuration
    #[must_use]
    pub const fn config(&self) -> &C {
        &self.config
    }

    pub(crate) async fn post<I, O>(&self, path: &str, body: &I) -> Result<O, GeminiError>
    where
        I: Serialize + Send + Sync + ?Sized,
        O: DeserializeOwned,
    {
        let bytes = self.post_raw(path, body).await?;
        let resp: O =
            serde_json::from_slice(&bytes).map_err(|e| crate::error::map_deser(&e, &bytes))?;
        Ok(resp)
    }

    /// Sends a POST request and returns the raw success body.
    ///
    /// Non-2xx responses are turned into [`GeminiError::Api`].
    pub(crate) async fn post_raw<I>(&self, path: &str, body: &I) -> Result<bytes::Bytes, GeminiError>
    where
        I: Serialize + Send + Sync + ?Sized,
    {
        // Validate auth before any request
        self.config.validate_auth()?;

        let headers = self.config.headers()?;
        let request = self
            .http
            .post(self.config.url(path))
            .headers(headers)
            .query(&self.config.query())
            .json(body)
            .build()?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(GeminiError::Reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(GeminiError::Reqwest)?;

        if status.is_success() {
            tracing::trace!(status = status.as_u16(), len = bytes.len(), "gemini response");
            return Ok(bytes);
        }

        Err(crate::error::deserialize_api_error(status, &bytes))
    }
}
