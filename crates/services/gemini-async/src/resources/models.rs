use crate::{
    client::Client,
    config::Config,
    error::GeminiError,
    types::generate::{GenerateContentRequest, GenerateContentResponse},
};

/// API resource for the `models/{model}:*` endpoints
pub struct Models<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> Models<'c, C> {
    /// Creates a new Models resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// Generate content with the given model
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API returns a non-2xx status,
    /// or the body cannot be parsed.
    pub async fn generate_content(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        self.client.post(&generate_path(model)?, req).await
    }

    /// Generate content and return the undecoded success body
    ///
    /// Useful when the caller owns decoding and wants to classify malformed
    /// payloads itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API returns a non-2xx status.
    pub async fn generate_content_raw(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<bytes::Bytes, GeminiError> {
        self.client.post_raw(&generate_path(model)?, req).await
    }
}

fn generate_path(model: &str) -> Result<String, GeminiError> {
    let model = model.trim().trim_start_matches("models/");
    if model.is_empty() || model.contains(['/', '?', '#']) {
        return Err(GeminiError::Config(format!("Invalid model id: {model:?}")));
    }
    Ok(format!("{model}:generateContent"))
}

// Add accessor to client
impl<C: Config> crate::Client<C> {
    /// Returns the Models API resource
    #[must_use]
    pub const fn models(&self) -> Models<'_, C> {
        Models::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_accepts_bare_and_prefixed_ids() {
        assert_eq!(
            generate_path("gemini-2.5-flash").unwrap(),
            "gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            generate_path("models/gemini-2.5-pro").unwrap(),
            "gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn path_rejects_empty_or_injected_ids() {
        assert!(generate_path("  ").is_err());
        assert!(generate_path("a/b").is_err());
        assert!(generate_path("a?key=x").is_err());
    }
}
