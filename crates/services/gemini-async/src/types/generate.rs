//! Types for the `models/{model}:generateContent` endpoint

use serde::{Deserialize, Serialize};

use super::content::{Content, Part};

/// MIME type requesting JSON structured output
pub const JSON_MIME_TYPE: &str = "application/json";

/// Request body for `POST {model}:generateContent`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation contents (a single user turn for one-shot tasks)
    pub contents: Vec<Content>,

    /// Generation parameters, including structured output configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Creates a single-turn request from a text prompt
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_parts(vec![Part::text(text)])
    }

    /// Creates a single-turn request from parts
    #[must_use]
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content::from_parts(parts)],
            generation_config: None,
        }
    }

    /// Requests JSON output constrained by `schema`
    #[must_use]
    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        let config = self.generation_config.get_or_insert_with(Default::default);
        config.response_mime_type = Some(JSON_MIME_TYPE.into());
        config.response_schema = Some(schema);
        self
    }

    /// Sets the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation_config
            .get_or_insert_with(Default::default)
            .temperature = Some(temperature);
        self
    }
}

/// Generation parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Output MIME type (`application/json` for structured output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,

    /// OpenAPI-subset schema the JSON output must follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response from `POST {model}:generateContent`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate completions
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Feedback on the prompt (present when the prompt was blocked)
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,

    /// Token accounting
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,

    /// Model version that served the request
    #[serde(default)]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, concatenated across its text parts
    #[must_use]
    pub fn first_text(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(Content::text)
    }

    /// Reason the prompt was blocked, if any
    #[must_use]
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }
}

/// A candidate completion
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped (`STOP`, `MAX_TOKENS`, `SAFETY`, ...)
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Candidate index
    #[serde(default)]
    pub index: Option<u32>,
}

/// Prompt feedback
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Block reason (`SAFETY`, `OTHER`, ...)
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_token_count: Option<u32>,
    /// Tokens across candidates
    #[serde(default)]
    pub candidates_token_count: Option<u32>,
    /// Total tokens
    #[serde(default)]
    pub total_token_count: Option<u32>,
}
