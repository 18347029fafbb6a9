//! Request and response types for the Gemini API

/// Content and part types
pub mod content;
/// `generateContent` request/response types
pub mod generate;

pub use content::{Blob, Content, Part};
pub use generate::{
    Candidate, GenerateContentRequest, GenerateContentResponse, GenerationConfig, JSON_MIME_TYPE,
    PromptFeedback, UsageMetadata,
};
