#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]

//! Async Gemini `generateContent` client with typed requests/responses,
//! inline image parts, structured output configuration, and wiremock tests.
//!
//! ```no_run
//! use gemini_async::{Client, GeminiConfig, types::GenerateContentRequest};
//!
//! # async fn example() -> Result<(), gemini_async::GeminiError> {
//! let client = Client::with_config(GeminiConfig::new().with_api_key("key"));
//! let req = GenerateContentRequest::from_text("Hello!");
//! let resp = client.models().generate_content("gemini-2.5-flash", &req).await?;
//! println!("{}", resp.first_text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

/// HTTP client implementation
pub mod client;
/// Configuration types for the client
pub mod config;
/// Error types
pub mod error;
/// API resource implementations
pub mod resources;
/// Test support utilities (for use in tests)
#[doc(hidden)]
pub mod test_support;
/// Request and response types
pub mod types;

pub use crate::client::Client;
pub use crate::config::GeminiConfig;
pub use crate::error::{ApiErrorObject, GeminiError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::types::*;
    pub use crate::{Client, GeminiConfig};
}
