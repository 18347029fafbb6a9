//! API resource implementations for the Gemini client

/// Models API resource (`generateContent`)
pub mod models;

pub use models::Models;
