//! Screenshot question solving on top of Gemini.
//!
//! This crate provides:
//! - [`RequestOrchestrator`]: runs a [`TaskRequest`] against Gemini, trying
//!   every pooled credential once before giving up
//! - [`SchemaCatalog`] and [`ResponseDecoder`]: per-task structured output
//!   schemas and the decoding of model replies
//! - [`PipelineController`]: the capture → analyze → solve session state
//!   machine, driven from a single owner loop
//! - [`config`]: layered `snapsolve.json` configuration with env overrides
//!
//! # Example
//! ```no_run
//! use snapsolve_core::{PipelineController, RequestOrchestrator, config::load_merged};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let runtime = tokio::runtime::Runtime::new()?;
//! let loaded = load_merged(Path::new("."))?;
//! let cfg = &loaded.config;
//!
//! let client = gemini_async::Client::with_config(cfg.gemini_config());
//! let orchestrator = RequestOrchestrator::new(client, Arc::new(cfg.credential_pool()))
//!     .with_models(cfg.models.to_selection())
//!     .with_call_timeout(cfg.call_timeout());
//!
//! let (mut controller, mut channels) = PipelineController::new(
//!     Arc::new(orchestrator),
//!     cfg.pipeline_settings(),
//!     runtime.handle().clone(),
//! );
//! # let _ = (&mut controller, &mut channels);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod decoder;
pub mod error;
pub mod history;
pub mod messages;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod tags;
pub mod task;

pub use credentials::{Credential, CredentialPool, SharedCredentialPool};
pub use decoder::{Decoded, ResponseDecoder};
pub use error::{DecodeError, ErrorKind, OrchestratorError, PipelineError};
pub use history::{HistoryRecord, HistoryRecorder, MemoryHistory, NoopHistory};
pub use messages::{EnglishMessages, Localizer, MessageKey};
pub use orchestrator::{ModelSelection, RequestOrchestrator, TaskExecutor};
pub use pipeline::{
    CloseReason, PipelineController, PipelineEvent, PipelineMessage, PipelineSettings,
    PipelineState,
};
pub use schema::{SchemaCatalog, SchemaContext, SchemaDescriptor};
pub use tags::{SharedTags, SubjectTagProvider};
pub use task::{InlineImage, TaskOutcome, TaskRequest, TaskResult, TaskType};
