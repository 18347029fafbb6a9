//! Configuration types.
//!
//! All sections use `#[serde(default)]`, so a partial `snapsolve.json` only
//! needs the keys it changes.

use gemini_async::GeminiConfig;
use gemini_async::config::GEMINI_DEFAULT_BASE;
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::credentials::{Credential, SharedCredentialPool};
use crate::orchestrator::ModelSelection;
use crate::pipeline::PipelineSettings;

/// Root configuration loaded from `snapsolve.json` files.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SnapsolveConfig {
    /// Optional JSON Schema URL for editor support.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Gemini endpoint.
    pub service: ServiceConfig,

    /// Model per task.
    pub models: ModelsConfig,

    /// Request and call time limits.
    pub timeouts: TimeoutsConfig,

    /// Session behaviour.
    pub pipeline: PipelineConfig,

    /// Logging output.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL up to and including `/models`.
    pub base_url: String,

    /// API keys in rotation order (env-only, never serialized).
    #[serde(skip)]
    #[schemars(skip)]
    pub api_keys: Vec<SecretString>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: GEMINI_DEFAULT_BASE.into(),
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model that extracts question text from screenshots.
    pub ocr: String,
    /// Model that solves extracted questions.
    pub solve: String,
    /// Model that reads and solves in one step.
    pub turbo: String,
    /// Model that writes history titles.
    pub title: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let defaults = ModelSelection::default();
        Self {
            ocr: defaults.ocr,
            solve: defaults.solve,
            turbo: defaults.turbo,
            title: defaults.title,
        }
    }
}

impl ModelsConfig {
    pub fn to_selection(&self) -> ModelSelection {
        ModelSelection {
            ocr: self.ocr.clone(),
            solve: self.solve.clone(),
            turbo: self.turbo.clone(),
            title: self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Limit for a single HTTP attempt, in seconds.
    pub request_secs: u64,
    /// Limit for a whole call across all credentials, in seconds.
    pub call_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            call_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    /// Skip the analyze step and solve straight from the screenshot.
    pub turbo: bool,
    /// Delay before a "question not found" session closes, in milliseconds.
    pub auto_close_ms: u64,
    /// Subject tags offered to the model as preferred lecture labels.
    pub known_tags: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            turbo: false,
            auto_close_ms: 2500,
            known_tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON-formatted logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl SnapsolveConfig {
    /// Pool holding the configured keys, in order.
    pub fn credential_pool(&self) -> SharedCredentialPool {
        let pool = SharedCredentialPool::new();
        for (i, key) in self.service.api_keys.iter().enumerate() {
            pool.add(Credential::from_secret(key).with_label(format!("key#{}", i + 1)));
        }
        pool
    }

    /// HTTP client settings; the key is supplied per attempt by the pool.
    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig::new()
            .with_api_base(self.service.base_url.clone())
            .with_request_timeout(Duration::from_secs(self.timeouts.request_secs))
    }

    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.call_secs)
    }

    pub const fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            turbo: self.pipeline.turbo,
            auto_close: Duration::from_millis(self.pipeline.auto_close_ms),
        }
    }
}
