//! Layered configuration for snapsolve.
//!
//! Precedence, lowest to highest:
//! 1. Defaults
//! 2. Global `~/.config/snapsolve/snapsolve.json`
//! 3. Local `./snapsolve.json`
//! 4. Environment
//!
//! Environment variables:
//! - `GEMINI_API_KEYS`: keys in rotation order, separated by commas, semicolons or newlines
//! - `GEMINI_API_KEY`: single key, appended when not already listed
//! - `GEMINI_BASE_URL`: API base up to `/models`
//! - `SNAPSOLVE_MODEL_OCR`, `SNAPSOLVE_MODEL_SOLVE`, `SNAPSOLVE_MODEL_TURBO`, `SNAPSOLVE_MODEL_TITLE`
//! - `SNAPSOLVE_TURBO`: `true`/`1` enables turbo mode
//! - `SNAPSOLVE_LOG_LEVEL`, `SNAPSOLVE_LOG_JSON`
//!
//! API keys are only ever read from the environment.

mod json_schema;
mod loader;
mod merge;
mod types;
mod validation;

pub use json_schema::{schema, schema_json_pretty};
pub use loader::{
    ConfigPaths, ENV_VARS, GLOBAL_DIR, GLOBAL_FILE, LOCAL_FILE, LoadedConfig, global_config_path,
    load_from, load_merged, local_config_path,
};
pub use merge::merge_patch;
pub use types::{
    LoggingConfig, ModelsConfig, PipelineConfig, ServiceConfig, SnapsolveConfig, TimeoutsConfig,
};
pub use validation::{AdvisoryWarning, validate};
