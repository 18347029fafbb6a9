//! Layered loading: defaults, global file, local file, then environment.
//!
//! Files are merged as JSON values (RFC 7396) and deserialized once, so a
//! local file can override a single nested key of the global one.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::merge::merge_patch;
use super::types::SnapsolveConfig;
use super::validation::{AdvisoryWarning, validate};
use crate::credentials::parse_token_list;

pub const LOCAL_FILE: &str = "snapsolve.json";
pub const GLOBAL_DIR: &str = "snapsolve";
pub const GLOBAL_FILE: &str = "snapsolve.json";

/// Environment variables consulted by [`load_merged`].
pub const ENV_VARS: &[&str] = &[
    "GEMINI_API_KEYS",
    "GEMINI_API_KEY",
    "GEMINI_BASE_URL",
    "SNAPSOLVE_MODEL_OCR",
    "SNAPSOLVE_MODEL_SOLVE",
    "SNAPSOLVE_MODEL_TURBO",
    "SNAPSOLVE_MODEL_TITLE",
    "SNAPSOLVE_TURBO",
    "SNAPSOLVE_LOG_LEVEL",
    "SNAPSOLVE_LOG_JSON",
];

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub local: PathBuf,
    pub global: PathBuf,
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: SnapsolveConfig,
    pub warnings: Vec<AdvisoryWarning>,
    pub paths: ConfigPaths,
}

/// `~/.config/snapsolve/snapsolve.json` on Linux.
///
/// # Errors
///
/// Fails when the platform has no config directory.
pub fn global_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config dir")?;
    Ok(base.join(GLOBAL_DIR).join(GLOBAL_FILE))
}

pub fn local_config_path(local_dir: &Path) -> PathBuf {
    local_dir.join(LOCAL_FILE)
}

/// Loads the user's global config and `local_dir/snapsolve.json`.
///
/// # Errors
///
/// Fails on unreadable files, invalid JSON, a non-object root, or values of
/// the wrong type.
pub fn load_merged(local_dir: &Path) -> Result<LoadedConfig> {
    load_from(&global_config_path()?, local_dir)
}

/// Like [`load_merged`] with an explicit global config path.
///
/// # Errors
///
/// See [`load_merged`].
pub fn load_from(global_path: &Path, local_dir: &Path) -> Result<LoadedConfig> {
    let local_path = local_config_path(local_dir);

    let merged = merge_patch(
        read_json_object_or_empty(global_path)?,
        read_json_object_or_empty(&local_path)?,
    );
    let mut config: SnapsolveConfig =
        serde_json::from_value(merged).context("Failed to deserialize merged snapsolve config")?;

    apply_env_overrides(&mut config);
    let warnings = validate(&config);
    for warning in &warnings {
        tracing::debug!(%warning, "config warning");
    }

    Ok(LoadedConfig {
        config,
        warnings,
        paths: ConfigPaths {
            local: local_path,
            global: global_path.to_path_buf(),
        },
    })
}

fn apply_env_overrides(cfg: &mut SnapsolveConfig) {
    if let Some(v) = env_trimmed("GEMINI_BASE_URL") {
        cfg.service.base_url = v;
    }

    // Keys are env-only: the list first, then the single key as a fallback.
    let mut keys = env_trimmed("GEMINI_API_KEYS")
        .map(|raw| parse_token_list(&raw))
        .unwrap_or_default();
    if let Some(single) = env_trimmed("GEMINI_API_KEY")
        && !keys.contains(&single)
    {
        keys.push(single);
    }
    cfg.service.api_keys = keys.into_iter().map(SecretString::from).collect();

    if let Some(v) = env_trimmed("SNAPSOLVE_MODEL_OCR") {
        cfg.models.ocr = v;
    }
    if let Some(v) = env_trimmed("SNAPSOLVE_MODEL_SOLVE") {
        cfg.models.solve = v;
    }
    if let Some(v) = env_trimmed("SNAPSOLVE_MODEL_TURBO") {
        cfg.models.turbo = v;
    }
    if let Some(v) = env_trimmed("SNAPSOLVE_MODEL_TITLE") {
        cfg.models.title = v;
    }

    if let Some(v) = env_trimmed("SNAPSOLVE_TURBO") {
        cfg.pipeline.turbo = env_flag(&v);
    }
    if let Some(v) = env_trimmed("SNAPSOLVE_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_trimmed("SNAPSOLVE_LOG_JSON") {
        cfg.logging.json = env_flag(&v);
    }
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn read_json_object_or_empty(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    match value {
        Value::Object(_) => Ok(value),
        _ => anyhow::bail!("Config root must be a JSON object: {}", path.display()),
    }
}
