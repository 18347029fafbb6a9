//! JSON Schema for `snapsolve.json`, for editor completion.

use schemars::{Schema, generate::SchemaSettings};

use super::types::SnapsolveConfig;

pub fn schema() -> Schema {
    SchemaSettings::default()
        .into_generator()
        .into_root_schema_for::<SnapsolveConfig>()
}

/// # Errors
///
/// Only if the schema fails to serialize.
pub fn schema_json_pretty() -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&schema())?)
}
