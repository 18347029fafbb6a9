//! Configuration management commands.
//!
//! Provides init, show, schema, and validate subcommands for managing
//! snapsolve.json files.

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use clap::Subcommand;
use colored::Colorize;
use snapsolve_core::config::{
    LoadedConfig, SnapsolveConfig, global_config_path, load_merged, local_config_path,
};
use std::io::Write;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init {
        /// Create global config instead of local
        #[arg(long)]
        global: bool,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the merged configuration
    Show {
        /// Output as raw JSON (no formatting)
        #[arg(long)]
        json: bool,

        /// Path to use as local directory (defaults to current dir)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Output the JSON Schema for snapsolve.json
    Schema,

    /// Validate configuration and show warnings
    Validate {
        /// Path to use as local directory (defaults to current dir)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub fn execute(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init { global, force } => cmd_init(global, force),
        ConfigCommands::Show { json, path } => cmd_show(json, path),
        ConfigCommands::Schema => cmd_schema(),
        ConfigCommands::Validate { path } => cmd_validate(path),
    }
}

fn cmd_init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        let global = global_config_path()?;
        if let Some(parent) = global.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        global
    } else {
        local_config_path(&std::env::current_dir()?)
    };

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}\nUse --force to overwrite",
            path.display()
        );
    }

    let json = serde_json::to_string_pretty(&SnapsolveConfig::default())?;
    AtomicFile::new(&path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(json.as_bytes()))
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    println!(
        "{} Created {}",
        "OK".green(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn cmd_show(json_output: bool, path: Option<PathBuf>) -> Result<()> {
    let loaded = load_merged(&super::local_dir(path)?)?;

    for warning in &loaded.warnings {
        eprintln!("{} {}", "WARN".yellow(), warning);
    }

    if json_output {
        println!("{}", serde_json::to_string(&loaded.config)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&loaded.config)?);
    }
    Ok(())
}

fn cmd_schema() -> Result<()> {
    println!("{}", snapsolve_core::config::schema_json_pretty()?);
    Ok(())
}

fn cmd_validate(path: Option<PathBuf>) -> Result<()> {
    let loaded = load_merged(&super::local_dir(path)?)?;

    if loaded.warnings.is_empty() {
        println!("{} Configuration is valid", "OK".green());
    } else {
        println!(
            "{} Configuration has {} warning(s):",
            "WARN".yellow(),
            loaded.warnings.len()
        );
        for w in &loaded.warnings {
            println!("  - {w}");
        }
    }
    print_paths(&loaded);
    Ok(())
}

fn print_paths(loaded: &LoadedConfig) {
    println!("\nConfig files:");
    println!("  Global: {}", loaded.paths.global.display());
    println!("  Local:  {}", loaded.paths.local.display());
}
