//! Lists configured API keys without revealing them.

use anyhow::Result;
use colored::Colorize;
use snapsolve_core::CredentialPool;
use snapsolve_core::config::load_merged;
use std::path::PathBuf;

pub fn execute(path: Option<PathBuf>) -> Result<()> {
    let loaded = load_merged(&super::local_dir(path)?)?;
    let pool = loaded.config.credential_pool();
    let keys = pool.list_all();

    if keys.is_empty() {
        println!(
            "{} No API keys configured; set GEMINI_API_KEYS or GEMINI_API_KEY",
            "WARN".yellow()
        );
        return Ok(());
    }

    println!("{} key(s), tried in this order:", keys.len());
    for key in &keys {
        println!("  - {}", key.display_name());
    }
    Ok(())
}
