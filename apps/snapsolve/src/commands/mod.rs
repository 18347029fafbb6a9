pub mod config;
pub mod history;
pub mod keys;
pub mod solve;

use std::path::PathBuf;

/// `--path` if given, else the current directory.
pub fn local_dir(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}
