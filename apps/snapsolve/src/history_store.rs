//! JSON Lines history under the user's data directory.
//!
//! Each finished session appends one line to `history.jsonl`; the screenshot
//! is written next to it as `<session_id>.<ext>`.

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use snapsolve_core::{HistoryRecord, HistoryRecorder};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const HISTORY_DIR_ENV: &str = "SNAPSOLVE_HISTORY_DIR";
pub const HISTORY_DISABLED_ENV: &str = "SNAPSOLVE_HISTORY_DISABLED";
const HISTORY_FILE: &str = "history.jsonl";

#[derive(Debug, Clone)]
pub struct JsonlHistory {
    dir: PathBuf,
}

impl JsonlHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// History in `SNAPSOLVE_HISTORY_DIR`, or `<data dir>/snapsolve`.
    pub fn open_default() -> Result<Self> {
        if let Some(dir) = std::env::var_os(HISTORY_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(dir));
        }
        let base = dirs::data_dir().context("Could not determine data dir")?;
        Ok(Self::new(base.join("snapsolve")))
    }

    pub fn disabled() -> bool {
        std::env::var(HISTORY_DISABLED_ENV)
            .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    pub fn file(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn screenshot_path(&self, record: &HistoryRecord) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            record.session_id,
            extension_for(&record.screenshot_mime)
        ))
    }

    /// All records, oldest first. Unparseable lines are skipped.
    pub fn load(&self) -> Result<Vec<HistoryRecord>> {
        let path = self.file();
        if !path.exists() {
            return Ok(vec![]);
        }
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut records = vec![];
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(line = index + 1, error = %e, "skipping bad history line"),
            }
        }
        Ok(records)
    }

    fn write_screenshot(&self, record: &HistoryRecord) -> Result<()> {
        let path = self.screenshot_path(record);
        AtomicFile::new(&path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&record.screenshot))
            .with_context(|| format!("Failed to write screenshot to {}", path.display()))
    }
}

impl HistoryRecorder for JsonlHistory {
    fn record(&self, record: &HistoryRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;
        if !record.screenshot.is_empty() {
            self.write_screenshot(record)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = self.file();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(())
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        _ => "bin",
    }
}

/// MIME type for a screenshot file, by extension. Unknown extensions are
/// sent as PNG.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/png",
    }
}
