use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use crate::history_store::JsonlHistory;

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recent sessions, newest first
    List {
        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Output one JSON record per line
        #[arg(long)]
        json: bool,
    },

    /// Print the history file location
    Path,
}

pub fn execute(cmd: HistoryCommands) -> Result<()> {
    let store = JsonlHistory::open_default()?;
    match cmd {
        HistoryCommands::List { limit, json } => {
            let records = store.load()?;
            if records.is_empty() && !json {
                println!("No history yet.");
                return Ok(());
            }
            for record in records.iter().rev().take(limit) {
                if json {
                    println!("{}", serde_json::to_string(record)?);
                    continue;
                }
                let answer = if record.solve_failed {
                    record.answer.red()
                } else {
                    record.answer.green()
                };
                println!(
                    "{}  {}  [{}]  {}",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.title.bold(),
                    record.lecture,
                    answer
                );
            }
        }
        HistoryCommands::Path => println!("{}", store.file().display()),
    }
    Ok(())
}
