//! snapsolve CLI.
//!
//! Reads a screenshot, extracts the question, and solves it with Gemini.
//! Also manages `snapsolve.json` and the local solve history.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod history_store;
mod logging;

#[derive(Parser)]
#[command(name = "snapsolve")]
#[command(about = "Solve a question from a screenshot with Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the question in a screenshot
    Solve(commands::solve::SolveArgs),

    /// Show the configured API keys in rotation order
    Keys {
        /// Path to use as local directory (defaults to current dir)
        #[arg(long)]
        path: Option<std::path::PathBuf>,
    },

    /// Browse solved questions
    History {
        #[command(subcommand)]
        command: commands::history::HistoryCommands,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve(args) => commands::solve::execute(args, cli.verbose).await,
        Commands::Keys { path } => {
            logging::init(cli.verbose, None);
            commands::keys::execute(path)
        }
        Commands::History { command } => {
            logging::init(cli.verbose, None);
            commands::history::execute(command)
        }
        Commands::Config { command } => {
            logging::init(cli.verbose, None);
            commands::config::execute(command)
        }
    }
}
