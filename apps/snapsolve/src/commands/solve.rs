//! `snapsolve solve`: runs one capture through the pipeline.
//!
//! This is the owner loop. Background results arrive on the message
//! channel and are applied here; lifecycle events are printed as they come.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use gemini_async::Client;
use snapsolve_core::config::load_merged;
use snapsolve_core::{
    CloseReason, HistoryRecorder, InlineImage, NoopHistory, PipelineController, PipelineEvent,
    PipelineState, RequestOrchestrator, SharedTags,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;

use crate::history_store::{JsonlHistory, mime_for};

#[derive(Args)]
pub struct SolveArgs {
    /// Screenshot containing the question (png, jpeg, webp, gif, heic)
    image: PathBuf,

    /// Read and solve in a single request
    #[arg(long)]
    turbo: bool,

    /// Solve this text instead of the extracted question
    #[arg(long, conflicts_with = "turbo")]
    question: Option<String>,

    /// Review the extracted question before solving
    #[arg(long, conflicts_with_all = ["turbo", "question"])]
    review: bool,

    /// Print pipeline events as JSON lines
    #[arg(long)]
    json: bool,

    /// Do not record this session in the history
    #[arg(long)]
    no_history: bool,

    /// Path to use as local directory (defaults to current dir)
    #[arg(long)]
    path: Option<PathBuf>,
}

enum Review {
    Confirm,
    Replace(String),
    Cancel,
    /// Analysis failed and nothing replaces the question.
    GiveUp,
}

pub async fn execute(args: SolveArgs, verbose: u8) -> Result<()> {
    let loaded = load_merged(&super::local_dir(args.path.clone())?)?;
    crate::logging::init(verbose, Some(&loaded.config.logging));
    for warning in &loaded.warnings {
        eprintln!("{} {}", "WARN".yellow(), warning);
    }
    let cfg = loaded.config;

    let image = read_image(&args.image)?;

    let orchestrator = RequestOrchestrator::new(
        Client::with_config(cfg.gemini_config()),
        Arc::new(cfg.credential_pool()),
    )
    .with_models(cfg.models.to_selection())
    .with_call_timeout(cfg.call_timeout());

    let history: Arc<dyn HistoryRecorder> = if args.no_history || JsonlHistory::disabled() {
        Arc::new(NoopHistory)
    } else {
        Arc::new(JsonlHistory::open_default()?)
    };
    let tags = SharedTags::new(&cfg.pipeline.known_tags);

    let mut settings = cfg.pipeline_settings();
    settings.turbo |= args.turbo;

    let (controller, mut channels) =
        PipelineController::new(Arc::new(orchestrator), settings, Handle::current());
    let mut controller = controller
        .with_tags(Arc::new(tags.clone()))
        .with_history(history);

    controller.capture(image)?;

    let mut failure: Option<String> = None;
    loop {
        tokio::select! {
            Some(message) = channels.messages.recv() => {
                controller.handle(message);
                close_when_recorded(&mut controller)?;
            }
            Some(event) = channels.events.recv() => {
                print_event(&event, args.json)?;
                match event {
                    PipelineEvent::AnalysisCompleted { text, error, .. } => {
                        let failed = error.is_some();
                        let recoverable = args.question.is_some() || args.review;
                        if failed && recoverable && !args.json {
                            eprintln!("{} {text}", "Could not read the question:".yellow());
                        }
                        let review = if let Some(q) = &args.question {
                            Review::Replace(q.clone())
                        } else if args.review {
                            review_question(failed).await?
                        } else if failed {
                            Review::GiveUp
                        } else {
                            Review::Confirm
                        };
                        match review {
                            Review::Confirm => controller.confirm()?,
                            Review::Replace(q) => {
                                controller.edit_question(q)?;
                                controller.confirm()?;
                            }
                            Review::Cancel => controller.cancel()?,
                            Review::GiveUp => {
                                failure = Some(text);
                                controller.close()?;
                            }
                        }
                    }
                    PipelineEvent::QuestionNotFound { message, .. } => failure = Some(message),
                    PipelineEvent::SolveCompleted { lecture, explanation, error, .. } => {
                        if error.is_some() {
                            failure = Some(explanation);
                        } else {
                            tags.insert(&lecture);
                        }
                        close_when_recorded(&mut controller)?;
                    }
                    PipelineEvent::SessionClosed { reason, .. } => {
                        if reason == CloseReason::Cancelled && !args.json {
                            eprintln!("Cancelled.");
                        }
                        break;
                    }
                    _ => {}
                }
            }
            else => break,
        }
    }

    match failure {
        Some(message) => anyhow::bail!(message),
        None => Ok(()),
    }
}

/// A solved session stays open until its history record is written.
fn close_when_recorded(controller: &mut PipelineController) -> Result<()> {
    if controller.state() == PipelineState::Solved && controller.pending_history() == 0 {
        controller.close()?;
    }
    Ok(())
}

fn read_image(path: &Path) -> Result<InlineImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read screenshot {}", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("Screenshot is empty: {}", path.display());
    }
    Ok(InlineImage::new(bytes, mime_for(path)))
}

/// Asks on stderr, reads one line from stdin without blocking the runtime.
///
/// After a failed analysis there is no question to confirm, so an empty
/// line gives up instead.
async fn review_question(failed: bool) -> Result<Review> {
    if failed {
        eprint!("Type the question to solve, or press Enter to give up: ");
    } else {
        eprint!("Enter to solve, type a replacement question, or 'q' to cancel: ");
    }
    std::io::stderr().flush()?;
    let line = BufReader::new(tokio::io::stdin())
        .lines()
        .next_line()
        .await?
        .unwrap_or_default();
    Ok(match line.trim() {
        "" if failed => Review::GiveUp,
        "" => Review::Confirm,
        "q" | "Q" => Review::Cancel,
        other => Review::Replace(other.to_string()),
    })
}

fn print_event(event: &PipelineEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        PipelineEvent::AnalysisStarted { .. } => eprintln!("Reading question..."),
        PipelineEvent::AnalysisCompleted {
            text, error: None, ..
        } => println!("{}\n{text}\n", "Question:".bold()),
        PipelineEvent::SolveStarted { attempt: 1, .. } => eprintln!("Solving..."),
        PipelineEvent::SolveStarted { .. } => eprintln!("Answer unclear, asking again..."),
        PipelineEvent::QuestionEdited { text, .. } => {
            println!("{}\n{text}\n", "Edited question:".bold());
        }
        PipelineEvent::SolveCompleted { error: Some(_), .. } => {}
        PipelineEvent::SolveCompleted {
            answer,
            lecture,
            explanation,
            solved,
            ..
        } => {
            let label = if *solved {
                answer.green()
            } else {
                answer.yellow()
            };
            println!("{} {label}", "Answer:".bold());
            if !lecture.is_empty() {
                println!("{} {lecture}", "Subject:".bold());
            }
            if !explanation.is_empty() {
                println!("\n{explanation}");
            }
        }
        // Failures are reported once, as the command's error.
        PipelineEvent::AnalysisCompleted { .. }
        | PipelineEvent::QuestionNotFound { .. }
        | PipelineEvent::SessionStarted { .. }
        | PipelineEvent::SessionClosed { .. } => {}
    }
    Ok(())
}
