use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sift::classifier::anthropic::AnthropicClassifier;
use sift::classifier::{Classifier, build_request};
use sift::config::Config;
use sift::consts::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL, default_db_path};
use sift::engine::local::LocalEngine;
use sift::engine::{RetryPolicy, RunId};
use sift::events::{Event, EventBus};
use sift::feedback::IncomingFeedback;
use sift::normalize::{Normalized, validate};
use sift::pipeline::Pipeline;
use sift::store::FeedbackStore;
use sift::store::sqlite::SqliteStore;

#[derive(Parser)]
#[command(name = "sift", version, about = "Sorts feedback into piles.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database path (default: ~/.sift/sift.db, use :memory: for ephemeral)
    #[arg(short, long, global = true)]
    db: Option<String>,

    /// Classification model (overrides the saved setting)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Attempts per step before an item is dropped (overrides the saved setting)
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Classify and store a batch of feedback
    Submit {
        /// Feedback source label (pair each with a --content)
        #[arg(short, long)]
        source: Vec<String>,

        /// Feedback text
        #[arg(short, long)]
        content: Vec<String>,

        /// JSON file holding an array of {"source", "content"} objects
        #[arg(short, long, conflicts_with_all = ["source", "content"])]
        file: Option<PathBuf>,
    },
    /// Show stored feedback, newest first
    List {
        /// Show at most this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Classify a single item without storing it
    Classify {
        #[arg(short, long)]
        source: String,

        #[arg(short, long)]
        content: String,
    },
    /// Read or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a saved setting
    Get { key: String },
    /// Save a setting
    Set { key: String, value: String },
    /// Remove a saved setting
    Unset { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let db = resolve_db(cli.db.as_deref())?;
    let config = Config::open(&db)?;

    let model = match cli.model {
        Some(m) => m,
        None => config.model()?.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    };
    let max_attempts = match cli.max_attempts {
        Some(n) => n,
        None => config.max_attempts()?.unwrap_or(DEFAULT_MAX_ATTEMPTS),
    };

    match cli.command {
        Command::Submit {
            source,
            content,
            file,
        } => {
            let items = match file {
                Some(path) => read_batch(&path)?,
                None => pair_items(source, content)?,
            };
            let batch = accept(items)?;

            let classifier = Arc::new(AnthropicClassifier::new(Some(model)));
            let store = Arc::new(SqliteStore::open(&db)?);
            let engine = Arc::new(LocalEngine::new(RetryPolicy {
                max_attempts,
                ..RetryPolicy::default()
            }));
            submit(classifier, store, engine, batch).await
        }
        Command::List { limit } => {
            let store = SqliteStore::open(&db)?;
            let records = store.list().await?;
            if records.is_empty() {
                println!("no feedback stored yet");
            }
            for r in records.iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "#{:<5} {}  {:<8}  {:<15}  [{}] {}",
                    r.id,
                    r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    r.sentiment,
                    r.theme,
                    r.source,
                    r.content
                );
            }
            Ok(())
        }
        Command::Classify { source, content } => {
            let item = IncomingFeedback::new(source, content)?;
            let classifier = AnthropicClassifier::new(Some(model));
            let raw = classifier.classify(&build_request(&item)).await?;
            match validate(&raw) {
                Normalized::Valid(c) => {
                    println!("sentiment: {}\ntheme:     {}", c.sentiment, c.theme);
                }
                Normalized::Defaulted(c, reason) => {
                    println!("sentiment: {}\ntheme:     {}", c.sentiment, c.theme);
                    println!("(defaulted: {reason})");
                }
            }
            Ok(())
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Get { key } => match config.get(&key)? {
                    Some(value) => println!("{value}"),
                    None => println!("{key} is not set"),
                },
                ConfigAction::Set { key, value } => {
                    config.set(&key, &value)?;
                    println!("✓ {key} = {value}");
                }
                ConfigAction::Unset { key } => {
                    config.remove(&key)?;
                    println!("✓ {key} unset");
                }
            }
            Ok(())
        }
    }
}

/// Run one batch and print progress as items land.
async fn submit(
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn FeedbackStore>,
    engine: Arc<LocalEngine>,
    batch: Vec<IncomingFeedback>,
) -> Result<()> {
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let run = RunId::generate();
    info!(run = %run, "submitting batch");

    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                Event::ItemPersisted {
                    index,
                    id,
                    classification,
                    ..
                } => println!(
                    "  [{index}] ✓ #{id} {} / {}",
                    classification.sentiment, classification.theme
                ),
                Event::ItemSkipped { index, .. } => println!("  [{index}] - skipped (malformed)"),
                Event::ItemFailed { index, error, .. } => println!("  [{index}] ✗ {error}"),
                Event::RunCompleted { .. } => break,
            }
        }
    });

    let pipeline = Pipeline::new(classifier, store, engine).with_events(Arc::clone(&bus));

    println!("run {run}: {} item(s)", batch.len());
    tokio::select! {
        summary = pipeline.run(&run, &batch) => {
            let _ = printer.await;
            println!(
                "\n=> {} persisted, {} skipped, {} failed",
                summary.persisted, summary.skipped, summary.failed
            );
            if summary.failed > 0 {
                println!("   failed items were not stored; resubmit them to retry");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n\ninterrupted; items already stored are kept");
        }
    }
    Ok(())
}

fn resolve_db(db: Option<&str>) -> Result<String> {
    let path = match db {
        Some(p) => return Ok(p.to_string()),
        None => default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(path.to_string_lossy().into_owned())
}

fn read_batch(path: &Path) -> Result<Vec<IncomingFeedback>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a feedback array", path.display()))
}

fn pair_items(sources: Vec<String>, contents: Vec<String>) -> Result<Vec<IncomingFeedback>> {
    if sources.len() != contents.len() {
        bail!(
            "got {} --source and {} --content; they must come in pairs",
            sources.len(),
            contents.len()
        );
    }
    Ok(sources
        .into_iter()
        .zip(contents)
        .map(|(source, content)| IncomingFeedback { source, content })
        .collect())
}

/// Submission-time validation: drop what can't enter the pipeline.
fn accept(items: Vec<IncomingFeedback>) -> Result<Vec<IncomingFeedback>> {
    let mut batch = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item.validate() {
            Ok(()) => batch.push(item),
            Err(e) => warn!("dropping item {i}: {e}"),
        }
    }
    if batch.is_empty() {
        bail!("no valid feedback items to submit");
    }
    Ok(batch)
}
