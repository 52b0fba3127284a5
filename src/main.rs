//! # MindForge CLI (`mindforge`)
//!
//! ## Usage
//!
//! ```bash
//! mindforge [--config ./mindforge.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mindforge unit create\|list\|delete` | Manage units |
//! | `mindforge notes show\|save <unit>` | Read or replace a unit's notes |
//! | `mindforge ingest <unit> <file>` | Upload and analyze a PDF, DOCX, or text file |
//! | `mindforge ingest-video <unit> --url <url> --transcript <file>` | Analyze a video transcript |
//! | `mindforge ingest-text <unit>` | Analyze text piped on stdin |
//! | `mindforge ask <unit> "<question>"` | One retrieval-augmented answer |
//! | `mindforge chat <unit>` | Interactive chat |
//! | `mindforge search <unit> "<query>"` | Show retrieved chunks with scores |
//! | `mindforge summary\|map\|quiz <unit>` | Study outputs |
//! | `mindforge history <unit>` | Print the chat transcript |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `mindforge=info`).

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use mindforge::{chat, config, ingest, search, study_cmd, unit_cmd};

/// MindForge: a local-first study assistant with retrieval-augmented chat.
#[derive(Parser)]
#[command(
    name = "mindforge",
    about = "MindForge: units, document analysis, and retrieval-augmented study chat",
    version
)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, list, or delete units.
    Unit {
        #[command(subcommand)]
        action: UnitAction,
    },

    /// Show or replace a unit's notes.
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },

    /// Copy a file into a unit and analyze it.
    ///
    /// Extracts text (PDF, DOCX, TXT, MD), splits it on natural
    /// boundaries, generates a summary and concept map from the first
    /// chunk, and rebuilds the unit's embedding index.
    Ingest {
        unit: String,
        file: PathBuf,
    },

    /// Analyze a video from its caption file (WebVTT, SRT, or plain text).
    IngestVideo {
        unit: String,
        /// YouTube URL of the video.
        #[arg(long)]
        url: String,
        /// Caption file for the video.
        #[arg(long)]
        transcript: PathBuf,
    },

    /// Analyze text piped on stdin.
    IngestText {
        unit: String,
        /// Document name to record.
        #[arg(long, default_value = "Pasted text")]
        name: String,
    },

    /// Ask one question against a unit's index.
    Ask {
        unit: String,
        question: String,
    },

    /// Interactive chat against a unit.
    Chat {
        unit: String,
    },

    /// Show the chunks a query retrieves, with similarity scores.
    Search {
        unit: String,
        query: String,
        /// Number of chunks to show (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the summary from the last analysis.
    Summary {
        unit: String,
    },

    /// Show the concept map from the last analysis.
    Map {
        unit: String,
        /// Print the map as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a three-question multiple-choice quiz.
    Quiz {
        unit: String,
    },

    /// Print a unit's chat transcript.
    History {
        unit: String,
    },

    /// Generate shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum UnitAction {
    /// Create a new unit.
    Create { name: String },
    /// List all units.
    List,
    /// Delete a unit and everything in it.
    Delete { name: String },
}

#[derive(Subcommand)]
enum NotesAction {
    /// Print the unit's notes.
    Show { unit: String },
    /// Replace the unit's notes.
    Save { unit: String, text: String },
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mindforge=info,mindforge_core=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

impl Commands {
    /// Whether the command calls an embedding or completion provider.
    fn needs_providers(&self) -> bool {
        matches!(
            self,
            Commands::Ingest { .. }
                | Commands::IngestVideo { .. }
                | Commands::IngestText { .. }
                | Commands::Ask { .. }
                | Commands::Chat { .. }
                | Commands::Search { .. }
                | Commands::Quiz { .. }
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "mindforge", &mut std::io::stdout());
        return Ok(());
    }

    init_logging();

    let cfg = config::load_config(cli.config.as_deref())?;
    if cli.command.needs_providers() {
        config::check_credentials(&cfg)?;
    }

    match cli.command {
        Commands::Unit { action } => match action {
            UnitAction::Create { name } => unit_cmd::run_unit_create(&cfg, &name)?,
            UnitAction::List => unit_cmd::run_unit_list(&cfg)?,
            UnitAction::Delete { name } => unit_cmd::run_unit_delete(&cfg, &name).await?,
        },
        Commands::Notes { action } => match action {
            NotesAction::Show { unit } => unit_cmd::run_notes_show(&cfg, &unit)?,
            NotesAction::Save { unit, text } => unit_cmd::run_notes_save(&cfg, &unit, &text)?,
        },
        Commands::Ingest { unit, file } => ingest::run_ingest(&cfg, &unit, &file).await?,
        Commands::IngestVideo {
            unit,
            url,
            transcript,
        } => ingest::run_ingest_video(&cfg, &unit, &url, &transcript).await?,
        Commands::IngestText { unit, name } => ingest::run_ingest_text(&cfg, &unit, &name).await?,
        Commands::Ask { unit, question } => chat::run_ask(&cfg, &unit, &question).await?,
        Commands::Chat { unit } => chat::run_chat(&cfg, &unit).await?,
        Commands::Search { unit, query, limit } => {
            search::run_search(&cfg, &unit, &query, limit).await?
        }
        Commands::Summary { unit } => study_cmd::run_summary(&cfg, &unit)?,
        Commands::Map { unit, json } => study_cmd::run_map(&cfg, &unit, json)?,
        Commands::Quiz { unit } => study_cmd::run_quiz(&cfg, &unit).await?,
        Commands::History { unit } => unit_cmd::run_history(&cfg, &unit)?,
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}
