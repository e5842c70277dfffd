//! # Catalog Assistant CLI (`assistant`)
//!
//! ## Usage
//!
//! ```bash
//! assistant --config ./config/assistant.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `assistant serve` | Start the chat HTTP server |
//! | `assistant search "<query>"` | Show ranked catalog matches with scores |
//! | `assistant extract "<text>"` | Run lead extraction on a message without recording it |
//! | `assistant enrich` | Fill in catalog categories, applications, and keywords with the LLM |
//!
//! ## Examples
//!
//! ```bash
//! assistant serve --config ./config/assistant.toml
//! assistant search "nano gümüş fiyatı"
//! assistant extract "Ali Veli 0532 123 45 67"
//! assistant enrich --output ./data/products_enriched.json
//! ```

use catalog_assistant::{config, enrich, extract, search, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Catalog Assistant: a conversational sales assistant that matches chat
/// messages to a product catalog and captures leads.
#[derive(Parser)]
#[command(
    name = "assistant",
    about = "Catalog Assistant: product matching and lead capture for storefront chat",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// See `config/assistant.example.toml` for every setting.
    #[arg(long, global = true, default_value = "./config/assistant.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Search the catalog the way the chat endpoint does.
    Search {
        /// The query, as a customer would type it.
        query: String,

        /// Maximum number of results (defaults to `matching.max_results`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Extract a name and phone number from a message.
    ///
    /// Uses the configured LLM provider, or the offline heuristic when it
    /// is disabled. Nothing is written to the lead sinks.
    Extract {
        /// The message text.
        text: String,
    },

    /// Enrich the catalog's descriptive fields from product names.
    ///
    /// Requires an LLM provider. Progress is checkpointed so an
    /// interrupted run resumes where it stopped.
    Enrich {
        /// Where to write the enriched catalog (defaults to
        /// `products_enriched.json` next to `catalog.path`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress file (defaults to `enrichment_progress.json` next to
        /// `catalog.path`).
        #[arg(long)]
        progress: Option<PathBuf>,

        /// Pause between LLM calls, in milliseconds.
        #[arg(long, default_value_t = enrich::DEFAULT_DELAY_MS)]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,catalog_assistant=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Extract { text } => {
            extract::run_extract(&cfg, &text).await?;
        }
        Commands::Enrich {
            output,
            progress,
            delay_ms,
        } => {
            enrich::run_enrich(&cfg, output, progress, delay_ms).await?;
        }
    }

    Ok(())
}
