//! # askdocs CLI
//!
//! The `askdocs` binary wraps the document Q&A service.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdocs init` | Create the SQLite metadata database and run schema migrations |
//! | `askdocs serve` | Start the HTTP API server |
//!
//! ## Configuration
//!
//! Everything comes from the environment: `OPENAI_API_KEY` (required),
//! `QDRANT_URL`, `QDRANT_API_KEY`, `QDRANT_COLLECTION_PREFIX`,
//! `ASKDOCS_DB_PATH`, `ASKDOCS_BIND`.
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! askdocs init
//! askdocs serve
//! ```

use clap::{Parser, Subcommand};

use askdocs::config::Config;
use askdocs::{db, migrate, server};

#[derive(Parser)]
#[command(
    name = "askdocs",
    about = "Document Q&A service: index text, websites, and PDFs, then ask questions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the metadata database.
    ///
    /// Creates the SQLite database file and all required tables. Idempotent;
    /// running it multiple times is safe. `serve` also runs migrations at
    /// startup, so this is mainly useful for provisioning.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to `ASKDOCS_BIND` and serves the indexing, chat, and user-data
    /// endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("askdocs=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db_path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized at {}", config.db_path.display());
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
    }

    Ok(())
}
