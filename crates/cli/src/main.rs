//! Parley CLI - the main entry point.
//!
//! Commands:
//! - `run`      - Start the channels, dispatcher and status server
//! - `chat`     - Talk to the bot from the terminal
//! - `status`   - Show configuration status
//! - `doctor`   - Diagnose configuration and backend health
//! - `analyze`  - Ask the backend for a sentiment/intent reading of some text

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — AI chatbot dispatcher for WhatsApp and the terminal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the enabled channels, the dispatcher and the status server
    Run {
        /// Override the status server port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the bot in the terminal
    Chat {
        /// Name to use for your side of the conversation
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show configuration status
    Status,

    /// Diagnose configuration and backend health
    Doctor,

    /// Classify the sentiment and intent of a message
    Analyze {
        /// The text to analyze
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { port } => commands::run::run(port).await?,
        Commands::Chat { name } => commands::chat::run(name).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Analyze { text } => commands::analyze::run(&text).await?,
    }

    Ok(())
}
