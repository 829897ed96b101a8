//! Loopwright CLI: the main entry point.
//!
//! Commands:
//! - `run`     Run the agent on one message
//! - `tools`   Connect tool sources and print the tool catalog
//! - `parse`   Decode a model response read from stdin
//! - `config`  Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "loopwright",
    about = "Loopwright: a ReAct agent kernel with remote tool sources",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this file instead of ~/.loopwright/config.toml
    #[arg(short, long, global = true, env = "LOOPWRIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a single message
    Run {
        /// The user request
        #[arg(short, long)]
        message: String,

        /// Persist the turn under this conversation id
        #[arg(short, long)]
        session: Option<String>,

        /// Expected session version (defaults to the current one)
        #[arg(long, requires = "session")]
        expect_version: Option<i64>,

        /// Print the full run result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect the configured tool sources and list every tool
    Tools {
        /// Only show tools from these sources (repeatable)
        #[arg(long = "source")]
        sources: Vec<String>,
    },

    /// Decode a model response from stdin with the step protocol
    Parse,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets removed
    Show,
    /// Print the default config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            message,
            session,
            expect_version,
            json,
        } => {
            let options = commands::run::RunOptions {
                message,
                session,
                expect_version,
                json,
            };
            commands::run::run(config_path, options).await?
        }
        Commands::Tools { sources } => commands::tools::run(config_path, &sources).await?,
        Commands::Parse => commands::parse::run()?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(),
        },
    }

    Ok(())
}
