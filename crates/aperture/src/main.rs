//! Aperture - passthrough gateway for AI photo ratings.
//!
//! Aperture exposes one HTTP API in front of five vision providers
//! (Anthropic, OpenAI, Google, xAI Grok, Groq). Clients send photos and
//! prompts; Aperture holds the API keys, retries transient failures, tracks
//! provider batch jobs and reports cost with the end-user markup.
//!
//! # Usage
//!
//! ```bash
//! # Run the gateway
//! aperture serve --port 8787
//!
//! # See which providers are configured
//! aperture providers
//!
//! # View configuration
//! aperture config show
//! ```

use aperture_core::Config;
use anyhow::Context;
use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Aperture - passthrough gateway for AI photo ratings.
#[derive(Parser, Debug)]
#[command(name = "aperture")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, env = "APERTURE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway
    Serve(cli::serve::ServeArgs),

    /// List providers with model, pricing and readiness
    Providers,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit config file must load; the default location may be absent.
    // Logging isn't initialized yet, so warnings go through eprintln.
    let (config, config_path) = match cli.config.as_deref() {
        Some(path) => {
            let path = Config::expand_path(path);
            let config = if path.exists() {
                Config::load_from(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?
            } else {
                eprintln!(
                    "Warning: {} does not exist, using default configuration.",
                    path.display()
                );
                Config::default()
            };
            (config, path)
        }
        None => {
            let config = Config::load().unwrap_or_else(|e| {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `aperture config path`."
                );
                Config::default()
            });
            (config, Config::default_path())
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Aperture v{}", aperture_core::VERSION);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Providers => cli::providers::execute(&config).await,
        Commands::Config(args) => cli::config::execute(args, &config, &config_path).await,
    }
}
