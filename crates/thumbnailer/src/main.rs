//! Thumbnailer CLI - download images and write fixed-width thumbnails.
//!
//! # Usage
//!
//! ```bash
//! # Thumbnail a couple of URLs into ./outgoing
//! thumbnailer run https://example.com/cat.jpg https://example.com/dog.png
//!
//! # Read URLs from a file, resize only after every download finished
//! thumbnailer run --url-file urls.txt --mode batch --report report.json
//!
//! # View configuration
//! thumbnailer config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Thumbnailer - download images and write 32/64/200 pixel wide thumbnails.
#[derive(Parser, Debug)]
#[command(name = "thumbnailer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Download images and generate thumbnails
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match thumbnailer_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `thumbnailer config path`."
            );
            thumbnailer_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Thumbnailer v{}", thumbnailer_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config).await,
    }
}
