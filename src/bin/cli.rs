//! site-search CLI
//!
//! Runs one search against a declared site, or checks a site definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use site_search::{config, error::Result, models::SearchStatus, pipeline};

/// site-search - Declarative torrent site search
#[derive(Parser, Debug)]
#[command(
    name = "site-search",
    version,
    about = "Search torrent sites described by declarative definitions"
)]
struct Cli {
    /// Path to the application config
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search a site and print the records as JSON
    Search {
        /// Site id under the sites directory, or a definition file
        #[arg(short, long)]
        site: String,

        /// User settings for the site (TOML or JSON)
        #[arg(short, long)]
        user: Option<PathBuf>,

        /// Keywords, optionally prefixed with an advanced token such as `imdb|`
        #[arg(short, long)]
        keywords: Option<String>,
    },

    /// Check a site definition without sending requests
    Validate {
        /// Site id under the sites directory, or a definition file
        #[arg(short, long)]
        site: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Search {
            site,
            user,
            keywords,
        } => {
            let result =
                pipeline::run_search(&config, &site, user.as_deref(), keywords.as_deref()).await?;
            if result.status != SearchStatus::Success {
                log::warn!("Search finished with status {:?}", result.status);
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Validate { site } => {
            let report = pipeline::run_validate(&config, &site)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
