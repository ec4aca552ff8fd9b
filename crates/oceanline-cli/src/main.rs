//! oceanline - Ocean-color dataset fetcher for NASA Earthdata
//!
//! Authenticates against Earthdata Login, searches the CMR catalog for each
//! configured collection and downloads the granules into a local tree.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;
use oceanline_core::Verbosity;

#[derive(Parser)]
#[command(name = "oceanline")]
#[command(about = "Fetch ocean-color datasets from NASA Earthdata")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./oceanline.toml or ~/.config/oceanline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Env file with EARTHDATA_* credentials (default: .env, searched upwards)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Search and download the configured datasets
    Fetch(cmd::fetch::FetchArgs),
    /// Log in and show the session status
    Auth,
    /// List the configured datasets
    Datasets(cmd::datasets::DatasetsArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Env file first: RUST_LOG and credentials may come from it
    let env_result = oceanline_core::load_env_file(cli.env_file.as_deref());

    let progress = Arc::new(oceanline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug; progress bars show activity
    //   non-TTY: info unless --debug; logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug && !matches!(cli.command, Command::Auth);
    oceanline_core::init_logging(Verbosity::from_flags(quiet, cli.debug), multi);

    match env_result {
        Ok(Some(path)) => log::info!("Loaded environment from {}", path.display()),
        Ok(None) => log::debug!("No env file found"),
        Err(e) => {
            return Err(e).context(match &cli.env_file {
                Some(path) => format!("Failed to load env file: {}", path.display()),
                None => "Failed to load .env".to_string(),
            });
        }
    }

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply HTTP settings (config file defaults, CLI overrides)
    let http_config = oceanline_core::HttpConfig {
        read_timeout: std::time::Duration::from_secs(
            cli.read_timeout.unwrap_or(config.http.read_timeout),
        ),
        max_retries: cli.max_retries.unwrap_or(config.http.max_retries),
        ..Default::default()
    };
    oceanline_core::set_http_config(http_config);

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &config, &progress),
        Command::Auth => cmd::auth::run(&config),
        Command::Datasets(args) => cmd::datasets::run(args, &config),
        Command::Config => {
            let mut table = cmd::table(&["Setting", "Value"]);

            table.add_row(vec![
                "Data root",
                &config.output.root.display().to_string(),
            ]);
            table.add_row(vec![
                "Date range",
                &format!("{} .. {}", config.range.start, config.range.end),
            ]);
            table.add_row(vec![
                "Datasets",
                &if config.datasets.is_empty() {
                    "built-in".to_string()
                } else {
                    format!("{} configured", config.datasets.len())
                },
            ]);
            table.add_row(vec!["URS URL", &config.earthdata.urs_url]);
            table.add_row(vec!["CMR URL", &config.earthdata.cmr_url]);
            table.add_row(vec!["Credentials", cmd::credential_source(&config)]);
            table.add_row(vec![
                "Read timeout",
                &format!("{}s", config.http.read_timeout),
            ]);
            table.add_row(vec!["Max retries", &config.http.max_retries.to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
