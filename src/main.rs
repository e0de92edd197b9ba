//! shcache - cached shell command runner
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use shcache::cli::{Cli, Commands};
use shcache::config::{Config, ConfigManager};
use shcache::error::ShcacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ShcacheResult<ExitCode> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    apply_overrides(&cli, &mut config);

    let success = |()| ExitCode::SUCCESS;
    match cli.command {
        Commands::Get(args) => shcache::cli::commands::get(args, &config).await,
        Commands::Update(args) => shcache::cli::commands::update(args, &config).await.map(success),
        Commands::Code(args) => shcache::cli::commands::code(args, &config).await.map(success),
        Commands::Peek(args) => shcache::cli::commands::peek(args, &config).await.map(success),
        Commands::Status(args) => shcache::cli::commands::status(args, &config).await.map(success),
        Commands::Key(args) => shcache::cli::commands::key(args).map(success),
        Commands::Config(args) => shcache::cli::commands::config(args, &config_manager, &config)
            .await
            .map(success),
    }
}

/// Initialize logging on stderr: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("shcache=warn"),
        1 => EnvFilter::new("shcache=info"),
        _ => EnvFilter::new("shcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

/// Command-line flags win over the config file
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(ref dir) = cli.cache_dir {
        config.cache.dir = Some(dir.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.cache.timeout_secs = timeout;
    }
}
