//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// shcache - cache the output of long-running shell commands
///
/// Runs a command at most once across concurrent callers and serves its
/// output and exit code from disk until the cache timeout expires.
#[derive(Parser, Debug)]
#[command(name = "shcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory (overrides config)
    #[arg(long, global = true, env = "SHCACHE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Seconds before a cached result is refreshed (overrides config)
    #[arg(short, long, global = true, env = "SHCACHE_TIMEOUT")]
    pub timeout: Option<u64>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the cached output, running the command if needed
    Get(GetArgs),

    /// Run the command now (or wait for the run in progress) and print its output
    Update(CommandArgs),

    /// Print the cached exit code, running the command if needed
    Code(CommandArgs),

    /// Print the entry as it is on disk, even while the command is still running
    Peek(PeekArgs),

    /// Show the cache state of a command
    Status(StatusArgs),

    /// Print the cache key of a command
    Key(CommandArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// The cached command
#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Shell command, passed as a single argument
    pub command: String,
}

/// Arguments for the get command
#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub target: CommandArgs,

    /// Exit with the cached exit code of the command
    #[arg(short, long)]
    pub exit: bool,
}

/// Arguments for the peek command
#[derive(Args, Debug)]
pub struct PeekArgs {
    #[command(flatten)]
    pub target: CommandArgs,

    /// Keep printing new output until no update is in progress
    #[arg(short, long)]
    pub follow: bool,

    /// Poll interval for --follow, in milliseconds
    #[arg(long, default_value = "500")]
    pub interval_ms: u64,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: CommandArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the status command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Cache state only
    Plain,
}
