//! CLI argument definitions.
//!
//! All Clap derive structs for `crimson` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::FsyncPolicy;
use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// In-memory Redis-compatible key-value server.
#[derive(Parser, Debug)]
#[command(name = "crimson", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "CRIMSON_COLOR")]
    pub color: ColorChoice,

    /// Log line format.
    #[arg(long, default_value = "human", global = true, env = "CRIMSON_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server.
    Run(RunArgs),

    /// Validate an append-only file without loading it.
    CheckAof(CheckAofArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

// ============================================================================
// Run
// ============================================================================

/// Arguments for `run`.
///
/// Every flag overrides the matching field of the YAML file given with
/// `--config`; unset flags leave the file (or the default) alone.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "CRIMSON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Interface to listen on.
    #[arg(long, env = "CRIMSON_BIND")]
    pub bind: Option<String>,

    /// TCP port (0 picks a free one).
    #[arg(short, long, env = "CRIMSON_PORT")]
    pub port: Option<u16>,

    /// Maximum simultaneous clients.
    #[arg(long, env = "CRIMSON_MAX_CLIENTS")]
    pub max_clients: Option<usize>,

    /// Largest accepted request, in bytes.
    #[arg(long, env = "CRIMSON_MAX_FRAME_SIZE")]
    pub max_frame_size: Option<usize>,

    /// Active expiry interval (e.g. `100ms`).
    #[arg(long, env = "CRIMSON_EXPIRE_INTERVAL", value_parser = parse_duration)]
    pub expire_interval: Option<Duration>,

    /// Journal writes to the append-only file (`yes`/`no`; bare flag means yes).
    #[arg(
        long,
        env = "CRIMSON_APPENDONLY",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "yes",
        value_parser = BoolishValueParser::new(),
    )]
    pub appendonly: Option<bool>,

    /// Append-only file path.
    #[arg(long, env = "CRIMSON_APPENDFILENAME")]
    pub appendfilename: Option<PathBuf>,

    /// When the append-only file is synced to disk.
    #[arg(long, env = "CRIMSON_APPENDFSYNC")]
    pub appendfsync: Option<FsyncPolicy>,

    /// Serve Prometheus metrics on `127.0.0.1:<port>`.
    #[arg(long, env = "CRIMSON_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

fn parse_duration(raw: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(raw)
}

// ============================================================================
// Check AOF
// ============================================================================

/// Arguments for `check-aof`.
#[derive(Args, Debug)]
pub struct CheckAofArgs {
    /// Append-only file to check.
    pub file: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
