//! Clap derive structures for the `lapbridge` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lapbridge -- RFID reader to lap-timing API bridge
#[derive(Debug, Parser)]
#[command(
    name = "lapbridge",
    version,
    about = "Bridge an RFID reader's tag stream to a lap-timing API",
    long_about = "Connects to an RFID reader, tracks every tag it sees, and forwards a\n\
        lap event to the timing API whenever a tag reappears after the debounce\n\
        window. Keeps the API informed with a periodic ping.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "LAPBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Bearer token for the lap API (overrides env, keyring and config)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Lap API base URL (overrides config)
    #[arg(long, short = 'u', env = "LAPBRIDGE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Reader address, `host` or `host:port` (overrides config)
    #[arg(long, short = 'r', env = "LAPBRIDGE_READER", global = true)]
    pub reader: Option<String>,

    /// Output format for documents
    #[arg(
        long,
        short = 'o',
        env = "LAPBRIDGE_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Pretty table where a document has one, JSON otherwise
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge and accept console commands on stdin
    Run(RunArgs),

    /// Send a single ping to the lap API
    Ping,

    /// Manage CLI configuration
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Use the in-process simulated reader instead of a real one
    #[arg(long)]
    pub simulate: bool,

    /// Tags the simulated reader reports, comma separated hex EPCs
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "E20034120000000000000001,E20034120000000000000002",
        requires = "simulate"
    )]
    pub sim_tags: Vec<String>,

    /// Milliseconds between simulated inventory rounds
    #[arg(long, default_value = "1000", requires = "simulate")]
    pub sim_period_ms: u64,

    /// Start the inventory stream once the reader is connected
    #[arg(long)]
    pub start_stream: bool,

    /// Log passes instead of sending them (no token or API needed)
    #[arg(long)]
    pub dry_run: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current resolved configuration (token masked)
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store the API token in the system keyring
    SetToken {
        /// Token value (read from stdin when omitted)
        token: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sim_flags_require_simulate() {
        let parsed = Cli::try_parse_from(["lapbridge", "run", "--sim-period-ms", "10"]);
        assert!(parsed.is_err());
    }
}
