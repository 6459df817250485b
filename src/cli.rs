//! Command-line interface for signstream
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Turn hand-sign frames into words
#[derive(Parser, Debug)]
#[command(name = "signstream", version, about = "Turn hand-sign frames into words")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging on stderr (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse an idle-flush duration.
///
/// Bare numbers are milliseconds; anything else goes through `humantime`
/// (`1500ms`, `2s`, `1s500ms`).
fn parse_idle_flush(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let duration = match s.parse::<u64>() {
        Ok(ms) => Duration::from_millis(ms),
        Err(_) => humantime::parse_duration(s).map_err(|e| e.to_string())?,
    };
    if duration.is_zero() {
        return Err("idle flush must be longer than zero".to_string());
    }
    Ok(duration)
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay or stream frames (JSON lines) and print the words they spell
    Run {
        /// Frame file, or `-` for stdin (default: stdin)
        #[arg(long, short = 'i', value_name = "FILE")]
        input: Option<PathBuf>,

        /// Classifier endpoint for frames without a recorded label
        #[arg(long, value_name = "URL")]
        classifier_url: Option<String>,

        /// Word list to segment against (default: builtin list)
        #[arg(long, value_name = "PATH")]
        dictionary: Option<PathBuf>,

        /// Idle time before the letter buffer is segmented. Examples: 1500, 1500ms, 2s
        #[arg(long, value_name = "DURATION", value_parser = parse_idle_flush)]
        idle_flush: Option<Duration>,

        /// Print one JSON object per event instead of text
        #[arg(long)]
        json: bool,
    },

    /// Segment a run of letters into dictionary words
    Segment {
        /// Letters to segment (e.g., HELLOGOOD)
        letters: String,

        /// Word list to segment against (default: builtin list)
        #[arg(long, value_name = "PATH")]
        dictionary: Option<PathBuf>,
    },

    /// Suggest completions for a partial word
    Suggest {
        /// Partial word (e.g., GOO)
        partial: String,

        /// Word list to rank (default: builtin list)
        #[arg(long, value_name = "PATH")]
        dictionary: Option<PathBuf>,
    },

    /// View and create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
