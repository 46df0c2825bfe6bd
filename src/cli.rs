//! Command-line interface for queuecall
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Live queue call terminal: announces and displays pharmacy and clinic calls
#[derive(Parser, Debug)]
#[command(name = "queuecall", version, about = "Live queue call terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration such as `2s`, `1500ms` or `1m`. Bare numbers are milliseconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the call terminal in the foreground
    Run {
        /// Path to control socket (default: $XDG_RUNTIME_DIR/queuecall.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// Push server address (host:port)
        #[arg(long, value_name = "ADDR")]
        address: Option<String>,

        /// Push room to join
        #[arg(long, value_name = "ROOM")]
        room: Option<String>,

        /// Pause between announcements (e.g. 2s, 1500ms)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        cooldown: Option<Duration>,

        /// Log announcements instead of speaking them
        #[arg(long)]
        silent: bool,
    },

    /// Show the status of a running terminal
    Status {
        /// Path to control socket (default: $XDG_RUNTIME_DIR/queuecall.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// Print the raw status JSON
        #[arg(long)]
        json: bool,
    },

    /// Turn roster auto-scroll on or off
    AutoScroll {
        #[arg(value_enum)]
        state: Toggle,

        /// Path to control socket (default: $XDG_RUNTIME_DIR/queuecall.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Stop a running terminal
    Shutdown {
        /// Path to control socket (default: $XDG_RUNTIME_DIR/queuecall.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Speak a phrase through the configured speech engine
    Say {
        /// Text to speak
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Inspect configuration
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

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}
