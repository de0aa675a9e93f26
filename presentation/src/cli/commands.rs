//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for herd
#[derive(Parser, Debug)]
#[command(name = "herd")]
#[command(author, version, about = "Supervisor for local OpenCode backend instances")]
#[command(long_about = r#"
herd discovers, launches and supervises OpenCode servers, one per project
directory, and relays their event streams to the users who own each session.

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./herd.toml         Project-level config
3. ~/.config/herd/config.toml   Global config

HERD_ALLOWED_ROOTS and HERD_UNRESTRICTED override the [projects] section.

Example:
  herd serve
  herd discover
  herd launch ~/src/my-app
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Register known instances, follow their events until Ctrl-C
    Serve,

    /// List running backend servers and their health
    Discover,

    /// Launch (or reuse) the backend for a project directory
    Launch {
        /// Absolute path of the project directory
        #[arg(value_name = "DIR")]
        directory: PathBuf,
    },
}

impl Cli {
    /// `serve` when no subcommand is given.
    pub fn action(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
