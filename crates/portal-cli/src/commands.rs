//! CLI command definitions.

use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Pre-cache the static assets of the configured version
    Install,

    /// Delete every cache generation except the configured version
    Activate,

    /// Fetch a URL through the offline cache
    Fetch {
        /// URL to fetch
        url: String,

        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,

        /// Treat the request as an image
        #[arg(long)]
        image: bool,

        /// Write the response body to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the configured version and the state of its cache
    Status,

    /// Manage cache generations
    Caches {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cache generations
    List {
        /// Also list the entries of each generation
        #[arg(short, long)]
        entries: bool,
    },

    /// Delete cache generations
    Clear {
        /// Only delete this generation
        #[arg(short, long)]
        generation: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
