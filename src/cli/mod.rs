//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for remote-term.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug, Clone)]
#[command(name = "remote-term")]
#[command(about = "Remote terminal session client")]
#[command(long_about = "Create, list, attach to and shut down terminals on a remote server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, default_value = "remote-term.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Server base URL, overriding the configuration
    #[arg(long)]
    pub base_url: Option<String>,

    /// Server token, overriding the configuration
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List terminals running on the server
    List,

    /// Create a new terminal and print its name
    Create {
        /// Connect to this terminal name instead of letting the server pick one
        #[arg(long)]
        name: Option<String>,
    },

    /// Shut down a terminal by name
    Shutdown {
        /// Terminal name
        name: String,
    },

    /// Attach to a terminal, forwarding stdin lines and printing output
    Attach {
        /// Terminal name; a new terminal is created when omitted
        name: Option<String>,

        /// Terminal rows sent on attach
        #[arg(long, default_value_t = 24)]
        rows: u16,

        /// Terminal columns sent on attach
        #[arg(long, default_value_t = 80)]
        cols: u16,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration to the config file
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Adjust log level based on verbose flag
    pub fn effective_log_level(&self, config: &Config) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.log_level.clone())
        }
    }

    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.server.base_url = base_url.clone();
        }
        if let Some(token) = &self.token {
            config.server.token = Some(token.clone());
        }
    }
}
