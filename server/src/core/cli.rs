use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_AI_ENABLED, ENV_AI_TIMEOUT_SECS, ENV_AI_URL, ENV_CONFIG, ENV_EPHEMERAL, ENV_HOST,
    ENV_MAX_RECENT_QUERIES, ENV_PORT,
};

#[derive(Parser)]
#[command(name = "ivy")]
#[command(version, about = "Ivy table query server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Keep recent queries, saved filters and column layout in memory only
    #[arg(long, global = true, env = ENV_EPHEMERAL)]
    pub ephemeral: bool,

    /// Enable AI-assisted correction of invalid queries
    #[arg(long, global = true, env = ENV_AI_ENABLED)]
    pub ai_enabled: Option<bool>,

    /// Query correction service endpoint
    #[arg(long, global = true, env = ENV_AI_URL)]
    pub ai_url: Option<String>,

    /// Query correction request timeout in seconds
    #[arg(long, global = true, env = ENV_AI_TIMEOUT_SECS)]
    pub ai_timeout_secs: Option<u64>,

    /// Number of recent queries kept per table
    #[arg(long, global = true, env = ENV_MAX_RECENT_QUERIES)]
    pub max_recent_queries: Option<usize>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Parse a query against a configured table and print the filter tree
    Parse {
        /// Table id from the config file
        #[arg(long, short = 't')]
        table: String,
        /// Query text
        query: String,
    },
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete local data directory (recent queries, saved filters). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub ephemeral: bool,
    pub ai_enabled: Option<bool>,
    pub ai_url: Option<String>,
    pub ai_timeout_secs: Option<u64>,
    pub max_recent_queries: Option<usize>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        ephemeral: cli.ephemeral,
        ai_enabled: cli.ai_enabled,
        ai_url: cli.ai_url,
        ai_timeout_secs: cli.ai_timeout_secs,
        max_recent_queries: cli.max_recent_queries,
    };
    (config, cli.command)
}
