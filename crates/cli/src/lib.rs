use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "master_config/master_config.yaml";

#[derive(Parser, Debug)]
#[command(name = "fxagg")]
#[command(about = "FxAgg - FX rate aggregation pipeline")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to every enabled platform and start publishing cross rates
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "FXAGG_CONFIG")]
        config: PathBuf,

        /// Override the configured log format (pretty, json, compact)
        #[arg(long)]
        log_format: Option<String>,

        /// Serve Prometheus metrics on this port, overriding the configuration
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Validate configuration without starting the pipeline
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "FXAGG_CONFIG")]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
