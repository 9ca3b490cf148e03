//! Command-line interface definitions and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;

/// Customer segmentation: RFMT features, K-Means training, and a cluster
/// prediction service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the offline training pipeline and persist the artifacts
    Train {
        /// Override the configured number of clusters
        #[arg(short = 'k', long)]
        clusters: Option<usize>,

        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Serve cluster predictions over HTTP using the persisted artifacts
    Serve {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
    },
}

impl Cli {
    /// Load the configuration and apply command-line overrides
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        match &self.command {
            Command::Train { clusters, seed } => {
                if let Some(k) = clusters {
                    config.training.clusters = *k;
                }
                if let Some(s) = seed {
                    config.training.seed = *s;
                }
            }
            Command::Serve { bind } => {
                if let Some(b) = bind {
                    config.server.bind = b.clone();
                }
            }
        }
        Ok(config)
    }
}
