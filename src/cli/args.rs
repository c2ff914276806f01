//! CLI argument definitions using clap
//!
//! Commands:
//! - docvault shell [--config <path>]
//! - docvault config [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docvault - an in-memory document store with tiered storage
#[derive(Parser, Debug)]
#[command(name = "docvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute JSON requests from stdin against a fresh collection
    Shell {
        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
