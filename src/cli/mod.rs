//! CLI module for docvault
//!
//! Provides command-line interface for:
//! - shell: JSON-lines request loop over an in-memory collection
//! - config: Print the effective configuration

mod args;
mod commands;
mod errors;
mod handler;
mod io;

pub use args::{Cli, Command};
pub use commands::{load_config, print_config, run, run_command, shell};
pub use errors::{CliError, CliResult};
pub use handler::handle_line;
