//! CLI command implementations

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::collection::Collection;
use crate::config::EngineConfig;
use crate::observability::{log_event, Event, LogTarget, Logger};

use super::args::{Cli, Command};
use super::errors::CliResult;
use super::handler::handle_line;
use super::io::{read_requests, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Dispatch a parsed command.
///
/// Both commands write JSON to stdout, so log lines go to stderr.
pub fn run_command(cmd: Command) -> CliResult<()> {
    Logger::set_target(LogTarget::Stderr);
    match cmd {
        Command::Shell { config } => {
            let config = load_config(config.as_deref())?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            shell(config, stdin.lock(), &mut stdout.lock())
        }
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            print_config(&config, &mut io::stdout().lock())
        }
    }
}

/// Configuration from `path`, or the defaults
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let config = EngineConfig::load(path)?;
    let path_str = path.display().to_string();
    log_event(Event::ConfigLoaded, &[("path", path_str.as_str())]);
    Ok(config)
}

/// Serve requests from `input` until end of input.
///
/// Request failures become error responses; only I/O failures end the loop.
pub fn shell<R: BufRead, W: Write>(config: EngineConfig, input: R, output: &mut W) -> CliResult<()> {
    let collection = Collection::new(config)?;
    for line in read_requests(input) {
        let response = handle_line(&collection, &line?);
        write_response(output, &response)?;
    }
    Ok(())
}

/// Write the effective configuration as pretty JSON
pub fn print_config<W: Write>(config: &EngineConfig, output: &mut W) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *output, config)?;
    writeln!(output)?;
    Ok(())
}
