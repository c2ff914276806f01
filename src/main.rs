//! docvault CLI entry point
//!
//! Parses arguments, runs the command, and exits non-zero on failure.
//! All logic lives in the `cli` module.

use docvault::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}: {}", e.code_str(), e);
        std::process::exit(1);
    }
}
