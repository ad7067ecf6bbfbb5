//! Beluga - Command-line tool for compiling chat scripts into chat videos

use std::process::ExitCode;

use beluga::cli;

fn main() -> ExitCode {
    cli::run()
}
