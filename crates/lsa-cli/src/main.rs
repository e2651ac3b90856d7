//! Longitudinal survey analysis CLI.

use std::process::ExitCode;

use clap::Parser;
use lsa_cli::logging::init_logging;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command};
use crate::commands::{run_harmonize, run_study};

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.color.write_global();
    if let Err(error) = init_logging(&cli.log_config()) {
        eprintln!("error: failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }

    // `Ok(true)` means the run finished but should still fail.
    let outcome = match &cli.command {
        Command::Run(args) => {
            run_study(args).map(|any_omitted| any_omitted && args.fail_on_omitted)
        }
        Command::Harmonize(args) => run_harmonize(args).map(|()| false),
    };
    match outcome {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
