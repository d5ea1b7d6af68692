//! Lodestone CLI - inspect and maintain build-cache databases
//!
//! Usage: lodestone <command> [arguments]

mod check_cmd;
mod cli;
mod links_cmd;
mod release_cmd;
mod results_cmd;
mod status_cmd;
mod walk_cmd;

use anyhow::Result;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let command = match cli::parse_args() {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            cli::print_usage();
            return ExitCode::from(2);
        }
    };

    match run(command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: cli::Command) -> Result<ExitCode> {
    match command {
        cli::Command::Status { db_path, json } => {
            status_cmd::run_status(db_path, json)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Walk { db_path } => {
            walk_cmd::run_walk(db_path)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Results { db_path, id } => {
            results_cmd::run_results(db_path, &id)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Links { db_path, id } => {
            links_cmd::run_links(db_path, &id)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Check { db_path, json } => {
            let passed = check_cmd::run_check(db_path, json)?;
            Ok(if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        cli::Command::Release { db_path, result_id } => {
            release_cmd::run_release(db_path, &result_id)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Version => {
            println!("{}", lodestone::version::version());
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Help => {
            cli::print_usage();
            Ok(ExitCode::SUCCESS)
        }
    }
}
