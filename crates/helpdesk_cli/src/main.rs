//! Administrative CLI for the help-article knowledge base.
//!
//! # Responsibility
//! - Open one store per invocation and run a single backup/restore/inspect
//!   operation against it.
//! - Report failures as one line prefixed with a user-facing category.

use clap::Parser;
use std::process::ExitCode;

mod commands;
mod config;

use config::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.app_config();

    if let Some(log_dir) = config.log_dir.as_deref() {
        if let Err(err) = helpdesk_core::init_logging(&config.log_level, log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    match commands::execute(&config, cli.command) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
