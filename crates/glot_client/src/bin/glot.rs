use std::process::ExitCode;

use clap::Parser;
use glot_client::cli::Cli;
use glot_client::commands;
use glot_client::logging::init_logging;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.debug, cli.global.log_format);

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "glot failed");
            ExitCode::FAILURE
        }
    }
}
