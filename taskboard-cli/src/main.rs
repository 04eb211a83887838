mod commands;
mod config;
mod console;
mod log_bridge;

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = log_bridge::init() {
        log_bridge::write_fallback_line(&format!("failed to initialize logger: {}", e));
    }

    let cli = commands::Cli::parse();
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!(target: "taskboard.cli", "{}", e);
            eprintln!("error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            eprintln!("log: {}", log_bridge::log_file_path());
            ExitCode::FAILURE
        }
    }
}
