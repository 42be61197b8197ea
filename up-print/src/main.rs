use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use up_print::cli::{exit_code, run, Cli, InputError};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only progress lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    tracing::info!("CLI arguments parsed, invoking run");
    match run(cli).await {
        Ok(()) => {
            tracing::info!("CLI completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "CLI exited with error");
            if e.downcast_ref::<InputError>().is_some() {
                eprintln!("{e}");
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(exit_code(&e))
        }
    }
}
