mod cli;

use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("magang_notify=info"));
    fmt().with_env_filter(filter).init();

    let code = match cli::run() {
        cli::RunOutcome::Serve(config) => match magang_notify::serve(config).await {
            Ok(()) => 0,
            Err(err) => {
                error!("{err}");
                1
            }
        },
        cli::RunOutcome::Watch(args) => cli::run_watch(args).await,
        cli::RunOutcome::Exit(code) => code,
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
