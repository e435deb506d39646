use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mediquery_api::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();

    // Logs go to stderr so answers on stdout stay clean
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    run(Cli::parse()).await
}
