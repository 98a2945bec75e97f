//! formcheck entry point.
//!
//! ```bash
//! formcheck check signup.toml values.json
//! formcheck fields signup.toml
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use formcheck_cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Diagnostics go to stderr so stdout stays parseable with --json.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    formcheck_cli::run(Cli::parse()).await
}
