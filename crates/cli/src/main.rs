//! Linkier command line.
//!
//! This binary is the composition root. On every invocation it:
//!
//! 1. **Parses configuration**: `linkier.toml` (or `--config`), with
//!    `LINKIER_BACKEND_URL` / `LINKIER_ANON_KEY` overrides.
//! 2. **Wires observability**: `tracing-subscriber` writing compact or JSON
//!    lines to stderr, plus an OpenTelemetry OTLP exporter when
//!    `telemetry.otlp_endpoint` is set.
//! 3. **Constructs infrastructure**: the hosted REST backend, or the
//!    in-process backend loaded from its JSON snapshot when
//!    `backend.kind = "memory"`, injected into [`workflows::Marketplace`].
//! 4. **Runs one subcommand** as the user whose session is stored in
//!    `<config dir>/linkier/session.json`, refreshing it when expired.
//!
//! Results go to stdout as text, or as JSON with `--json`.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;

mod app;
mod cli;
mod commands;
mod config;
mod output;
mod session;
mod telemetry;

use crate::app::App;
use crate::cli::Cli;
use crate::config::CliConfig;

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load '{}'", cli.config.display()))?;
    let telemetry = telemetry::init(&config.logging, &config.telemetry)?;

    let result = async {
        let app = App::from_config(&config).await?;
        let outcome = commands::execute(&app, cli.command).await;
        // Saved even when the command failed part-way.
        app.persist().await?;
        let report = outcome?;
        println!("{}", report.render(cli.json));
        Ok::<_, anyhow::Error>(())
    }
    .await;

    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "Command failed");
    }
    telemetry.shutdown();
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
