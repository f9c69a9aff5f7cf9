//! Quill CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Load configuration**: embedded defaults, `quill.toml`, `--config` /
//!    `QUILL_CONFIG`, then `QUILL_` environment variables (see [`config`]).
//! 2. **Wire observability**: an `EnvFilter`-gated pretty or JSON layer on
//!    stderr, plus an OpenTelemetry OTLP layer when an endpoint is configured.
//! 3. **Construct infrastructure**: the configured HTTP provider (optionally
//!    wrapped in retries) and the SQLite store, injected into
//!    [`nodes::PipelineExecutor`].
//! 4. **Dispatch** the `generate`, `history`, `profile` or `feedback`
//!    subcommand.
//!
//! Exit status: `0` on success, `1` when a run ends without final text, `2`
//! when the request is rejected before any stage runs.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

mod app;
mod cli;
mod config;
mod telemetry;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let _telemetry = telemetry::init(&config.telemetry)?;

    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Generate(args) => app::generate(config, args).await,
        Commands::History(args) => app::history(config, args).await,
        Commands::Profile(args) => app::profile(config, args).await,
        Commands::Feedback(args) => app::feedback(config, args).await,
    }
}
