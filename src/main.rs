// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! shipflow - Delivery Pipeline Orchestrator
//!
//! Validate and run source → build → deploy pipelines.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shipflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Init { name, force } => shipflow::cli::init::run(name, force, cli.verbose).await,
        Commands::Validate { pipeline } => {
            shipflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Synth {
            pipeline,
            format,
            output,
        } => shipflow::cli::synth::run(pipeline, format, output, cli.verbose).await,
        Commands::Graph { pipeline, format } => {
            shipflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Run {
            pipeline,
            dry_run,
            credentials,
            inputs,
            allow_missing_credentials,
        } => {
            shipflow::cli::run::run(
                pipeline,
                dry_run,
                credentials,
                inputs,
                allow_missing_credentials,
                cli.verbose,
            )
            .await
        }
        Commands::Artifacts { action, pipeline } => {
            shipflow::cli::artifacts::run(action, pipeline, cli.verbose).await
        }
    }
}
