// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::report_violations;
use crate::errors::{RecoverySuggestion, ShipflowError};
use crate::pipeline::{ExecutionOptions, PipelineBuilder, PipelineDefinition, PipelineExecutor, RunMode};
use crate::providers::{create_default_executors, Credentials};
use crate::utils::create_spinner;

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    dry_run: bool,
    credential_pairs: Vec<String>,
    input_pairs: Vec<String>,
    allow_missing_credentials: bool,
    verbose: bool,
) -> Result<()> {
    let definition = PipelineDefinition::from_file(&pipeline_path)?;
    let pipeline = PipelineBuilder::from_definition(&definition).inspect_err(report_violations)?;

    let credentials = resolve_credentials(&definition, &credential_pairs)?;
    let inputs = parse_inputs(&input_pairs)?;

    let executor =
        PipelineExecutor::with_executors(create_default_executors(credentials, pipeline.deploy()));

    let synthesis_only = !allow_missing_credentials
        && executor
            .warnings(&pipeline)
            .iter()
            .any(|w| w.is_missing_credential());

    if !dry_run && !synthesis_only {
        let spinner = create_spinner("Checking providers...");
        let problems = executor.check_tools(&pipeline).await;
        spinner.finish_and_clear();

        if !problems.is_empty() {
            eprintln!("{}", "Providers not ready:".red().bold());
            for (action, problem) in &problems {
                eprintln!("  {} {}: {}", "✗".red(), action, problem);
                if let ShipflowError::ToolNotFound { tool, .. } = problem {
                    eprintln!("{}", RecoverySuggestion::install_tool(tool));
                }
            }
            return Err(miette::miette!("Required tools are not installed"));
        }
    }

    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let options = ExecutionOptions {
        dry_run,
        allow_missing_credentials,
        verbose,
        inputs,
    };

    let result = executor.execute(&pipeline, &working_dir, &options).await?;

    match result.mode {
        RunMode::Executed => {
            if !result.artifacts.is_empty() {
                println!();
                println!("{}:", "Artifacts".bold());
                for artifact in &result.artifacts {
                    println!(
                        "  - {} {} {}",
                        artifact.name,
                        format!("({})", artifact.producer).dimmed(),
                        &artifact.digest[..12]
                    );
                }
            }
            if let Some(run_id) = &result.run_id {
                println!();
                println!("Run: {}", run_id.cyan());
            }
        }
        RunMode::SynthesisOnly => {
            for warning in result.warnings.iter().filter(|w| w.is_missing_credential()) {
                if let Some(suggestion) = RecoverySuggestion::for_warning(warning) {
                    println!("{}", suggestion);
                }
            }
        }
        RunMode::DryRun => {}
    }

    Ok(())
}

/// Credentials from `NAME=VALUE` pairs, falling back to the process
/// environment for every credential the definition names.
pub(crate) fn resolve_credentials(
    definition: &PipelineDefinition,
    pairs: &[String],
) -> Result<Credentials> {
    let mut credentials = Credentials::new();

    for pair in pairs {
        let (name, value) = Credentials::parse_pair(pair)
            .map_err(|e| miette::miette!("Invalid --credential: {}", e))?;
        credentials.insert(name, value);
    }

    for name in definition.credential_names() {
        if credentials.contains(name) {
            continue;
        }
        if let Ok(value) = std::env::var(name) {
            tracing::debug!(credential = %name, "credential taken from environment");
            credentials.insert(name, value);
        }
    }

    Ok(credentials)
}

fn parse_inputs(pairs: &[String]) -> Result<BTreeMap<String, PathBuf>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => {
                Ok((name.to_string(), PathBuf::from(path)))
            }
            _ => Err(miette::miette!("Invalid --input: expected NAME=PATH, got '{}'", pair)),
        })
        .collect()
}
