// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Validate command - check the pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::run::resolve_credentials;
use super::{report_violations, report_warnings};
use crate::errors::ShipflowError;
use crate::pipeline::{PipelineBuilder, PipelineDefinition, PipelineExecutor, PipelineValidator};
use crate::providers::create_default_executors;

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let definition = match PipelineDefinition::from_file(&pipeline_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("  {} Failed to parse pipeline", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    println!("  {} Pipeline file parsed", "✓".green());
    println!();

    let report = PipelineValidator::check(&definition);
    if !report.is_valid() {
        let count = report.violations.len();
        report_violations(&ShipflowError::Validation {
            violations: report.violations,
        });
        report_warnings(&report.warnings);
        return Err(miette::miette!(
            "Pipeline validation failed with {} violation(s)",
            count
        ));
    }

    let pipeline = PipelineBuilder::from_definition(&definition)?;
    let credentials = resolve_credentials(&definition, &[])?;
    let executor =
        PipelineExecutor::with_executors(create_default_executors(credentials, pipeline.deploy()));
    let warnings = executor.warnings(&pipeline);
    report_warnings(&warnings);

    if verbose {
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name());
        println!("  Storage: {}", pipeline.storage_identifier());
        println!("  Stages: {}", pipeline.stages().len());
        for stage in pipeline.stages() {
            let actions: Vec<&str> = stage.ordered_actions().iter().map(|a| a.name.as_str()).collect();
            println!("    - {} {}", stage.name, format!("[{}]", actions.join(", ")).dimmed());
        }
        println!();
    }

    if warnings.is_empty() {
        println!("{}", "Pipeline is valid!".green().bold());
    } else {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    }

    Ok(())
}
