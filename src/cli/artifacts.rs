// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Artifacts command - inspect and clear stored runs

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::ArtifactsAction;
use crate::pipeline::{PipelineDefinition, StorageConfig};
use crate::storage::ArtifactStore;
use crate::utils::print_header;

/// Run the artifacts command
pub async fn run(action: ArtifactsAction, pipeline_path: PathBuf, _verbose: bool) -> Result<()> {
    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let root = working_dir.join(storage_directory(&pipeline_path));

    match action {
        ArtifactsAction::List => {
            let runs = ArtifactStore::list_runs(&root)?;
            let stats = ArtifactStore::stats(&root)?;

            print_header("Stored Runs");
            println!("  Location: {}", root.display());

            if runs.is_empty() {
                println!("{}", "  No stored runs.".dimmed());
                return Ok(());
            }

            for run in &runs {
                println!();
                println!("  {}", run.run_id.cyan());
                for artifact in &run.artifacts {
                    println!(
                        "    - {} {} {} file(s), {}",
                        artifact.name,
                        format!("({})", artifact.producer).dimmed(),
                        artifact.files,
                        &artifact.digest[..12]
                    );
                }
            }

            println!();
            println!(
                "  {} run(s), {} artifact(s), {}",
                stats.runs,
                stats.artifacts,
                stats.formatted_size()
            );
            Ok(())
        }

        ArtifactsAction::Clear { yes } => {
            let stats = ArtifactStore::stats(&root)?;

            if stats.runs == 0 {
                println!("{}", "Artifact storage is already empty.".dimmed());
                return Ok(());
            }

            if !yes {
                print!(
                    "Remove {} run(s) ({})? [y/N] ",
                    stats.runs,
                    stats.formatted_size()
                );
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            ArtifactStore::clear(&root).await?;
            println!("{}", "Artifact storage cleared.".green());
            Ok(())
        }
    }
}

/// Storage directory named by the definition, or the default one
fn storage_directory(pipeline_path: &Path) -> PathBuf {
    PipelineDefinition::from_file(pipeline_path)
        .map(|d| d.storage.directory)
        .unwrap_or_else(|_| StorageConfig::default().directory)
}
