// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Synth command - emit the pipeline manifest

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{load_pipeline, ManifestFormat};
use crate::errors::ShipflowError;

/// Run the synth command
pub async fn run(
    pipeline_path: PathBuf,
    format: ManifestFormat,
    output: Option<PathBuf>,
    _verbose: bool,
) -> Result<()> {
    let pipeline = load_pipeline(&pipeline_path)?;
    for warning in pipeline.warnings() {
        eprintln!("  {} {}", "⚠".yellow(), warning);
    }

    let manifest = pipeline.manifest()?;
    let content = match format {
        ManifestFormat::Yaml => manifest.to_yaml()?,
        ManifestFormat::Json => manifest.to_json()?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &content).map_err(|e| ShipflowError::FileWriteError {
                path: path.clone(),
                error: e.to_string(),
            })?;
            eprintln!("  {} Wrote {}", "✓".green(), path.display());
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }

    Ok(())
}
