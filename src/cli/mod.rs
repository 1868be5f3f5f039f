// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for shipflow.

pub mod artifacts;
pub mod graph;
pub mod init;
pub mod run;
pub mod synth;
pub mod validate;

use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::errors::{ConfigurationWarning, RecoverySuggestion, ShipflowError};
use crate::pipeline::{Pipeline, PipelineBuilder, PipelineDefinition};
use crate::utils::print_warning;

/// Default pipeline definition file
pub const DEFAULT_PIPELINE_FILE: &str = ".shipflow.yaml";

/// Delivery pipeline orchestrator
///
/// Validate, visualize and run source → build → deploy pipelines.
#[derive(Parser, Debug)]
#[clap(
    name = "shipflow",
    version,
    about = "Delivery pipeline orchestrator with validated artifact flow",
    long_about = None,
    after_help = "Examples:\n\
        shipflow init                   Create a starter .shipflow.yaml\n\
        shipflow validate               Check the pipeline for errors\n\
        shipflow graph -f mermaid       Show the artifact flow\n\
        shipflow run --credential GITHUB_TOKEN=...   Execute the pipeline\n\n\
        See 'shipflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a starter pipeline definition
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Overwrite an existing definition
        #[clap(long)]
        force: bool,
    },

    /// Validate the pipeline and report every violation
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = DEFAULT_PIPELINE_FILE, env = "SHIPFLOW_PIPELINE")]
        pipeline: PathBuf,
    },

    /// Emit the synthesized pipeline manifest
    Synth {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE_FILE, env = "SHIPFLOW_PIPELINE")]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "yaml", value_parser = clap::builder::PossibleValuesParser::new(["yaml", "json"]).map(|s| s.parse::<ManifestFormat>().unwrap()))]
        format: ManifestFormat,

        /// Output file (default: stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the artifact flow as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE_FILE, env = "SHIPFLOW_PIPELINE")]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text", value_parser = clap::builder::PossibleValuesParser::new(["text", "dot", "mermaid"]).map(|s| s.parse::<GraphFormat>().unwrap()))]
        format: GraphFormat,
    },

    /// Run the pipeline
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = DEFAULT_PIPELINE_FILE, env = "SHIPFLOW_PIPELINE")]
        pipeline: PathBuf,

        /// Dry run (show what would be done)
        #[clap(long)]
        dry_run: bool,

        /// Credential for source actions, as NAME=VALUE
        #[clap(long = "credential", value_name = "NAME=VALUE")]
        credentials: Vec<String>,

        /// Path for a declared pipeline input, as NAME=PATH
        #[clap(long = "input", value_name = "NAME=PATH")]
        inputs: Vec<String>,

        /// Execute even if a credential is missing
        #[clap(long)]
        allow_missing_credentials: bool,
    },

    /// Artifact storage management
    Artifacts {
        #[clap(subcommand)]
        action: ArtifactsAction,

        /// Pipeline file (locates the storage directory)
        #[clap(short, long, default_value = DEFAULT_PIPELINE_FILE, env = "SHIPFLOW_PIPELINE", global = true)]
        pipeline: PathBuf,
    },
}

/// Artifact storage actions
#[derive(Subcommand, Debug, Clone)]
pub enum ArtifactsAction {
    /// List stored runs and their artifacts
    List,

    /// Remove every stored run
    Clear {
        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },
}

/// Manifest output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
}

impl std::str::FromStr for ManifestFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown manifest format: {}", s)),
        }
    }
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

/// Load a definition and validate it into a pipeline
pub(crate) fn load_pipeline(path: &Path) -> Result<Pipeline, ShipflowError> {
    let definition = PipelineDefinition::from_file(path).inspect_err(|e| {
        if matches!(e, ShipflowError::PipelineNotFound { .. }) {
            eprintln!("{}", RecoverySuggestion::create_pipeline());
        }
    })?;
    PipelineBuilder::from_definition(&definition).inspect_err(report_violations)
}

/// Print violations of a failed validation with recovery hints
pub(crate) fn report_violations(error: &ShipflowError) {
    let violations = error.violations();
    if violations.is_empty() {
        return;
    }

    eprintln!("{}:", "Errors".red().bold());
    for violation in violations {
        eprintln!("  {} {}", "✗".red(), violation);
        let suggestion = RecoverySuggestion::for_violation(violation);
        eprintln!("      {} {}", "→".blue(), suggestion.action.dimmed());
    }
    eprintln!();
}

/// Print configuration warnings
pub(crate) fn report_warnings(warnings: &[ConfigurationWarning]) {
    if warnings.is_empty() {
        return;
    }

    println!("{}:", "Warnings".yellow().bold());
    for warning in warnings {
        print_warning(&warning.to_string());
        if let Some(suggestion) = RecoverySuggestion::for_warning(warning) {
            println!("      {}", suggestion.action.dimmed());
        }
    }
    println!();
}
