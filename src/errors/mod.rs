// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Error types
//!
//! Structural problems in a pipeline are [`Violation`]s. They are found while
//! stages are admitted and again during the full validation pass, and are
//! reported together as [`ShipflowError::Validation`]. Everything that goes
//! wrong once actions are running surfaces as [`ShipflowError::ActionExecution`].

mod recovery;
mod warnings;

pub use recovery::RecoverySuggestion;
pub use warnings::ConfigurationWarning;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for shipflow operations
pub type ShipflowResult<T> = Result<T, ShipflowError>;

/// A structural defect in a pipeline definition
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("Artifact '{name}' is already declared")]
    #[diagnostic(
        code(shipflow::duplicate_artifact),
        help("Artifact names must be unique across the pipeline")
    )]
    DuplicateArtifact { name: String },

    #[error("Stage '{name}' is defined more than once")]
    #[diagnostic(code(shipflow::duplicate_stage), help("Rename one of the stages"))]
    DuplicateStage { name: String },

    #[error("Action '{name}' in stage '{stage}' reuses an existing action name")]
    #[diagnostic(
        code(shipflow::duplicate_action),
        help("Action names must be unique across the whole pipeline, not just the stage")
    )]
    DuplicateAction { name: String, stage: String },

    #[error("Artifact '{artifact}' produced by action '{action}' already comes from '{existing}'")]
    #[diagnostic(
        code(shipflow::duplicate_producer),
        help("Every artifact has exactly one producer; give one of the outputs a new name")
    )]
    DuplicateProducer {
        artifact: String,
        action: String,
        existing: String,
    },

    #[error("Action '{action}' in stage '{stage}' consumes unresolved artifact '{artifact}'")]
    #[diagnostic(
        code(shipflow::unresolved_input),
        help("Produce '{artifact}' in an earlier stage or declare it as a pipeline input")
    )]
    UnresolvedInput {
        artifact: String,
        action: String,
        stage: String,
    },

    #[error("Stage '{stage}' has no actions")]
    #[diagnostic(code(shipflow::empty_stage), help("Add at least one action or remove the stage"))]
    EmptyStage { stage: String },

    #[error("Action '{action}' is invalid: {reason}")]
    #[diagnostic(code(shipflow::invalid_action))]
    InvalidAction { action: String, reason: String },

    #[error("Invalid {what} name '{name}'")]
    #[diagnostic(
        code(shipflow::invalid_name),
        help("Names use 1-100 characters from A-Z, a-z, 0-9, '.', '@', '_' and '-'")
    )]
    InvalidName { what: String, name: String },

    #[error(
        "Change set '{change_set}' in stage '{stage}': '{execute}' must run after '{create}'"
    )]
    #[diagnostic(
        code(shipflow::change_set_order),
        help("Give the execute action a strictly greater run_order than the create action")
    )]
    ChangeSetOrder {
        stage: String,
        change_set: String,
        create: String,
        execute: String,
    },
}

/// Main error type for shipflow
#[derive(Error, Debug, Diagnostic)]
pub enum ShipflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Structural Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(transparent)]
    Violation(#[from] Violation),

    #[error("Pipeline validation failed with {} violation(s)", .violations.len())]
    #[diagnostic(
        code(shipflow::validation_failed),
        help("Fix every listed violation; no part of an invalid pipeline is usable")
    )]
    Validation {
        #[related]
        violations: Vec<Violation>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(shipflow::pipeline_not_found),
        help("Create a pipeline with 'shipflow init' or create .shipflow.yaml manually")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(shipflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Unsupported pipeline file format: {path}")]
    #[diagnostic(
        code(shipflow::unsupported_format),
        help("Use a .yaml, .yml, .json or .toml file")
    )]
    UnsupportedFormat { path: PathBuf },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Action '{action}' in stage '{stage}' failed: {reason}")]
    #[diagnostic(code(shipflow::action_failed))]
    ActionExecution {
        stage: String,
        action: String,
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("No executor registered for action kind '{kind}'")]
    #[diagnostic(
        code(shipflow::executor_not_found),
        help("Available executors: source, build, change-set-create, change-set-execute")
    )]
    ExecutorNotFound { kind: String },

    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(shipflow::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Tool '{tool}' execution failed: {error}")]
    #[diagnostic(code(shipflow::tool_execution_failed))]
    ToolExecutionFailed {
        tool: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("Pipeline input '{artifact}' was not supplied")]
    #[diagnostic(
        code(shipflow::missing_input),
        help("Pass it with '--input {artifact}=<path>'")
    )]
    MissingInput { artifact: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Artifact '{artifact}' is already produced and cannot be rewritten")]
    #[diagnostic(code(shipflow::artifact_sealed))]
    ArtifactSealed { artifact: String },

    #[error("Artifact '{artifact}' has not been produced in this run")]
    #[diagnostic(code(shipflow::artifact_missing))]
    ArtifactMissing { artifact: String },

    #[error("Storage error: {message}")]
    #[diagnostic(code(shipflow::storage_error))]
    Storage { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(shipflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(shipflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(shipflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(shipflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(shipflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(shipflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for ShipflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for ShipflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for ShipflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for ShipflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<toml::ser::Error> for ShipflowError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl ShipflowError {
    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "git" => "Install git: https://git-scm.com/downloads".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Create an action failure, attaching a hint derived from the failure text
    pub fn action_failed(stage: &str, action: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let help = Self::help_for_failure(&reason);
        Self::ActionExecution {
            stage: stage.to_string(),
            action: action.to_string(),
            reason,
            help,
        }
    }

    /// Violations carried by this error, if it is structural
    pub fn violations(&self) -> Vec<&Violation> {
        match self {
            Self::Violation(v) => vec![v],
            Self::Validation { violations } => violations.iter().collect(),
            _ => vec![],
        }
    }

    fn help_for_failure(reason: &str) -> Option<String> {
        if reason.contains("Authentication failed") || reason.contains("could not read Username") {
            Some("The repository needs a credential. Pass it with '--credential NAME=VALUE'.".into())
        } else if reason.contains("command not found") {
            Some("A command used by the build is missing from PATH.".into())
        } else if reason.contains("change set") && reason.contains("not found") {
            Some("Run the change-set-create action before executing it.".into())
        } else {
            None
        }
    }
}
