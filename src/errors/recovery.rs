// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::{ConfigurationWarning, Violation};

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest installing a missing tool
    pub fn install_tool(tool: &str) -> Self {
        match tool {
            "git" => Self {
                action: "Install git".into(),
                steps: vec![
                    "git is required to fetch remote source repositories".into(),
                    "Local directory sources work without it".into(),
                ],
                commands: vec![
                    "# Debian/Ubuntu:".into(),
                    "apt-get install git".into(),
                    "".into(),
                    "# Homebrew (macOS/Linux):".into(),
                    "brew install git".into(),
                ],
            },
            _ => Self {
                action: format!("Install {}", tool),
                steps: vec![format!("Install {} and ensure it's in your PATH", tool)],
                commands: vec![],
            },
        }
    }

    /// Suggest creating a pipeline file
    pub fn create_pipeline() -> Self {
        Self {
            action: "Create a pipeline definition".into(),
            steps: vec![
                "No .shipflow.yaml found in current directory".into(),
                "Initialize a starter pipeline or write the file manually".into(),
            ],
            commands: vec!["shipflow init".into()],
        }
    }

    /// Suggest a fix for a structural violation
    pub fn for_violation(violation: &Violation) -> Self {
        match violation {
            Violation::UnresolvedInput {
                artifact, action, ..
            } => Self {
                action: format!("Provide artifact '{}' before '{}' runs", artifact, action),
                steps: vec![
                    format!("Add an action producing '{}' to an earlier stage", artifact),
                    format!("Or list '{}' under 'inputs:' and pass it at run time", artifact),
                ],
                commands: vec![
                    "# Inspect the artifact flow:".into(),
                    "shipflow graph --format text".into(),
                ],
            },
            Violation::ChangeSetOrder {
                create, execute, ..
            } => Self {
                action: "Order the change-set actions".into(),
                steps: vec![
                    format!("Set run_order on '{}' lower than on '{}'", create, execute),
                    "Actions sharing a run_order run in declaration order".into(),
                ],
                commands: vec![],
            },
            Violation::EmptyStage { stage } => Self {
                action: format!("Fill or remove stage '{}'", stage),
                steps: vec!["Every stage needs at least one action".into()],
                commands: vec![],
            },
            other => Self {
                action: "Fix the pipeline definition".into(),
                steps: vec![other.to_string()],
                commands: vec!["shipflow validate".into()],
            },
        }
    }

    /// Suggest a fix for a configuration warning
    pub fn for_warning(warning: &ConfigurationWarning) -> Option<Self> {
        match warning {
            ConfigurationWarning::MissingCredential { credential, .. } => Some(Self {
                action: format!("Supply credential '{}'", credential),
                steps: vec![
                    "Live execution is skipped until every source credential is present".into(),
                ],
                commands: vec![
                    format!("export {}=<token>", credential),
                    format!("shipflow run --credential {}=<token>", credential),
                ],
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
