// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Non-fatal configuration warnings

use serde::Serialize;
use std::fmt;

/// A problem that does not stop synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigurationWarning {
    /// A source action names a credential nobody supplied
    MissingCredential { action: String, credential: String },

    /// A change set is executed but never created by this pipeline
    UnpairedChangeSet {
        action: String,
        stack: String,
        change_set: String,
    },

    /// A declared pipeline input that no action consumes
    UnusedInput { artifact: String },
}

impl ConfigurationWarning {
    /// Whether this warning blocks live execution
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }
}

impl fmt::Display for ConfigurationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential { action, credential } => write!(
                f,
                "Action '{}': credential '{}' is not set; continuing in synthesis-only mode",
                action, credential
            ),
            Self::UnpairedChangeSet {
                action,
                stack,
                change_set,
            } => write!(
                f,
                "Action '{}' executes change set '{}' on stack '{}' which no earlier action creates",
                action, change_set, stack
            ),
            Self::UnusedInput { artifact } => {
                write!(f, "Pipeline input '{}' is never consumed", artifact)
            }
        }
    }
}
