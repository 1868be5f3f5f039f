// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Action providers
//!
//! This module provides the executor trait and the default collaborators
//! for each action kind (source, build, change-set deployment).

mod build;
mod deploy;
mod source;

pub use build::BuildExecutor;
pub use deploy::{ChangeSetExecutor, ChangeSetLedger, ChangeSetRecord, ChangeSetStatus};
pub use source::{Credentials, SourceExecutor};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::errors::{ConfigurationWarning, ShipflowError};
use crate::pipeline::{Action, ActionKind, DeployConfig};

/// Everything an action may touch while it runs
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Stage the action belongs to
    pub stage: String,
    /// Directory the pipeline was started from
    pub working_dir: PathBuf,
    /// Environment passed to commands
    pub env: BTreeMap<String, String>,
    /// Sealed input artifacts, in declaration order
    pub inputs: Vec<(String, PathBuf)>,
    /// Empty directories for the outputs, in declaration order
    pub outputs: Vec<(String, PathBuf)>,
    /// Scratch directory private to this action
    pub scratch_dir: PathBuf,
    /// Storage root; never copied into artifacts
    pub state_dir: PathBuf,
}

impl ActionContext {
    /// Path of the first input artifact
    pub fn input(&self) -> Option<&Path> {
        self.inputs.first().map(|(_, p)| p.as_path())
    }

    /// Path of the first output artifact
    pub fn output(&self) -> Option<&Path> {
        self.outputs.first().map(|(_, p)| p.as_path())
    }

    /// Directory holding the change-set ledger
    pub fn change_set_dir(&self) -> PathBuf {
        self.state_dir.join("change-sets")
    }
}

/// Result of running one action
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Whether the action succeeded
    pub success: bool,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code
    pub exit_code: i32,

    /// Execution duration
    pub duration: Duration,
}

impl ActionOutcome {
    /// Create a successful outcome
    pub fn success(stdout: String, duration: Duration) -> Self {
        Self {
            success: true,
            stdout,
            stderr: String::new(),
            exit_code: 0,
            duration,
        }
    }

    /// Create a failed outcome
    pub fn failure(stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr,
            exit_code,
            duration,
        }
    }
}

/// Trait for action executors
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run an action
    ///
    /// A collaborator failure is reported as an unsuccessful outcome; `Err` is
    /// reserved for problems the executor could not even attempt.
    async fn execute(
        &self,
        action: &Action,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, ShipflowError>;

    /// Check that whatever the action needs is installed
    async fn check_action(&self, _action: &Action) -> Result<(), ShipflowError> {
        Ok(())
    }

    /// Non-fatal configuration problems for an action
    fn warnings(&self, _action: &Action) -> Vec<ConfigurationWarning> {
        Vec::new()
    }
}

/// Run `command` with `shell -c` and capture the result
pub(crate) async fn run_shell(
    shell: &str,
    command: &str,
    working_dir: &Path,
    env: &BTreeMap<String, String>,
) -> Result<ActionOutcome, ShipflowError> {
    let start = Instant::now();

    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(command);
    cmd.current_dir(working_dir);
    cmd.envs(env);

    let output = cmd.output().await.map_err(|e| ShipflowError::ToolExecutionFailed {
        tool: shell.to_string(),
        error: e.to_string(),
        help: Some(format!("Shell '{}' may not be available", shell)),
    })?;

    Ok(ActionOutcome {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
        duration: start.elapsed(),
    })
}

/// Create the default executor for every action kind
pub fn create_default_executors(
    credentials: Credentials,
    deploy: &DeployConfig,
) -> HashMap<ActionKind, Box<dyn ActionExecutor>> {
    let mut executors: HashMap<ActionKind, Box<dyn ActionExecutor>> = HashMap::new();
    let change_sets = ChangeSetExecutor::new(deploy.clone());

    executors.insert(ActionKind::Source, Box::new(SourceExecutor::new(credentials)));
    executors.insert(ActionKind::Build, Box::new(BuildExecutor::new()));
    executors.insert(ActionKind::ChangeSetCreate, Box::new(change_sets.clone()));
    executors.insert(ActionKind::ChangeSetExecute, Box::new(change_sets));

    executors
}
