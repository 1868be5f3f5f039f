// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Source provider
//!
//! Copies a local directory or clones a git repository into the action's
//! output artifact.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tokio::process::Command;

use super::{ActionContext, ActionExecutor, ActionOutcome};
use crate::errors::{ConfigurationWarning, ShipflowError};
use crate::pipeline::{Action, Provider};
use crate::storage::copy_tree;

/// Named secrets handed to the source provider
#[derive(Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build from `(name, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut credentials = Self::new();
        for (name, value) in pairs {
            credentials.insert(name, value);
        }
        credentials
    }

    /// Parse a `NAME=VALUE` pair
    pub fn parse_pair(pair: &str) -> Result<(String, String), String> {
        match pair.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => Err(format!("expected NAME=VALUE, got '{}'", pair)),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

/// Source executor
pub struct SourceExecutor {
    credentials: Credentials,
}

impl SourceExecutor {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    fn is_remote(repository: &str) -> bool {
        repository.contains("://") || repository.starts_with("git@")
    }

    async fn clone_repository(
        &self,
        repository: &str,
        branch: Option<&str>,
        credential: Option<&str>,
        target: &Path,
    ) -> Result<ActionOutcome, ShipflowError> {
        let start = Instant::now();

        let mut cmd = Command::new("git");
        if let Some(token) = credential.and_then(|name| self.credentials.get(name)) {
            cmd.arg("-c")
                .arg(format!("http.extraHeader=Authorization: Bearer {}", token));
        }
        cmd.args(["clone", "--depth", "1"]);
        if let Some(branch) = branch {
            cmd.args(["--branch", branch]);
        }
        cmd.arg(repository).arg(target);
        cmd.env("GIT_TERMINAL_PROMPT", "0");

        let output = cmd.output().await.map_err(|e| ShipflowError::ToolExecutionFailed {
            tool: "git".to_string(),
            error: e.to_string(),
            help: Some("Install git: https://git-scm.com/downloads".to_string()),
        })?;

        let duration = start.elapsed();
        if !output.status.success() {
            return Ok(ActionOutcome::failure(
                String::from_utf8_lossy(&output.stderr).to_string(),
                output.status.code().unwrap_or(-1),
                duration,
            ));
        }

        let git_dir = target.join(".git");
        if git_dir.exists() {
            tokio::fs::remove_dir_all(&git_dir).await?;
        }

        Ok(ActionOutcome::success(
            String::from_utf8_lossy(&output.stderr).to_string(),
            duration,
        ))
    }
}

#[async_trait]
impl ActionExecutor for SourceExecutor {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, ShipflowError> {
        let Provider::Source {
            repository,
            branch,
            credential,
        } = &action.provider
        else {
            return Err(ShipflowError::action_failed(
                &ctx.stage,
                &action.name,
                "expected a source provider",
            ));
        };

        let target = ctx.output().ok_or_else(|| {
            ShipflowError::action_failed(&ctx.stage, &action.name, "source action has no output")
        })?;

        if Self::is_remote(repository) {
            tracing::info!(action = %action.name, repository = %repository, "cloning source");
            return self
                .clone_repository(repository, branch.as_deref(), credential.as_deref(), target)
                .await;
        }

        let start = Instant::now();
        let source_dir = ctx.working_dir.join(repository);
        if !source_dir.is_dir() {
            return Ok(ActionOutcome::failure(
                format!("repository '{}' is not a directory", source_dir.display()),
                1,
                start.elapsed(),
            ));
        }

        let copied = copy_tree(&source_dir, target, &[ctx.state_dir.clone()])?;
        Ok(ActionOutcome::success(
            format!("copied {} file(s) from {}", copied, source_dir.display()),
            start.elapsed(),
        ))
    }

    async fn check_action(&self, action: &Action) -> Result<(), ShipflowError> {
        if let Provider::Source { repository, .. } = &action.provider {
            if Self::is_remote(repository) && which::which("git").is_err() {
                return Err(ShipflowError::tool_not_found("git"));
            }
        }
        Ok(())
    }

    fn warnings(&self, action: &Action) -> Vec<ConfigurationWarning> {
        match &action.provider {
            Provider::Source {
                credential: Some(name),
                ..
            } if !self.credentials.contains(name) => vec![ConfigurationWarning::MissingCredential {
                action: action.name.clone(),
                credential: name.clone(),
            }],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn source_action(repository: &str, credential: Option<&str>) -> Action {
        Action::new(
            "pull",
            Provider::Source {
                repository: repository.into(),
                branch: None,
                credential: credential.map(Into::into),
            },
        )
        .with_outputs(["src"])
    }

    fn context(root: &Path, output: PathBuf) -> ActionContext {
        ActionContext {
            stage: "Source".into(),
            working_dir: root.to_path_buf(),
            env: BTreeMap::new(),
            inputs: vec![],
            outputs: vec![("src".into(), output)],
            scratch_dir: root.join("scratch"),
            state_dir: root.join(".shipflow"),
        }
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            Credentials::parse_pair("TOKEN=a=b").unwrap(),
            ("TOKEN".to_string(), "a=b".to_string())
        );
        assert!(Credentials::parse_pair("TOKEN").is_err());
        assert!(Credentials::parse_pair("=x").is_err());
    }

    #[test]
    fn test_debug_redacts_values() {
        let credentials = Credentials::from_pairs([("TOKEN", "hunter2")]);
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("TOKEN"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_missing_credential_warning() {
        let executor = SourceExecutor::new(Credentials::new());
        let warnings = executor.warnings(&source_action("https://example.com/a.git", Some("TOKEN")));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].is_missing_credential());

        let executor = SourceExecutor::new(Credentials::from_pairs([("TOKEN", "x")]));
        assert!(executor
            .warnings(&source_action("https://example.com/a.git", Some("TOKEN")))
            .is_empty());
    }

    #[tokio::test]
    async fn test_local_directory_is_copied() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("app");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("main.rs"), "fn main() {}").unwrap();

        let output = temp_dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();

        let executor = SourceExecutor::new(Credentials::new());
        let outcome = executor
            .execute(&source_action("app", None), &context(temp_dir.path(), output.clone()))
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(output.join("main.rs").exists());
    }

    #[tokio::test]
    async fn test_missing_local_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");

        let executor = SourceExecutor::new(Credentials::new());
        let outcome = executor
            .execute(&source_action("nowhere", None), &context(temp_dir.path(), output))
            .await
            .unwrap();

        assert!(!outcome.success);
    }
}
