// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Two-phase deployment provider
//!
//! `change-set-create` stages a template, `change-set-execute` applies it.
//! With `deploy.create_command` / `deploy.execute_command` set, those commands
//! do the work; otherwise a local ledger records each change set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use super::{run_shell, ActionContext, ActionExecutor, ActionOutcome};
use crate::errors::ShipflowError;
use crate::pipeline::validation::stays_inside;
use crate::pipeline::{Action, DeployConfig, Provider};
use crate::storage::hash_file;

/// Lifecycle of a change set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSetStatus {
    Created,
    Executed,
}

/// One ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSetRecord {
    pub stack: String,
    pub change_set: String,
    pub template_path: PathBuf,
    pub template_digest: String,
    pub admin_permissions: bool,
    pub status: ChangeSetStatus,
    pub updated_at: SystemTime,
}

/// Local change-set ledger, one JSON file per change set
#[derive(Debug, Clone)]
pub struct ChangeSetLedger {
    dir: PathBuf,
}

impl ChangeSetLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, stack: &str, change_set: &str) -> PathBuf {
        self.dir
            .join(sanitize(stack))
            .join(format!("{}.json", sanitize(change_set)))
    }

    /// Look up a change set
    pub fn get(&self, stack: &str, change_set: &str) -> Result<Option<ChangeSetRecord>, ShipflowError> {
        let path = self.path(stack, change_set);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ShipflowError::FileReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write a record, replacing any previous one for the same change set
    pub fn put(&self, record: &ChangeSetRecord) -> Result<(), ShipflowError> {
        let path = self.path(&record.stack, &record.change_set);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(record)?).map_err(|e| {
            ShipflowError::FileWriteError {
                path: path.clone(),
                error: e.to_string(),
            }
        })
    }
}

fn sanitize(component: &str) -> String {
    if component.is_empty() || component.chars().all(|c| c == '.') {
        return format!("_{}", component);
    }
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Executor for both change-set action kinds
#[derive(Debug, Clone, Default)]
pub struct ChangeSetExecutor {
    config: DeployConfig,
}

impl ChangeSetExecutor {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    fn shell(&self) -> &str {
        self.config.shell.as_deref().unwrap_or("bash")
    }

    fn command_env(
        ctx: &ActionContext,
        stack: &str,
        change_set: &str,
    ) -> BTreeMap<String, String> {
        let mut env = ctx.env.clone();
        env.insert("SHIPFLOW_STACK_NAME".into(), stack.to_string());
        env.insert("SHIPFLOW_CHANGE_SET_NAME".into(), change_set.to_string());
        env
    }

    async fn create(
        &self,
        action: &Action,
        ctx: &ActionContext,
        stack: &str,
        change_set: &str,
        template_path: &Path,
        admin_permissions: bool,
    ) -> Result<ActionOutcome, ShipflowError> {
        let start = Instant::now();
        let input = ctx.input().ok_or_else(|| {
            ShipflowError::action_failed(&ctx.stage, &action.name, "change-set-create needs an input")
        })?;

        if !stays_inside(template_path) {
            return Ok(ActionOutcome::failure(
                format!(
                    "template '{}' is outside artifact '{}'",
                    template_path.display(),
                    ctx.inputs[0].0
                ),
                1,
                start.elapsed(),
            ));
        }

        let template = input.join(template_path);
        if !template.is_file() {
            return Ok(ActionOutcome::failure(
                format!(
                    "template '{}' not found in artifact '{}'",
                    template_path.display(),
                    ctx.inputs[0].0
                ),
                1,
                start.elapsed(),
            ));
        }

        if let Some(command) = &self.config.create_command {
            let mut env = Self::command_env(ctx, stack, change_set);
            env.insert(
                "SHIPFLOW_TEMPLATE_PATH".into(),
                template.to_string_lossy().to_string(),
            );
            env.insert(
                "SHIPFLOW_ADMIN_PERMISSIONS".into(),
                admin_permissions.to_string(),
            );
            return run_shell(self.shell(), command, &ctx.working_dir, &env).await;
        }

        let record = ChangeSetRecord {
            stack: stack.to_string(),
            change_set: change_set.to_string(),
            template_path: template.clone(),
            template_digest: hash_file(&template)?,
            admin_permissions,
            status: ChangeSetStatus::Created,
            updated_at: SystemTime::now(),
        };
        ChangeSetLedger::new(ctx.change_set_dir()).put(&record)?;

        tracing::info!(stack = %stack, change_set = %change_set, "change set created");
        Ok(ActionOutcome::success(
            format!("created change set '{}' on stack '{}'", change_set, stack),
            start.elapsed(),
        ))
    }

    async fn apply(
        &self,
        ctx: &ActionContext,
        stack: &str,
        change_set: &str,
    ) -> Result<ActionOutcome, ShipflowError> {
        let start = Instant::now();

        if let Some(command) = &self.config.execute_command {
            let env = Self::command_env(ctx, stack, change_set);
            return run_shell(self.shell(), command, &ctx.working_dir, &env).await;
        }

        let ledger = ChangeSetLedger::new(ctx.change_set_dir());
        let Some(mut record) = ledger.get(stack, change_set)? else {
            return Ok(ActionOutcome::failure(
                format!("change set '{}' for stack '{}' not found", change_set, stack),
                1,
                start.elapsed(),
            ));
        };

        if record.status == ChangeSetStatus::Executed {
            return Ok(ActionOutcome::failure(
                format!("change set '{}' was already executed", change_set),
                1,
                start.elapsed(),
            ));
        }

        record.status = ChangeSetStatus::Executed;
        record.updated_at = SystemTime::now();
        ledger.put(&record)?;

        tracing::info!(stack = %stack, change_set = %change_set, "change set executed");
        Ok(ActionOutcome::success(
            format!("executed change set '{}' on stack '{}'", change_set, stack),
            start.elapsed(),
        ))
    }
}

#[async_trait]
impl ActionExecutor for ChangeSetExecutor {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, ShipflowError> {
        match &action.provider {
            Provider::ChangeSetCreate {
                stack,
                change_set,
                template_path,
                admin_permissions,
            } => {
                self.create(action, ctx, stack, change_set, template_path, *admin_permissions)
                    .await
            }
            Provider::ChangeSetExecute { stack, change_set } => {
                self.apply(ctx, stack, change_set).await
            }
            _ => Err(ShipflowError::action_failed(
                &ctx.stage,
                &action.name,
                "expected a change-set provider",
            )),
        }
    }

    async fn check_action(&self, action: &Action) -> Result<(), ShipflowError> {
        let configured = match action.provider {
            Provider::ChangeSetCreate { .. } => self.config.create_command.is_some(),
            Provider::ChangeSetExecute { .. } => self.config.execute_command.is_some(),
            _ => false,
        };
        if configured {
            which::which(self.shell()).map_err(|_| ShipflowError::tool_not_found(self.shell()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_action() -> Action {
        Action::new(
            "CreateChangeSet",
            Provider::ChangeSetCreate {
                stack: "app".into(),
                change_set: "app-cs".into(),
                template_path: "out.yaml".into(),
                admin_permissions: true,
            },
        )
        .with_inputs(["build"])
    }

    fn execute_action() -> Action {
        Action::new(
            "Deploy",
            Provider::ChangeSetExecute {
                stack: "app".into(),
                change_set: "app-cs".into(),
            },
        )
        .with_run_order(2)
    }

    fn context(root: &Path, input: Option<PathBuf>) -> ActionContext {
        ActionContext {
            stage: "Deploy".into(),
            working_dir: root.to_path_buf(),
            env: BTreeMap::new(),
            inputs: input.map(|p| vec![("build".to_string(), p)]).unwrap_or_default(),
            outputs: vec![],
            scratch_dir: root.join("work"),
            state_dir: root.join("state"),
        }
    }

    #[tokio::test]
    async fn test_create_then_execute_with_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let artifact = temp_dir.path().join("build");
        std::fs::create_dir_all(&artifact).unwrap();
        std::fs::write(artifact.join("out.yaml"), "Resources: {}").unwrap();

        let executor = ChangeSetExecutor::default();
        let created = executor
            .execute(&create_action(), &context(temp_dir.path(), Some(artifact)))
            .await
            .unwrap();
        assert!(created.success, "{}", created.stderr);

        let ctx = context(temp_dir.path(), None);
        let ledger = ChangeSetLedger::new(ctx.change_set_dir());
        let record = ledger.get("app", "app-cs").unwrap().unwrap();
        assert_eq!(record.status, ChangeSetStatus::Created);
        assert!(record.admin_permissions);

        let executed = executor.execute(&execute_action(), &ctx).await.unwrap();
        assert!(executed.success);
        assert_eq!(
            ledger.get("app", "app-cs").unwrap().unwrap().status,
            ChangeSetStatus::Executed
        );

        let again = executor.execute(&execute_action(), &ctx).await.unwrap();
        assert!(!again.success);
    }

    #[tokio::test]
    async fn test_execute_without_create_fails() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = ChangeSetExecutor::default()
            .execute(&execute_action(), &context(temp_dir.path(), None))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.stderr.contains("not found"));
    }

    #[tokio::test]
    async fn test_missing_template_fails() {
        let temp_dir = TempDir::new().unwrap();
        let artifact = temp_dir.path().join("build");
        std::fs::create_dir_all(&artifact).unwrap();

        let outcome = ChangeSetExecutor::default()
            .execute(&create_action(), &context(temp_dir.path(), Some(artifact)))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.stderr.contains("out.yaml"));
    }

    #[tokio::test]
    async fn test_template_outside_input_fails() {
        let temp_dir = TempDir::new().unwrap();
        let artifact = temp_dir.path().join("build");
        std::fs::create_dir_all(&artifact).unwrap();
        std::fs::write(temp_dir.path().join("escaped.yaml"), "Resources: {}").unwrap();

        let mut action = create_action();
        if let Provider::ChangeSetCreate { template_path, .. } = &mut action.provider {
            *template_path = PathBuf::from("../escaped.yaml");
        }

        let ctx = context(temp_dir.path(), Some(artifact));
        let outcome = ChangeSetExecutor::default()
            .execute(&action, &ctx)
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.stderr.contains("outside artifact"));
        assert!(ChangeSetLedger::new(ctx.change_set_dir())
            .get("app", "app-cs")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_configured_command_receives_identifiers() {
        let temp_dir = TempDir::new().unwrap();
        let executor = ChangeSetExecutor::new(DeployConfig {
            create_command: None,
            execute_command: Some("echo \"$SHIPFLOW_STACK_NAME/$SHIPFLOW_CHANGE_SET_NAME\"".into()),
            shell: Some("sh".into()),
        });

        let outcome = executor
            .execute(&execute_action(), &context(temp_dir.path(), None))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.stdout.trim(), "app/app-cs");
    }

    #[test]
    fn test_sanitize_path_components() {
        assert_eq!(sanitize("../etc"), ".._etc");
        assert_eq!(sanitize("my stack"), "my_stack");
        assert_eq!(sanitize(".."), "_..");
    }
}
