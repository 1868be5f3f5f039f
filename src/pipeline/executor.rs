// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline executor
//!
//! Runs a validated pipeline: stages in declaration order, actions within a
//! stage by run-order, one at a time. The first failing action ends the run.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use colored::Colorize;
use serde::Serialize;

use crate::errors::{ConfigurationWarning, ShipflowError};
use crate::pipeline::{Action, ActionKind, ArtifactLedger, ArtifactOrigin, Pipeline, Stage};
use crate::providers::{ActionContext, ActionExecutor, ActionOutcome};
use crate::storage::{ArtifactStore, SealedArtifact};

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Only show what would be done
    pub dry_run: bool,
    /// Run even when a credential is missing
    pub allow_missing_credentials: bool,
    /// Verbose output
    pub verbose: bool,
    /// Paths for declared pipeline inputs
    pub inputs: BTreeMap<String, PathBuf>,
}

/// How far a run went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Every action ran
    Executed,
    /// Plan printed on request
    DryRun,
    /// Plan printed because a credential is missing
    SynthesisOnly,
}

/// One completed action
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub stage: String,
    pub action: String,
    pub kind: ActionKind,
    pub outcome: ActionOutcome,
    /// Artifacts sealed from this action's outputs
    pub outputs: Vec<SealedArtifact>,
}

/// Result of executing a pipeline
#[derive(Debug)]
pub struct PipelineResult {
    /// Run identifier, when storage was provisioned
    pub run_id: Option<String>,
    pub mode: RunMode,
    /// Completed actions in invocation order
    pub actions: Vec<ActionRecord>,
    /// Every artifact sealed during the run
    pub artifacts: Vec<SealedArtifact>,
    /// Total execution time
    pub duration: Duration,
    pub warnings: Vec<ConfigurationWarning>,
}

impl PipelineResult {
    fn planned(mode: RunMode, warnings: Vec<ConfigurationWarning>, start: Instant) -> Self {
        Self {
            run_id: None,
            mode,
            actions: Vec::new(),
            artifacts: Vec::new(),
            duration: start.elapsed(),
            warnings,
        }
    }

    /// Names of invoked actions, in order
    pub fn invoked(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.action.as_str()).collect()
    }
}

/// Pipeline executor
pub struct PipelineExecutor {
    /// Registered executors by action kind
    executors: HashMap<ActionKind, Box<dyn ActionExecutor>>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Create an executor from a prepared set of collaborators
    pub fn with_executors(executors: HashMap<ActionKind, Box<dyn ActionExecutor>>) -> Self {
        Self { executors }
    }

    /// Register an executor for an action kind
    pub fn register_executor(&mut self, kind: ActionKind, executor: Box<dyn ActionExecutor>) {
        self.executors.insert(kind, executor);
    }

    /// Validation warnings plus whatever the collaborators report
    pub fn warnings(&self, pipeline: &Pipeline) -> Vec<ConfigurationWarning> {
        let mut warnings = pipeline.warnings().to_vec();
        for (_, action) in pipeline.execution_order() {
            if let Some(executor) = self.executors.get(&action.kind()) {
                warnings.extend(executor.warnings(action));
            }
        }
        warnings
    }

    /// Execute a pipeline
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        working_dir: &Path,
        options: &ExecutionOptions,
    ) -> Result<PipelineResult, ShipflowError> {
        let start = Instant::now();
        let warnings = self.warnings(pipeline);

        self.print_execution_plan(pipeline);
        for warning in &warnings {
            tracing::warn!("{}", warning);
            println!("  {} {}", "⚠".yellow(), warning);
        }

        if options.dry_run {
            println!("{}", "Dry run: nothing was executed".dimmed());
            return Ok(PipelineResult::planned(RunMode::DryRun, warnings, start));
        }

        if !options.allow_missing_credentials && warnings.iter().any(|w| w.is_missing_credential()) {
            println!(
                "{}",
                "Synthesis only: supply the missing credentials to execute".yellow()
            );
            return Ok(PipelineResult::planned(RunMode::SynthesisOnly, warnings, start));
        }

        if pipeline.is_empty() {
            println!("{}", "Pipeline has no stages; nothing to do".dimmed());
            return Ok(PipelineResult::planned(RunMode::Executed, warnings, start));
        }

        self.preflight(pipeline, options).await?;

        let store = ArtifactStore::provision(
            working_dir.join(&pipeline.storage().directory),
            pipeline.storage_identifier(),
        )?;
        let mut ledger = ArtifactLedger::from_registry(pipeline.artifacts());

        for name in pipeline.inputs() {
            if let Some(path) = options.inputs.get(name) {
                store.import(name, &working_dir.join(path)).await?;
                ledger.mark_produced(name)?;
            }
        }

        let mut env = pipeline.env().clone();
        env.insert(
            pipeline.storage().env_var.clone(),
            store.identifier().to_string(),
        );

        let mut actions = Vec::new();
        for (stage, action) in pipeline.execution_order() {
            let record = self
                .execute_action(stage, action, working_dir, &env, &store, &mut ledger, options)
                .await?;
            actions.push(record);
        }

        let duration = start.elapsed();
        println!();
        println!(
            "{}",
            format!("Pipeline completed successfully in {:.2}s", duration.as_secs_f64()).green()
        );

        Ok(PipelineResult {
            run_id: Some(store.run_id().to_string()),
            mode: RunMode::Executed,
            actions,
            artifacts: store.artifacts()?,
            duration,
            warnings,
        })
    }

    /// Run one action and seal its outputs
    #[allow(clippy::too_many_arguments)]
    async fn execute_action(
        &self,
        stage: &Stage,
        action: &Action,
        working_dir: &Path,
        env: &BTreeMap<String, String>,
        store: &ArtifactStore,
        ledger: &mut ArtifactLedger,
        options: &ExecutionOptions,
    ) -> Result<ActionRecord, ShipflowError> {
        let executor = self.executor_for(action)?;

        let mut inputs = Vec::new();
        for name in &action.inputs {
            inputs.push((name.clone(), store.path(name)?));
            ledger.mark_consumed(name)?;
        }

        let mut outputs = Vec::new();
        for name in &action.outputs {
            outputs.push((name.clone(), store.prepare(name).await?));
        }

        let ctx = ActionContext {
            stage: stage.name.clone(),
            working_dir: working_dir.to_path_buf(),
            env: env.clone(),
            inputs,
            outputs,
            scratch_dir: store.scratch_dir(&action.name).await?,
            state_dir: store.root().to_path_buf(),
        };

        tracing::info!(stage = %stage.name, action = %action.name, kind = %action.kind(), "running action");
        println!("  {} {} / {}...", "→".blue(), stage.name, action.name);

        let outcome = executor.execute(action, &ctx).await.map_err(|e| match e {
            ShipflowError::ActionExecution { .. } => e,
            other => ShipflowError::action_failed(&stage.name, &action.name, other.to_string()),
        })?;

        if !outcome.success {
            println!("  {} {} / {} failed", "✗".red(), stage.name, action.name.bold());
            if options.verbose && !outcome.stderr.is_empty() {
                eprintln!("{}", outcome.stderr.dimmed());
            }
            return Err(ShipflowError::action_failed(
                &stage.name,
                &action.name,
                failure_reason(&outcome),
            ));
        }

        if options.verbose && !outcome.stdout.is_empty() {
            println!("{}", outcome.stdout.dimmed());
        }

        let mut sealed = Vec::new();
        for name in &action.outputs {
            sealed.push(store.seal(name, &action.name).await?);
            ledger.mark_produced(name)?;
        }

        println!(
            "  {} {} / {} ({:.2}s)",
            "✓".green(),
            stage.name,
            action.name.bold(),
            outcome.duration.as_secs_f64()
        );

        Ok(ActionRecord {
            stage: stage.name.clone(),
            action: action.name.clone(),
            kind: action.kind(),
            outcome,
            outputs: sealed,
        })
    }

    fn executor_for(&self, action: &Action) -> Result<&dyn ActionExecutor, ShipflowError> {
        self.executors
            .get(&action.kind())
            .map(|e| e.as_ref())
            .ok_or_else(|| ShipflowError::ExecutorNotFound {
                kind: action.kind().to_string(),
            })
    }

    /// Everything that can be checked before the first action runs
    async fn preflight(
        &self,
        pipeline: &Pipeline,
        options: &ExecutionOptions,
    ) -> Result<(), ShipflowError> {
        for name in pipeline.inputs() {
            let consumed = pipeline
                .artifacts()
                .get(name)
                .is_some_and(|r| !r.consumers.is_empty());
            if consumed && !options.inputs.contains_key(name) {
                return Err(ShipflowError::MissingInput {
                    artifact: name.to_string(),
                });
            }
        }

        for (_, action) in pipeline.execution_order() {
            self.executor_for(action)?.check_action(action).await?;
        }

        Ok(())
    }

    /// Print the execution plan
    fn print_execution_plan(&self, pipeline: &Pipeline) {
        println!();
        println!("{}: {}", "Pipeline".bold(), pipeline.name());
        println!("{}", "═".repeat(50));
        println!(
            "Execution plan ({} stage{}, {} action{}):",
            pipeline.stages().len(),
            if pipeline.stages().len() == 1 { "" } else { "s" },
            pipeline.action_count(),
            if pipeline.action_count() == 1 { "" } else { "s" }
        );
        println!();

        for (i, stage) in pipeline.stages().iter().enumerate() {
            println!("  {}. {}", i + 1, stage.name.bold());
            for action in stage.ordered_actions() {
                print!("     [{}] {} ({})", action.effective_run_order(), action.name, action.kind());
                let sources: Vec<String> = action
                    .inputs
                    .iter()
                    .map(|name| match pipeline.artifacts().get(name).map(|r| &r.origin) {
                        Some(ArtifactOrigin::Produced { action, .. }) => format!("{} from {}", name, action),
                        _ => name.clone(),
                    })
                    .collect();
                if !sources.is_empty() {
                    print!(" {}", format!("[reads: {}]", sources.join(", ")).dimmed());
                }
                println!();
            }
        }

        println!();
    }

    /// Action kinds whose collaborators are not ready
    pub async fn check_tools(&self, pipeline: &Pipeline) -> Vec<(String, ShipflowError)> {
        let mut problems = Vec::new();

        for (_, action) in pipeline.execution_order() {
            let checked = match self.executor_for(action) {
                Ok(executor) => executor.check_action(action).await,
                Err(e) => Err(e),
            };
            if let Err(e) = checked {
                problems.push((action.name.clone(), e));
            }
        }

        problems
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn failure_reason(outcome: &ActionOutcome) -> String {
    let last_line = outcome
        .stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string());

    match last_line {
        Some(line) => line,
        None => format!("exited with code {}", outcome.exit_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineBuilder, Provider};
    use crate::providers::{create_default_executors, Credentials};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Records invocations and writes a marker into every output
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail: Option<String>,
        warn_credential: bool,
    }

    #[async_trait]
    impl ActionExecutor for Recorder {
        async fn execute(
            &self,
            action: &Action,
            ctx: &ActionContext,
        ) -> Result<ActionOutcome, ShipflowError> {
            self.calls.lock().unwrap().push(action.name.clone());
            if self.fail.as_deref() == Some(action.name.as_str()) {
                return Ok(ActionOutcome::failure("boom".into(), 2, Duration::ZERO));
            }
            for (_, dir) in &ctx.outputs {
                std::fs::write(dir.join("marker"), &action.name).unwrap();
            }
            Ok(ActionOutcome::success(String::new(), Duration::ZERO))
        }

        fn warnings(&self, action: &Action) -> Vec<ConfigurationWarning> {
            match &action.provider {
                Provider::Source {
                    credential: Some(c),
                    ..
                } if self.warn_credential => vec![ConfigurationWarning::MissingCredential {
                    action: action.name.clone(),
                    credential: c.clone(),
                }],
                _ => vec![],
            }
        }
    }

    fn recording_executor(fail: Option<&str>, warn_credential: bool) -> (PipelineExecutor, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut executor = PipelineExecutor::new();
        for kind in ActionKind::ALL {
            executor.register_executor(
                kind,
                Box::new(Recorder {
                    calls: calls.clone(),
                    fail: fail.map(String::from),
                    warn_credential,
                }),
            );
        }
        (executor, calls)
    }

    fn delivery_pipeline() -> Pipeline {
        let mut builder = PipelineBuilder::new("delivery");
        builder
            .add_stage(
                "Source",
                vec![Action::new(
                    "Github_Source",
                    Provider::Source {
                        repository: "https://example.com/app.git".into(),
                        branch: None,
                        credential: Some("GITHUB_TOKEN".into()),
                    },
                )
                .with_outputs(["source"])],
            )
            .unwrap();
        builder
            .add_stage(
                "Build",
                vec![Action::new(
                    "Build",
                    Provider::Build {
                        command: "make".into(),
                        shell: "sh".into(),
                        image: None,
                        env: Default::default(),
                    },
                )
                .with_inputs(["source"])
                .with_outputs(["build"])],
            )
            .unwrap();
        builder
            .add_stage(
                "Deploy",
                vec![
                    Action::new(
                        "Deploy",
                        Provider::ChangeSetExecute {
                            stack: "app".into(),
                            change_set: "app-cs".into(),
                        },
                    )
                    .with_run_order(2),
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
                    .with_run_order(1),
                ],
            )
            .unwrap();
        builder.validate().unwrap()
    }

    #[tokio::test]
    async fn test_actions_run_in_stage_and_run_order() {
        let temp_dir = TempDir::new().unwrap();
        let (executor, calls) = recording_executor(None, false);

        let result = executor
            .execute(&delivery_pipeline(), temp_dir.path(), &ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(result.mode, RunMode::Executed);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["Github_Source", "Build", "CreateChangeSet", "Deploy"]
        );
        assert_eq!(result.artifacts.len(), 2);
        assert_eq!(result.actions[1].outputs[0].producer, "Build");
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_actions() {
        let temp_dir = TempDir::new().unwrap();
        let (executor, calls) = recording_executor(Some("Build"), false);

        let err = executor
            .execute(&delivery_pipeline(), temp_dir.path(), &ExecutionOptions::default())
            .await
            .unwrap_err();

        match err {
            ShipflowError::ActionExecution { stage, action, reason, .. } => {
                assert_eq!(stage, "Build");
                assert_eq!(action, "Build");
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*calls.lock().unwrap(), vec!["Github_Source", "Build"]);

        let runs = ArtifactStore::list_runs(&temp_dir.path().join(".shipflow/artifacts")).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].artifacts.len(), 1);
        assert_eq!(runs[0].artifacts[0].name, "source");
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let (executor, calls) = recording_executor(None, false);
        let pipeline = PipelineBuilder::new("empty").validate().unwrap();

        let result = executor
            .execute(&pipeline, temp_dir.path(), &ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(result.mode, RunMode::Executed);
        assert!(result.actions.is_empty());
        assert!(calls.lock().unwrap().is_empty());
        assert!(!temp_dir.path().join(".shipflow").exists());
    }

    #[tokio::test]
    async fn test_missing_credential_switches_to_synthesis_only() {
        let temp_dir = TempDir::new().unwrap();
        let (executor, calls) = recording_executor(None, true);

        let result = executor
            .execute(&delivery_pipeline(), temp_dir.path(), &ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(result.mode, RunMode::SynthesisOnly);
        assert!(calls.lock().unwrap().is_empty());
        assert!(result.warnings.iter().any(|w| w.is_missing_credential()));

        let options = ExecutionOptions {
            allow_missing_credentials: true,
            ..Default::default()
        };
        let result = executor
            .execute(&delivery_pipeline(), temp_dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(result.mode, RunMode::Executed);
    }

    #[tokio::test]
    async fn test_dry_run_invokes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (executor, calls) = recording_executor(None, false);
        let options = ExecutionOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = executor
            .execute(&delivery_pipeline(), temp_dir.path(), &options)
            .await
            .unwrap();

        assert_eq!(result.mode, RunMode::DryRun);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_executor_detected_before_running() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut executor = PipelineExecutor::new();
        executor.register_executor(
            ActionKind::Source,
            Box::new(Recorder {
                calls: calls.clone(),
                fail: None,
                warn_credential: false,
            }),
        );

        let err = executor
            .execute(&delivery_pipeline(), temp_dir.path(), &ExecutionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ShipflowError::ExecutorNotFound { .. }));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declared_input_must_be_supplied() {
        let temp_dir = TempDir::new().unwrap();
        let mut builder = PipelineBuilder::new("with-input");
        builder.declare_artifact("template").unwrap();
        builder
            .add_stage(
                "Deploy",
                vec![Action::new(
                    "Create",
                    Provider::ChangeSetCreate {
                        stack: "s".into(),
                        change_set: "cs".into(),
                        template_path: "t.yaml".into(),
                        admin_permissions: false,
                    },
                )
                .with_inputs(["template"])],
            )
            .unwrap();
        let pipeline = builder.validate().unwrap();
        let executor = PipelineExecutor::with_executors(create_default_executors(
            Credentials::new(),
            pipeline.deploy(),
        ));

        let err = executor
            .execute(&pipeline, temp_dir.path(), &ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ShipflowError::MissingInput { ref artifact } if artifact == "template"));

        let template_dir = temp_dir.path().join("tpl");
        std::fs::create_dir_all(&template_dir).unwrap();
        std::fs::write(template_dir.join("t.yaml"), "Resources: {}").unwrap();
        let options = ExecutionOptions {
            inputs: BTreeMap::from([("template".to_string(), template_dir)]),
            ..Default::default()
        };

        let result = executor.execute(&pipeline, temp_dir.path(), &options).await.unwrap();
        assert_eq!(result.invoked(), vec!["Create"]);
    }

    #[tokio::test]
    async fn test_end_to_end_with_default_executors() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("app");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("template.yaml"), "Resources: {}").unwrap();

        let mut builder = PipelineBuilder::new("local");
        builder
            .add_stage(
                "Source",
                vec![Action::new(
                    "pull",
                    Provider::Source {
                        repository: "app".into(),
                        branch: None,
                        credential: None,
                    },
                )
                .with_outputs(["source"])],
            )
            .unwrap();
        builder
            .add_stage(
                "Build",
                vec![Action::new(
                    "package",
                    Provider::Build {
                        command: "cp template.yaml \"$SHIPFLOW_OUTPUT_DIR/out.yaml\"".into(),
                        shell: "sh".into(),
                        image: None,
                        env: Default::default(),
                    },
                )
                .with_inputs(["source"])
                .with_outputs(["build"])],
            )
            .unwrap();
        builder
            .add_stage(
                "Deploy",
                vec![
                    Action::new(
                        "CreateChangeSet",
                        Provider::ChangeSetCreate {
                            stack: "local".into(),
                            change_set: "local-cs".into(),
                            template_path: "out.yaml".into(),
                            admin_permissions: false,
                        },
                    )
                    .with_inputs(["build"]),
                    Action::new(
                        "Deploy",
                        Provider::ChangeSetExecute {
                            stack: "local".into(),
                            change_set: "local-cs".into(),
                        },
                    )
                    .with_run_order(2),
                ],
            )
            .unwrap();
        let pipeline = builder.validate().unwrap();

        let executor = PipelineExecutor::with_executors(create_default_executors(
            Credentials::new(),
            pipeline.deploy(),
        ));
        let result = executor
            .execute(&pipeline, temp_dir.path(), &ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(
            result.invoked(),
            vec!["pull", "package", "CreateChangeSet", "Deploy"]
        );
        let ledger = crate::providers::ChangeSetLedger::new(
            temp_dir.path().join(".shipflow/artifacts/change-sets"),
        );
        let record = ledger.get("local", "local-cs").unwrap().unwrap();
        assert_eq!(record.status, crate::providers::ChangeSetStatus::Executed);
    }
}
