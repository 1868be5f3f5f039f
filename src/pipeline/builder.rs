// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline builder
//!
//! `PipelineBuilder` accumulates stages and artifact declarations; `validate`
//! is the only way to obtain a [`Pipeline`], and it refuses to hand one out
//! if anything was ever rejected.

use std::collections::BTreeMap;

use crate::errors::{ConfigurationWarning, ShipflowError};
use crate::pipeline::artifact::ArtifactRegistry;
use crate::pipeline::validation::{check_name, GraphState};
use crate::pipeline::{Action, DeployConfig, PipelineDefinition, StageDefinition, StorageConfig};

/// An ordered group of actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub description: Option<String>,
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            description: None,
            actions,
        }
    }

    /// Actions sorted by run-order; equal run-orders keep declaration order
    pub fn ordered_actions(&self) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.effective_run_order());
        actions
    }
}

impl From<&StageDefinition> for Stage {
    fn from(def: &StageDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            actions: def.actions.clone(),
        }
    }
}

/// A validated, immutable pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    description: Option<String>,
    stages: Vec<Stage>,
    artifacts: ArtifactRegistry,
    env: BTreeMap<String, String>,
    storage: StorageConfig,
    deploy: DeployConfig,
    warnings: Vec<ConfigurationWarning>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn deploy(&self) -> &DeployConfig {
        &self.deploy
    }

    /// Warnings found while validating
    pub fn warnings(&self) -> &[ConfigurationWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn action_count(&self) -> usize {
        self.stages.iter().map(|s| s.actions.len()).sum()
    }

    /// Identifier of the storage provisioned for this pipeline
    pub fn storage_identifier(&self) -> String {
        self.storage.identifier(&self.name)
    }

    /// Names of declared pipeline inputs
    pub fn inputs(&self) -> Vec<&str> {
        self.artifacts.externals().map(|r| r.name.as_str()).collect()
    }

    /// Actions in execution order, paired with their stage
    pub fn execution_order(&self) -> Vec<(&Stage, &Action)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.ordered_actions().into_iter().map(move |a| (stage, a)))
            .collect()
    }
}

/// Builder for validated pipelines
#[derive(Debug)]
pub struct PipelineBuilder {
    name: String,
    description: Option<String>,
    env: BTreeMap<String, String>,
    storage: StorageConfig,
    deploy: DeployConfig,
    stages: Vec<Stage>,
    /// Every declaration and stage, in call order
    steps: Vec<Step>,
    state: GraphState,
}

/// One recorded builder call; `Stage` indexes into `stages`
#[derive(Debug, Clone)]
enum Step {
    Declare(String),
    Stage(usize),
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            env: BTreeMap::new(),
            storage: StorageConfig::default(),
            deploy: DeployConfig::default(),
            stages: Vec::new(),
            steps: Vec::new(),
            state: GraphState::default(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn deploy(mut self, deploy: DeployConfig) -> Self {
        self.deploy = deploy;
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Register an artifact supplied from outside the pipeline
    pub fn declare_artifact(&mut self, name: impl Into<String>) -> Result<&mut Self, ShipflowError> {
        let name = name.into();
        let result = self.state.declare(&name);
        self.steps.push(Step::Declare(name));
        result?;
        Ok(self)
    }

    /// Append a stage.
    ///
    /// The stage is kept even when it is rejected, so `validate` reports every
    /// problem once; a rejected stage still poisons the builder.
    pub fn add_stage(
        &mut self,
        name: impl Into<String>,
        actions: Vec<Action>,
    ) -> Result<&mut Self, ShipflowError> {
        self.push_stage(Stage::new(name, actions))
    }

    fn push_stage(&mut self, stage: Stage) -> Result<&mut Self, ShipflowError> {
        let mut violations = self.state.admit(&stage);
        self.steps.push(Step::Stage(self.stages.len()));
        self.stages.push(stage);

        match violations.len() {
            0 => Ok(self),
            1 => Err(violations.remove(0).into()),
            _ => Err(ShipflowError::Validation { violations }),
        }
    }

    /// Replay every recorded call in order and produce the pipeline.
    ///
    /// Anything rejected when it was made is rejected again here, so later
    /// calls cannot repair an earlier rejection.
    pub fn validate(self) -> Result<Pipeline, ShipflowError> {
        let mut violations = Vec::new();
        let mut state = GraphState::default();

        if let Err(v) = check_name("pipeline", &self.name) {
            violations.push(v);
        }
        for step in &self.steps {
            match step {
                Step::Declare(name) => {
                    if let Err(v) = state.declare(name) {
                        violations.push(v);
                    }
                }
                Step::Stage(i) => violations.extend(state.admit(&self.stages[*i])),
            }
        }

        if !violations.is_empty() {
            return Err(ShipflowError::Validation { violations });
        }

        state.finish();
        for warning in &state.warnings {
            tracing::warn!("{}", warning);
        }

        tracing::debug!(
            pipeline = %self.name,
            stages = self.stages.len(),
            artifacts = state.registry.len(),
            "pipeline validated"
        );

        Ok(Pipeline {
            name: self.name,
            description: self.description,
            stages: self.stages,
            artifacts: state.registry,
            env: self.env,
            storage: self.storage,
            deploy: self.deploy,
            warnings: state.warnings,
        })
    }

    /// Build and validate a pipeline from a parsed definition
    pub fn from_definition(definition: &PipelineDefinition) -> Result<Pipeline, ShipflowError> {
        let mut builder = Self::new(definition.name.clone())
            .storage(definition.storage.clone())
            .deploy(definition.deploy.clone())
            .env(definition.env.clone());
        builder.description = definition.description.clone();

        // Rejections are remembered by the builder and reported by validate()
        for input in &definition.inputs {
            let _ = builder.declare_artifact(input.as_str());
        }
        for stage in &definition.stages {
            let _ = builder.push_stage(Stage::from(stage));
        }

        builder.validate()
    }
}
