// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline validation
//!
//! Stages are checked one at a time against everything admitted before them.
//! The same checks drive `PipelineBuilder::add_stage` and the full pass in
//! `PipelineBuilder::validate`.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};
use std::sync::OnceLock;

use crate::errors::{ConfigurationWarning, Violation};
use crate::pipeline::artifact::{ArtifactRegistry, Consumer};
use crate::pipeline::{Action, ActionKind, PipelineDefinition, Provider, Stage, MAX_RUN_ORDER};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9.@_-]{1,100}$").expect("valid name pattern"))
}

/// Check a pipeline, stage, action or artifact name
pub fn check_name(what: &str, name: &str) -> Result<(), Violation> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(Violation::InvalidName {
            what: what.to_string(),
            name: name.to_string(),
        })
    }
}

/// Whether a relative path stays under the directory it is joined to
pub(crate) fn stays_inside(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Running state of stage admission
#[derive(Debug, Default)]
pub(crate) struct GraphState {
    pub(crate) registry: ArtifactRegistry,
    pub(crate) warnings: Vec<ConfigurationWarning>,
    stage_names: HashSet<String>,
    action_names: HashSet<String>,
    created_change_sets: HashSet<(String, String)>,
    stage_count: usize,
}

impl GraphState {
    /// Register a pipeline input
    pub(crate) fn declare(&mut self, name: &str) -> Result<(), Violation> {
        check_name("artifact", name)?;
        self.registry.declare_external(name)
    }

    /// Admit the next stage, returning every violation it introduces.
    ///
    /// The stage is recorded even when violations are found so later stages
    /// are checked against its outputs instead of cascading.
    pub(crate) fn admit(&mut self, stage: &Stage) -> Vec<Violation> {
        let mut violations = Vec::new();
        let index = self.stage_count;

        if let Err(v) = check_name("stage", &stage.name) {
            violations.push(v);
        }
        if !self.stage_names.insert(stage.name.clone()) {
            violations.push(Violation::DuplicateStage {
                name: stage.name.clone(),
            });
        }
        if stage.actions.is_empty() {
            violations.push(Violation::EmptyStage {
                stage: stage.name.clone(),
            });
        }

        // Inputs first: nothing produced in this stage can satisfy them
        for action in &stage.actions {
            Self::check_action(action, &mut violations);

            if !self.action_names.insert(action.name.clone()) {
                violations.push(Violation::DuplicateAction {
                    name: action.name.clone(),
                    stage: stage.name.clone(),
                });
            }

            for input in &action.inputs {
                if self.registry.resolves_before(input, index) {
                    self.registry.record_consumer(
                        input,
                        Consumer {
                            stage: stage.name.clone(),
                            stage_index: index,
                            action: action.name.clone(),
                        },
                    );
                } else {
                    violations.push(Violation::UnresolvedInput {
                        artifact: input.clone(),
                        action: action.name.clone(),
                        stage: stage.name.clone(),
                    });
                }
            }
        }

        for action in &stage.actions {
            for output in &action.outputs {
                if let Err(v) = self
                    .registry
                    .record_output(output, index, &stage.name, &action.name)
                {
                    violations.push(v);
                }
            }
        }

        self.check_change_sets(stage, &mut violations);

        tracing::debug!(
            stage = %stage.name,
            actions = stage.actions.len(),
            violations = violations.len(),
            "admitted stage"
        );

        self.stage_count += 1;
        violations
    }

    /// Warnings that need the whole pipeline to be known
    pub(crate) fn finish(&mut self) {
        let unused: Vec<String> = self
            .registry
            .unconsumed()
            .filter(|r| r.is_external())
            .map(|r| r.name.clone())
            .collect();

        for artifact in unused {
            self.warnings.push(ConfigurationWarning::UnusedInput { artifact });
        }
    }

    fn check_action(action: &Action, violations: &mut Vec<Violation>) {
        if let Err(v) = check_name("action", &action.name) {
            violations.push(v);
        }
        for artifact in action.inputs.iter().chain(action.outputs.iter()) {
            if let Err(v) = check_name("artifact", artifact) {
                violations.push(v);
            }
        }

        let kind = action.kind();
        let (want_in, want_out) = kind.arity();
        if action.inputs.len() != want_in || action.outputs.len() != want_out {
            violations.push(Violation::InvalidAction {
                action: action.name.clone(),
                reason: format!(
                    "{} actions take {} input(s) and {} output(s); found {} and {}",
                    kind,
                    want_in,
                    want_out,
                    action.inputs.len(),
                    action.outputs.len()
                ),
            });
        }

        if let Some(order) = action.run_order {
            if order == 0 || order > MAX_RUN_ORDER {
                violations.push(Violation::InvalidAction {
                    action: action.name.clone(),
                    reason: format!("run_order {} is outside 1..={}", order, MAX_RUN_ORDER),
                });
            }
        }

        let empty_field = match &action.provider {
            Provider::Source { repository, .. } if repository.trim().is_empty() => {
                Some("repository")
            }
            Provider::Build { command, .. } if command.trim().is_empty() => Some("command"),
            Provider::ChangeSetCreate {
                template_path,
                ..
            } if template_path.as_os_str().is_empty() => Some("template_path"),
            provider => match provider.change_set() {
                Some((stack, _)) if stack.trim().is_empty() => Some("stack"),
                Some((_, change_set)) if change_set.trim().is_empty() => Some("change_set"),
                _ => None,
            },
        };
        if let Some(field) = empty_field {
            violations.push(Violation::InvalidAction {
                action: action.name.clone(),
                reason: format!("'{}' must not be empty", field),
            });
        }

        if let Provider::ChangeSetCreate { template_path, .. } = &action.provider {
            if !stays_inside(template_path) {
                violations.push(Violation::InvalidAction {
                    action: action.name.clone(),
                    reason: format!(
                        "template_path '{}' must be relative and stay inside the input artifact",
                        template_path.display()
                    ),
                });
            }
        }
    }

    fn check_change_sets(&mut self, stage: &Stage, violations: &mut Vec<Violation>) {
        let mut creates: HashMap<(&str, &str), &Action> = HashMap::new();
        for action in &stage.actions {
            if action.kind() == ActionKind::ChangeSetCreate {
                if let Some(key) = action.provider.change_set() {
                    creates.entry(key).or_insert(action);
                }
            }
        }

        for action in &stage.actions {
            if action.kind() != ActionKind::ChangeSetExecute {
                continue;
            }
            let Some((stack, change_set)) = action.provider.change_set() else {
                continue;
            };

            match creates.get(&(stack, change_set)) {
                Some(create) => {
                    if create.effective_run_order() >= action.effective_run_order() {
                        violations.push(Violation::ChangeSetOrder {
                            stage: stage.name.clone(),
                            change_set: change_set.to_string(),
                            create: create.name.clone(),
                            execute: action.name.clone(),
                        });
                    }
                }
                None => {
                    let key = (stack.to_string(), change_set.to_string());
                    if !self.created_change_sets.contains(&key) {
                        self.warnings.push(ConfigurationWarning::UnpairedChangeSet {
                            action: action.name.clone(),
                            stack: stack.to_string(),
                            change_set: change_set.to_string(),
                        });
                    }
                }
            }
        }

        for (stack, change_set) in creates.into_keys() {
            self.created_change_sets
                .insert((stack.to_string(), change_set.to_string()));
        }
    }
}

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Check a definition, collecting every violation and warning
    pub fn check(definition: &PipelineDefinition) -> ValidationReport {
        let mut report = ValidationReport::new();
        let mut state = GraphState::default();

        if let Err(v) = check_name("pipeline", &definition.name) {
            report.violations.push(v);
        }

        for input in &definition.inputs {
            if let Err(v) = state.declare(input) {
                report.violations.push(v);
            }
        }

        for def in &definition.stages {
            let stage = Stage::from(def);
            report.violations.extend(state.admit(&stage));
        }

        state.finish();
        report.warnings = state.warnings;
        report
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub warnings: Vec<ConfigurationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
