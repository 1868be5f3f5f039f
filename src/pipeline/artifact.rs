// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Artifact registry
//!
//! Every artifact has exactly one origin: it is either supplied from outside
//! the pipeline or produced by a single action. The registry only grows while
//! stages are admitted and is read-only afterwards.

use serde::Serialize;
use std::collections::HashMap;

use crate::errors::{ShipflowError, Violation};

/// Where an artifact comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "kebab-case")]
pub enum ArtifactOrigin {
    /// Declared as a pipeline input
    External,
    /// Produced by an action
    Produced {
        stage: String,
        stage_index: usize,
        action: String,
    },
}

/// A reference to an action consuming an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consumer {
    pub stage: String,
    pub stage_index: usize,
    pub action: String,
}

/// Registry entry for one artifact
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub name: String,
    #[serde(flatten)]
    pub origin: ArtifactOrigin,
    pub consumers: Vec<Consumer>,
}

impl ArtifactRecord {
    /// Label of the producer, for messages
    pub fn producer_label(&self) -> String {
        match &self.origin {
            ArtifactOrigin::External => "pipeline input".to_string(),
            ArtifactOrigin::Produced { action, .. } => action.clone(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.origin, ArtifactOrigin::External)
    }
}

/// Registry of all artifacts known to a pipeline, in registration order
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    records: Vec<ArtifactRecord>,
    index: HashMap<String, usize>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.records.iter()
    }

    /// Register an artifact supplied from outside the pipeline
    pub fn declare_external(&mut self, name: &str) -> Result<(), Violation> {
        if self.contains(name) {
            return Err(Violation::DuplicateArtifact {
                name: name.to_string(),
            });
        }
        self.insert(ArtifactRecord {
            name: name.to_string(),
            origin: ArtifactOrigin::External,
            consumers: vec![],
        });
        Ok(())
    }

    /// Register an action output
    pub fn record_output(
        &mut self,
        name: &str,
        stage_index: usize,
        stage: &str,
        action: &str,
    ) -> Result<(), Violation> {
        if let Some(existing) = self.get(name) {
            return Err(Violation::DuplicateProducer {
                artifact: name.to_string(),
                action: action.to_string(),
                existing: existing.producer_label(),
            });
        }
        self.insert(ArtifactRecord {
            name: name.to_string(),
            origin: ArtifactOrigin::Produced {
                stage: stage.to_string(),
                stage_index,
                action: action.to_string(),
            },
            consumers: vec![],
        });
        Ok(())
    }

    /// Whether an artifact is available to a consumer in `stage_index`
    pub fn resolves_before(&self, name: &str, stage_index: usize) -> bool {
        match self.get(name).map(|r| &r.origin) {
            Some(ArtifactOrigin::External) => true,
            Some(ArtifactOrigin::Produced {
                stage_index: producer,
                ..
            }) => *producer < stage_index,
            None => false,
        }
    }

    /// Note a consumer of a resolved artifact
    pub fn record_consumer(&mut self, name: &str, consumer: Consumer) {
        if let Some(&i) = self.index.get(name) {
            self.records[i].consumers.push(consumer);
        }
    }

    /// Declared pipeline inputs
    pub fn externals(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.records.iter().filter(|r| r.is_external())
    }

    /// Artifacts no action consumes
    pub fn unconsumed(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.records.iter().filter(|r| r.consumers.is_empty())
    }

    fn insert(&mut self, record: ArtifactRecord) {
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
    }
}

/// Lifecycle state of an artifact during one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
    Declared,
    Produced,
    Consumed,
}

/// Tracks artifact states while a pipeline runs
#[derive(Debug, Clone, Default)]
pub struct ArtifactLedger {
    states: HashMap<String, ArtifactState>,
}

impl ArtifactLedger {
    /// Start a ledger with every registered artifact declared
    pub fn from_registry(registry: &ArtifactRegistry) -> Self {
        Self {
            states: registry
                .iter()
                .map(|r| (r.name.clone(), ArtifactState::Declared))
                .collect(),
        }
    }

    pub fn state(&self, name: &str) -> Option<ArtifactState> {
        self.states.get(name).copied()
    }

    /// Move an artifact to produced; produced artifacts never change again
    pub fn mark_produced(&mut self, name: &str) -> Result<(), ShipflowError> {
        match self.states.get_mut(name) {
            Some(state @ ArtifactState::Declared) => {
                *state = ArtifactState::Produced;
                Ok(())
            }
            Some(_) => Err(ShipflowError::ArtifactSealed {
                artifact: name.to_string(),
            }),
            None => Err(ShipflowError::ArtifactMissing {
                artifact: name.to_string(),
            }),
        }
    }

    /// Record a read of a produced artifact
    pub fn mark_consumed(&mut self, name: &str) -> Result<(), ShipflowError> {
        match self.states.get_mut(name) {
            Some(state @ (ArtifactState::Produced | ArtifactState::Consumed)) => {
                *state = ArtifactState::Consumed;
                Ok(())
            }
            _ => Err(ShipflowError::ArtifactMissing {
                artifact: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_declaration_rejected() {
        let mut registry = ArtifactRegistry::new();
        registry.declare_external("A").unwrap();

        let err = registry.declare_external("A").unwrap_err();
        assert_eq!(err, Violation::DuplicateArtifact { name: "A".into() });
    }

    #[test]
    fn test_output_colliding_with_input() {
        let mut registry = ArtifactRegistry::new();
        registry.declare_external("A").unwrap();

        let err = registry.record_output("A", 0, "Source", "pull").unwrap_err();
        assert!(matches!(
            err,
            Violation::DuplicateProducer { ref existing, .. } if existing == "pipeline input"
        ));
    }

    #[test]
    fn test_resolution_requires_earlier_stage() {
        let mut registry = ArtifactRegistry::new();
        registry.record_output("A", 1, "Build", "compile").unwrap();

        assert!(!registry.resolves_before("A", 0));
        assert!(!registry.resolves_before("A", 1));
        assert!(registry.resolves_before("A", 2));
        assert!(!registry.resolves_before("missing", 5));
    }

    #[test]
    fn test_ledger_lifecycle() {
        let mut registry = ArtifactRegistry::new();
        registry.record_output("A", 0, "Source", "pull").unwrap();
        let mut ledger = ArtifactLedger::from_registry(&registry);

        assert_eq!(ledger.state("A"), Some(ArtifactState::Declared));
        assert!(ledger.mark_consumed("A").is_err());

        ledger.mark_produced("A").unwrap();
        ledger.mark_consumed("A").unwrap();
        assert_eq!(ledger.state("A"), Some(ArtifactState::Consumed));

        assert!(matches!(
            ledger.mark_produced("A"),
            Err(ShipflowError::ArtifactSealed { .. })
        ));
    }
}
