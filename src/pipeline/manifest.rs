// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Synthesized pipeline manifest
//!
//! A provider-neutral description of a validated pipeline. Credential values
//! never appear in it; source actions only carry the credential's name.

use serde::{Deserialize, Serialize};

use crate::errors::ShipflowError;
use crate::pipeline::{ActionKind, Pipeline};
use crate::storage::hash_string;

/// Manifest format version
pub const MANIFEST_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineManifest {
    pub version: String,
    pub pipeline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub storage: StorageManifest,
    pub inputs: Vec<String>,
    pub stages: Vec<StageManifest>,
    pub artifacts: Vec<ArtifactManifest>,
    /// BLAKE3 digest over everything above
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageManifest {
    pub identifier: String,
    pub env_var: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageManifest {
    pub name: String,
    /// Actions in execution order
    pub actions: Vec<ActionManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionManifest {
    pub name: String,
    pub kind: ActionKind,
    pub run_order: u32,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub configuration: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactManifest {
    pub name: String,
    pub producer: String,
    pub consumers: Vec<String>,
}

impl PipelineManifest {
    pub fn to_yaml(&self) -> Result<String, ShipflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    pub fn to_json(&self) -> Result<String, ShipflowError> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    fn compute_digest(&self) -> Result<String, ShipflowError> {
        let mut unsigned = self.clone();
        unsigned.digest = String::new();
        Ok(hash_string(&serde_json::to_string(&unsigned)?))
    }
}

impl Pipeline {
    /// Synthesize the manifest of this pipeline
    pub fn manifest(&self) -> Result<PipelineManifest, ShipflowError> {
        let stages = self
            .stages()
            .iter()
            .map(|stage| -> Result<StageManifest, ShipflowError> {
                let actions = stage
                    .ordered_actions()
                    .into_iter()
                    .map(|action| -> Result<ActionManifest, ShipflowError> {
                        let mut configuration = serde_json::to_value(&action.provider)?;
                        if let Some(map) = configuration.as_object_mut() {
                            map.remove("kind");
                        }
                        Ok(ActionManifest {
                            name: action.name.clone(),
                            kind: action.kind(),
                            run_order: action.effective_run_order(),
                            inputs: action.inputs.clone(),
                            outputs: action.outputs.clone(),
                            configuration,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StageManifest {
                    name: stage.name.clone(),
                    actions,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let artifacts = self
            .artifacts()
            .iter()
            .map(|record| ArtifactManifest {
                name: record.name.clone(),
                producer: record.producer_label(),
                consumers: record.consumers.iter().map(|c| c.action.clone()).collect(),
            })
            .collect();

        let mut manifest = PipelineManifest {
            version: MANIFEST_VERSION.to_string(),
            pipeline: self.name().to_string(),
            description: self.description().map(String::from),
            storage: StorageManifest {
                identifier: self.storage_identifier(),
                env_var: self.storage().env_var.clone(),
            },
            inputs: self.inputs().into_iter().map(String::from).collect(),
            stages,
            artifacts,
            digest: String::new(),
        };
        manifest.digest = manifest.compute_digest()?;

        Ok(manifest)
    }
}
