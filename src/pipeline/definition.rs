// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for .shipflow.yaml files (JSON and TOML are accepted too).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::ShipflowError;

/// Default run-order for actions that do not set one
pub const DEFAULT_RUN_ORDER: u32 = 1;

/// Highest run-order accepted within a stage
pub const MAX_RUN_ORDER: u32 = 999;

/// Pipeline definition from .shipflow.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Definition version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Artifact storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Artifacts supplied from outside the pipeline
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Environment shared by every build action
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Deployment provider settings
    #[serde(default)]
    pub deploy: DeployConfig,

    /// Stages in execution order
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

fn default_version() -> String {
    "1".to_string()
}

impl PipelineDefinition {
    /// Load a definition, picking the parser from the file extension
    pub fn from_file(path: &Path) -> Result<Self, ShipflowError> {
        if !path.exists() {
            return Err(ShipflowError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ShipflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Err(ShipflowError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse definition from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ShipflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse definition from JSON string
    pub fn from_json(json: &str) -> Result<Self, ShipflowError> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Parse definition from TOML string
    pub fn from_toml(text: &str) -> Result<Self, ShipflowError> {
        toml::from_str(text).map_err(Into::into)
    }

    /// Serialize definition to YAML
    pub fn to_yaml(&self) -> Result<String, ShipflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Credential names referenced by source actions, in declaration order
    pub fn credential_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for action in self.stages.iter().flat_map(|s| s.actions.iter()) {
            if let Provider::Source {
                credential: Some(name),
                ..
            } = &action.provider
            {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        }
        names
    }
}

/// A stage as written in the definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Stage name (must be unique within pipeline)
    pub name: String,

    /// Stage description
    #[serde(default)]
    pub description: Option<String>,

    /// Actions in declaration order
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A single unit of work inside a stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    /// Action name (must be unique within pipeline)
    pub name: String,

    /// What runs the action
    pub provider: Provider,

    /// Artifacts consumed, in order
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Artifacts produced, in order
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Position within the stage; lower runs first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_order: Option<u32>,
}

impl Action {
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            inputs: vec![],
            outputs: vec![],
            run_order: None,
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = Some(run_order);
        self
    }

    /// The action kind implied by its provider
    pub fn kind(&self) -> ActionKind {
        self.provider.kind()
    }

    /// Run-order with the default applied
    pub fn effective_run_order(&self) -> u32 {
        self.run_order.unwrap_or(DEFAULT_RUN_ORDER)
    }
}

/// Provider configuration, one variant per action kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Provider {
    /// Pull source code into an artifact
    Source {
        /// Local directory or git URL
        repository: String,

        /// Branch to check out
        #[serde(default)]
        branch: Option<String>,

        /// Name of the credential holding the access token
        #[serde(default)]
        credential: Option<String>,
    },

    /// Turn one artifact into another with a shell command
    Build {
        /// Command to run
        command: String,

        /// Shell to use (bash, sh, etc.)
        #[serde(default = "default_shell")]
        shell: String,

        /// Build image identifier, passed through untouched
        #[serde(default)]
        image: Option<String>,

        /// Extra environment variables
        #[serde(default)]
        env: BTreeMap<String, String>,
    },

    /// Stage a change set from a template inside the input artifact
    ChangeSetCreate {
        stack: String,
        change_set: String,
        /// Template path relative to the input artifact root
        template_path: PathBuf,
        #[serde(default)]
        admin_permissions: bool,
    },

    /// Apply a previously created change set
    ChangeSetExecute { stack: String, change_set: String },
}

fn default_shell() -> String {
    "bash".to_string()
}

impl Provider {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Source { .. } => ActionKind::Source,
            Self::Build { .. } => ActionKind::Build,
            Self::ChangeSetCreate { .. } => ActionKind::ChangeSetCreate,
            Self::ChangeSetExecute { .. } => ActionKind::ChangeSetExecute,
        }
    }

    /// Stack and change-set identifiers for deployment actions
    pub fn change_set(&self) -> Option<(&str, &str)> {
        match self {
            Self::ChangeSetCreate {
                stack, change_set, ..
            }
            | Self::ChangeSetExecute { stack, change_set } => {
                Some((stack.as_str(), change_set.as_str()))
            }
            _ => None,
        }
    }
}

/// Kinds of pipeline action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Source,
    Build,
    ChangeSetCreate,
    ChangeSetExecute,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        Self::Source,
        Self::Build,
        Self::ChangeSetCreate,
        Self::ChangeSetExecute,
    ];

    /// Required (inputs, outputs) counts
    pub fn arity(self) -> (usize, usize) {
        match self {
            Self::Source => (0, 1),
            Self::Build => (1, 1),
            Self::ChangeSetCreate => (1, 0),
            Self::ChangeSetExecute => (0, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Build => "build",
            Self::ChangeSetCreate => "change-set-create",
            Self::ChangeSetExecute => "change-set-execute",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage identifier handed to build actions (default: "<pipeline>-artifacts")
    #[serde(default)]
    pub bucket: Option<String>,

    /// Environment variable carrying the identifier
    #[serde(default = "default_env_var")]
    pub env_var: String,

    /// Local directory backing the store
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            env_var: default_env_var(),
            directory: default_storage_dir(),
        }
    }
}

impl StorageConfig {
    /// Resolve the storage identifier for a pipeline
    pub fn identifier(&self, pipeline_name: &str) -> String {
        self.bucket
            .clone()
            .unwrap_or_else(|| format!("{}-artifacts", pipeline_name.to_lowercase()))
    }
}

fn default_env_var() -> String {
    "PACKAGE_BUCKET".to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".shipflow/artifacts")
}

/// Deployment provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DeployConfig {
    /// Command creating a change set; local ledger when unset
    #[serde(default)]
    pub create_command: Option<String>,

    /// Command executing a change set; local ledger when unset
    #[serde(default)]
    pub execute_command: Option<String>,

    /// Shell for the commands above
    #[serde(default)]
    pub shell: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELIVERY_YAML: &str = r#"
version: "1"
name: "quarkus-lambda-sam"
stages:
  - name: Source
    actions:
      - name: Github_Source
        provider:
          kind: source
          repository: https://github.com/andrea-velasquez/quarkus-lambda-sam.git
          credential: GITHUB_TOKEN
        outputs: [source]
  - name: Build
    actions:
      - name: Build
        provider:
          kind: build
          command: sam build && sam package --output-template-file "$SHIPFLOW_OUTPUT_DIR/out.yaml"
          image: amazon-linux-2
        inputs: [source]
        outputs: [build]
  - name: Deploy
    actions:
      - name: CreateChangeSet
        provider:
          kind: change-set-create
          stack: quarkus-lambda-sam
          change_set: quarkus-lambda-sam-changeset
          template_path: out.yaml
          admin_permissions: true
        inputs: [build]
        run_order: 1
      - name: Deploy
        provider:
          kind: change-set-execute
          stack: quarkus-lambda-sam
          change_set: quarkus-lambda-sam-changeset
        run_order: 2
"#;

    #[test]
    fn test_parse_delivery_pipeline() {
        let def = PipelineDefinition::from_yaml(DELIVERY_YAML).unwrap();

        assert_eq!(def.name, "quarkus-lambda-sam");
        assert_eq!(def.stages.len(), 3);

        let deploy = def.get_stage("Deploy").unwrap();
        assert_eq!(deploy.actions[0].kind(), ActionKind::ChangeSetCreate);
        assert_eq!(deploy.actions[1].kind(), ActionKind::ChangeSetExecute);
        assert_eq!(deploy.actions[1].effective_run_order(), 2);
    }

    #[test]
    fn test_build_provider_defaults() {
        let def = PipelineDefinition::from_yaml(DELIVERY_YAML).unwrap();
        match &def.stages[1].actions[0].provider {
            Provider::Build {
                shell, image, env, ..
            } => {
                assert_eq!(shell, "bash");
                assert_eq!(image.as_deref(), Some("amazon-linux-2"));
                assert!(env.is_empty());
            }
            other => panic!("Expected build provider, got {:?}", other),
        }
    }

    #[test]
    fn test_storage_defaults() {
        let def = PipelineDefinition::from_yaml(DELIVERY_YAML).unwrap();
        assert_eq!(def.storage.env_var, "PACKAGE_BUCKET");
        assert_eq!(def.storage.identifier(&def.name), "quarkus-lambda-sam-artifacts");
        assert_eq!(def.storage.directory, PathBuf::from(".shipflow/artifacts"));
    }

    #[test]
    fn test_credential_names() {
        let def = PipelineDefinition::from_yaml(DELIVERY_YAML).unwrap();
        assert_eq!(def.credential_names(), vec!["GITHUB_TOKEN"]);
    }

    #[test]
    fn test_parse_toml_definition() {
        let text = r#"
name = "tiny"
inputs = ["seed"]

[[stages]]
name = "Build"

[[stages.actions]]
name = "compile"
inputs = ["seed"]
outputs = ["bin"]

[stages.actions.provider]
kind = "build"
command = "make"
"#;

        let def = PipelineDefinition::from_toml(text).unwrap();
        assert_eq!(def.inputs, vec!["seed"]);
        assert_eq!(def.stages[0].actions[0].kind(), ActionKind::Build);
    }

    #[test]
    fn test_stage_without_actions_parses() {
        let yaml = r#"
name: "p"
stages:
  - name: Empty
"#;
        let def = PipelineDefinition::from_yaml(yaml).unwrap();
        assert!(def.stages[0].actions.is_empty());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.ini");
        std::fs::write(&path, "name = x").unwrap();

        let result = PipelineDefinition::from_file(&path);
        assert!(matches!(result, Err(ShipflowError::UnsupportedFormat { .. })));
    }
}
