// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Pipeline model
//!
//! Definitions as read from disk, the builder that validates them into an
//! immutable [`Pipeline`], and everything that consumes a validated pipeline:
//! the artifact graph, the synthesized manifest and the executor.

pub mod artifact;
mod builder;
mod dag;
mod definition;
mod executor;
mod manifest;
pub(crate) mod validation;

pub use artifact::{
    ArtifactLedger, ArtifactOrigin, ArtifactRecord, ArtifactRegistry, ArtifactState, Consumer,
};
pub use builder::{Pipeline, PipelineBuilder, Stage};
pub use dag::{ArtifactGraph, FlowNode};
pub use definition::*;
pub use executor::{ActionRecord, ExecutionOptions, PipelineExecutor, PipelineResult, RunMode};
pub use manifest::{
    ActionManifest, ArtifactManifest, PipelineManifest, StageManifest, StorageManifest,
    MANIFEST_VERSION,
};
pub use validation::{check_name, PipelineValidator, ValidationReport};
