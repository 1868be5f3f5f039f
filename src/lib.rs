// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! # shipflow - Delivery Pipeline Orchestrator
//!
//! `shipflow` models a delivery pipeline as ordered stages of actions that
//! pass named artifacts to one another, validates the whole artifact flow
//! before anything runs, and executes it one action at a time.
//!
//! ## Features
//!
//! - **Validated artifact flow** - every consumed artifact needs an earlier producer
//! - **Aggregated errors** - validation reports every violation at once
//! - **Two-phase deployment** - change sets are created before they are executed
//! - **Content-addressed artifacts** - sealed with BLAKE3 digests, never rewritten
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter pipeline
//! shipflow init my-app
//!
//! # Check it
//! shipflow validate
//!
//! # Run it
//! shipflow run --credential GITHUB_TOKEN=...
//! ```
//!
//! ## Library use
//!
//! ```
//! use shipflow::pipeline::{Action, PipelineBuilder, Provider};
//!
//! let mut builder = PipelineBuilder::new("app");
//! builder
//!     .add_stage(
//!         "Source",
//!         vec![Action::new(
//!             "pull",
//!             Provider::Source { repository: ".".into(), branch: None, credential: None },
//!         )
//!         .with_outputs(["source"])],
//!     )
//!     .unwrap();
//! let pipeline = builder.validate().unwrap();
//! assert_eq!(pipeline.action_count(), 1);
//! ```

pub mod cli;
pub mod errors;
pub mod pipeline;
pub mod providers;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use errors::{ConfigurationWarning, ShipflowError, ShipflowResult, Violation};
pub use pipeline::{Action, Pipeline, PipelineBuilder, Provider, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
