// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Build provider
//!
//! Runs a shell command in a scratch copy of the input artifact. Whatever the
//! command writes to `$SHIPFLOW_OUTPUT_DIR` becomes the output artifact.

use async_trait::async_trait;

use super::{run_shell, ActionContext, ActionExecutor, ActionOutcome};
use crate::errors::ShipflowError;
use crate::pipeline::{Action, Provider};
use crate::storage::copy_tree;

/// Build executor
pub struct BuildExecutor;

impl BuildExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BuildExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for BuildExecutor {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ActionContext,
    ) -> Result<ActionOutcome, ShipflowError> {
        let Provider::Build {
            command,
            shell,
            image,
            env,
        } = &action.provider
        else {
            return Err(ShipflowError::action_failed(
                &ctx.stage,
                &action.name,
                "expected a build provider",
            ));
        };

        let (Some(input), Some(output)) = (ctx.input(), ctx.output()) else {
            return Err(ShipflowError::action_failed(
                &ctx.stage,
                &action.name,
                "build action needs one input and one output",
            ));
        };

        copy_tree(input, &ctx.scratch_dir, &[])?;

        let mut vars = ctx.env.clone();
        vars.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.insert(
            "SHIPFLOW_INPUT_DIR".into(),
            input.to_string_lossy().to_string(),
        );
        vars.insert(
            "SHIPFLOW_OUTPUT_DIR".into(),
            output.to_string_lossy().to_string(),
        );
        if let Some(image) = image {
            vars.insert("SHIPFLOW_BUILD_IMAGE".into(), image.clone());
        }

        tracing::debug!(action = %action.name, shell = %shell, "running build command");
        run_shell(shell, command, &ctx.scratch_dir, &vars).await
    }

    async fn check_action(&self, action: &Action) -> Result<(), ShipflowError> {
        let Provider::Build { command, shell, .. } = &action.provider else {
            return Ok(());
        };

        if command.trim().is_empty() {
            return Err(ShipflowError::InvalidPipeline {
                reason: format!("build action '{}' has an empty command", action.name),
                help: None,
            });
        }

        which::which(shell).map_err(|_| ShipflowError::tool_not_found(shell))?;
        Ok(())
    }
}
