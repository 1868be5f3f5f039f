// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Init command - write a starter pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::Path;

use super::DEFAULT_PIPELINE_FILE;
use crate::pipeline::{PipelineBuilder, PipelineDefinition};
use crate::utils::print_success;

/// Run the init command
pub async fn run(name: Option<String>, force: bool, verbose: bool) -> Result<()> {
    let pipeline_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "my-app".to_string())
    });

    println!("{}", "Initializing shipflow pipeline...".bold());
    println!();

    let path = Path::new(DEFAULT_PIPELINE_FILE);
    if path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Pass --force to overwrite it.",
            DEFAULT_PIPELINE_FILE
        ));
    }

    let content = generate_default_template(&pipeline_name);

    // The starter must always be a valid pipeline
    let definition = PipelineDefinition::from_yaml(&content)?;
    PipelineBuilder::from_definition(&definition)?;

    std::fs::write(path, &content)
        .map_err(|e| miette::miette!("Failed to write {}: {}", DEFAULT_PIPELINE_FILE, e))?;
    print_success(&format!("Created {}", DEFAULT_PIPELINE_FILE));

    println!();
    println!("{}", "Pipeline initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Point the source action at your repository in {}", DEFAULT_PIPELINE_FILE.cyan());
    println!("  2. Check the artifact flow with {}", "shipflow graph".cyan());
    println!("  3. Run {} to execute the pipeline", "shipflow run".cyan());
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", content.dimmed());
    }

    Ok(())
}

fn generate_default_template(name: &str) -> String {
    let stack = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect::<String>()
        .to_lowercase();

    format!(
        r#"# shipflow pipeline definition

version: "1"
name: "{stack}"

storage:
  env_var: PACKAGE_BUCKET

stages:
  - name: Source
    actions:
      - name: Source
        provider:
          kind: source
          repository: "."
          # credential: GITHUB_TOKEN
        outputs: [source]

  - name: Build
    actions:
      - name: Build
        provider:
          kind: build
          command: cp template.yaml "$SHIPFLOW_OUTPUT_DIR/out.yaml"
        inputs: [source]
        outputs: [build]

  - name: Deploy
    actions:
      - name: CreateChangeSet
        provider:
          kind: change-set-create
          stack: "{stack}"
          change_set: "{stack}-changeset"
          template_path: out.yaml
          admin_permissions: true
        inputs: [build]
        run_order: 1
      - name: Deploy
        provider:
          kind: change-set-execute
          stack: "{stack}"
          change_set: "{stack}-changeset"
        run_order: 2
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_validates() {
        let content = generate_default_template("My App");
        let definition = PipelineDefinition::from_yaml(&content).unwrap();
        let pipeline = PipelineBuilder::from_definition(&definition).unwrap();

        assert_eq!(pipeline.name(), "my-app");
        let order: Vec<&str> = pipeline
            .execution_order()
            .iter()
            .map(|(_, a)| a.name.as_str())
            .collect();
        assert_eq!(order, vec!["Source", "Build", "CreateChangeSet", "Deploy"]);
    }
}
