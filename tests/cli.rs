// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! End-to-end tests for the shipflow binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const LOCAL_PIPELINE: &str = r#"
name: delivery
stages:
  - name: Source
    actions:
      - name: Source
        provider: { kind: source, repository: app }
        outputs: [source]
  - name: Build
    actions:
      - name: Build
        provider:
          kind: build
          shell: sh
          command: cp template.yaml "$SHIPFLOW_OUTPUT_DIR/out.yaml" && echo "$PACKAGE_BUCKET" > "$SHIPFLOW_OUTPUT_DIR/bucket"
        inputs: [source]
        outputs: [build]
  - name: Deploy
    actions:
      - name: Deploy
        provider: { kind: change-set-execute, stack: delivery, change_set: delivery-cs }
        run_order: 2
      - name: CreateChangeSet
        provider: { kind: change-set-create, stack: delivery, change_set: delivery-cs, template_path: out.yaml }
        inputs: [build]
        run_order: 1
"#;

fn shipflow() -> Command {
    let mut cmd = Command::cargo_bin("shipflow").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("SHIPFLOW_PIPELINE");
    cmd
}

fn project(pipeline: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".shipflow.yaml"), pipeline).unwrap();
    std::fs::create_dir_all(dir.path().join("app")).unwrap();
    std::fs::write(dir.path().join("app/template.yaml"), "Resources: {}\n").unwrap();
    dir
}

fn in_dir<'a>(cmd: &'a mut Command, dir: &Path) -> &'a mut Command {
    cmd.arg("-C").arg(dir)
}

#[test]
fn validate_accepts_local_pipeline() {
    let dir = project(LOCAL_PIPELINE);

    in_dir(&mut shipflow(), dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn validate_reports_every_violation() {
    let dir = project(
        r#"
name: broken
stages:
  - name: Source
    actions:
      - name: pull
        provider: { kind: source, repository: app }
        outputs: [source]
  - name: Empty
    actions: []
  - name: Deploy
    actions:
      - name: Create
        provider: { kind: change-set-create, stack: s, change_set: cs, template_path: out.yaml }
        inputs: [build]
"#,
    );

    in_dir(&mut shipflow(), dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stage 'Empty' has no actions"))
        .stderr(predicate::str::contains("consumes unresolved artifact 'build'"))
        .stderr(predicate::str::contains("2 violation(s)"));
}

#[test]
fn graph_text_follows_run_order() {
    let dir = project(LOCAL_PIPELINE);

    in_dir(&mut shipflow(), dir.path())
        .args(["graph", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[1] CreateChangeSet (change-set-create) <- build",
        ))
        .stdout(predicate::str::contains("[2] Deploy (change-set-execute)"));
}

#[test]
fn graph_mermaid_draws_artifact_edges() {
    let dir = project(LOCAL_PIPELINE);

    in_dir(&mut shipflow(), dir.path())
        .args(["graph", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("n0[\"Source\"]"))
        .stdout(predicate::str::contains("n0 -->|source| n1"));
}

#[test]
fn synth_emits_json_manifest() {
    let dir = project(LOCAL_PIPELINE);

    in_dir(&mut shipflow(), dir.path())
        .args(["synth", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pipeline\": \"delivery\""))
        .stdout(predicate::str::contains("\"identifier\": \"delivery-artifacts\""));
}

#[test]
fn run_executes_pipeline_end_to_end() {
    let dir = project(LOCAL_PIPELINE);

    in_dir(&mut shipflow(), dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline completed successfully"));

    let ledger = dir
        .path()
        .join(".shipflow/artifacts/change-sets/delivery/delivery-cs.json");
    let record = std::fs::read_to_string(ledger).unwrap();
    assert!(record.contains("\"executed\""));

    in_dir(&mut shipflow(), dir.path())
        .args(["artifacts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 run(s), 2 artifact(s)"));

    in_dir(&mut shipflow(), dir.path())
        .args(["artifacts", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Artifact storage cleared."));
}

#[test]
fn run_failure_names_stage_and_action() {
    let dir = project(&LOCAL_PIPELINE.replace("cp template.yaml", "exit 7; cp template.yaml"));

    in_dir(&mut shipflow(), dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Action 'Build' in stage 'Build' failed"));

    assert!(!dir.path().join(".shipflow/artifacts/change-sets").exists());
}

#[test]
fn run_without_credential_only_synthesizes() {
    let dir = project(
        r#"
name: remote
stages:
  - name: Source
    actions:
      - name: pull
        provider: { kind: source, repository: "https://example.invalid/app.git", credential: SHIPFLOW_CLI_TEST_TOKEN }
        outputs: [source]
"#,
    );

    in_dir(&mut shipflow(), dir.path())
        .env_remove("SHIPFLOW_CLI_TEST_TOKEN")
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Synthesis only"));

    assert!(!dir.path().join(".shipflow").exists());
}

#[test]
fn run_dry_run_prints_plan() {
    let dir = project(LOCAL_PIPELINE);

    in_dir(&mut shipflow(), dir.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution plan (3 stages, 4 actions)"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(!dir.path().join(".shipflow").exists());
}

#[test]
fn init_writes_a_valid_pipeline() {
    let dir = TempDir::new().unwrap();

    in_dir(&mut shipflow(), dir.path())
        .args(["init", "demo"])
        .assert()
        .success();
    assert!(dir.path().join(".shipflow.yaml").exists());

    in_dir(&mut shipflow(), dir.path())
        .arg("validate")
        .assert()
        .success();

    in_dir(&mut shipflow(), dir.path())
        .args(["init", "demo"])
        .assert()
        .failure();
}
