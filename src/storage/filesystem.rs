// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Filesystem-backed artifact store
//!
//! Layout under the storage root:
//!
//! ```text
//! runs/<run-id>/artifacts/<name>/    artifact contents
//! runs/<run-id>/manifests/<name>.json
//! runs/<run-id>/work/<action>/       scratch space for actions
//! change-sets/                       deployment ledger
//! ```

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{hash_string, ContentHasher, RunSummary, SealedArtifact, StoreStats, EXTERNAL_PRODUCER};
use crate::errors::ShipflowError;

/// Artifact store for one pipeline run
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Storage identifier handed to build actions
    identifier: String,
    /// Storage root
    root: PathBuf,
    /// Run identifier
    run_id: String,
}

impl ArtifactStore {
    /// Provision storage for a new run
    pub fn provision(root: PathBuf, identifier: impl Into<String>) -> Result<Self, ShipflowError> {
        let identifier = identifier.into();
        let run_id = new_run_id(&identifier);
        let store = Self {
            identifier,
            root,
            run_id,
        };

        for dir in [store.artifacts_dir(), store.manifests_dir(), store.work_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| ShipflowError::Storage {
                message: format!("Failed to create '{}': {}", dir.display(), e),
            })?;
        }

        tracing::info!(
            storage = %store.identifier,
            run = %store.run_id,
            "provisioned artifact storage"
        );

        Ok(store)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join("runs").join(&self.run_id)
    }

    /// Directory holding the deployment ledger
    pub fn change_set_dir(&self) -> PathBuf {
        self.root.join("change-sets")
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.run_dir().join("artifacts")
    }

    fn manifests_dir(&self) -> PathBuf {
        self.run_dir().join("manifests")
    }

    fn work_dir(&self) -> PathBuf {
        self.run_dir().join("work")
    }

    /// Directory holding an artifact's contents
    pub fn artifact_dir(&self, name: &str) -> PathBuf {
        self.artifacts_dir().join(name)
    }

    fn manifest_path(&self, name: &str) -> PathBuf {
        self.manifests_dir().join(format!("{}.json", name))
    }

    pub fn is_sealed(&self, name: &str) -> bool {
        self.manifest_path(name).exists()
    }

    /// Hand out an empty directory for an artifact about to be produced
    pub async fn prepare(&self, name: &str) -> Result<PathBuf, ShipflowError> {
        if self.is_sealed(name) {
            return Err(ShipflowError::ArtifactSealed {
                artifact: name.to_string(),
            });
        }

        let dir = self.artifact_dir(name);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await.map_err(|e| ShipflowError::Storage {
                message: format!("Failed to reset artifact '{}': {}", name, e),
            })?;
        }
        tokio::fs::create_dir_all(&dir).await.map_err(|e| ShipflowError::Storage {
            message: format!("Failed to create artifact '{}': {}", name, e),
        })?;

        Ok(dir)
    }

    /// Fingerprint a staged artifact and make it immutable
    pub async fn seal(&self, name: &str, producer: &str) -> Result<SealedArtifact, ShipflowError> {
        if self.is_sealed(name) {
            return Err(ShipflowError::ArtifactSealed {
                artifact: name.to_string(),
            });
        }

        let dir = self.artifact_dir(name);
        if !dir.is_dir() {
            return Err(ShipflowError::ArtifactMissing {
                artifact: name.to_string(),
            });
        }

        let tree = ContentHasher::new().hash_tree(&dir)?;
        let sealed = SealedArtifact {
            name: name.to_string(),
            producer: producer.to_string(),
            digest: tree.digest,
            files: tree.files,
            size_bytes: tree.bytes,
            sealed_at: SystemTime::now(),
        };

        let json = serde_json::to_string_pretty(&sealed)?;
        let path = self.manifest_path(name);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ShipflowError::FileWriteError {
                path: path.clone(),
                error: e.to_string(),
            })?;

        tracing::debug!(artifact = %name, digest = %sealed.digest, "sealed artifact");
        Ok(sealed)
    }

    /// Copy an external file or directory in as a sealed pipeline input
    pub async fn import(&self, name: &str, source: &Path) -> Result<SealedArtifact, ShipflowError> {
        let dir = self.prepare(name).await?;

        if source.is_dir() {
            copy_tree(source, &dir, &[])?;
        } else if source.is_file() {
            let file_name = source.file_name().ok_or_else(|| ShipflowError::Storage {
                message: format!("Cannot import '{}'", source.display()),
            })?;
            tokio::fs::copy(source, dir.join(file_name))
                .await
                .map_err(|e| ShipflowError::FileReadError {
                    path: source.to_path_buf(),
                    error: e.to_string(),
                })?;
        } else {
            return Err(ShipflowError::FileReadError {
                path: source.to_path_buf(),
                error: "no such file or directory".to_string(),
            });
        }

        self.seal(name, EXTERNAL_PRODUCER).await
    }

    /// Manifest of a sealed artifact
    pub fn get(&self, name: &str) -> Result<SealedArtifact, ShipflowError> {
        read_manifest(&self.manifest_path(name)).ok_or_else(|| ShipflowError::ArtifactMissing {
            artifact: name.to_string(),
        })
    }

    /// Contents directory of a sealed artifact
    pub fn path(&self, name: &str) -> Result<PathBuf, ShipflowError> {
        if !self.is_sealed(name) {
            return Err(ShipflowError::ArtifactMissing {
                artifact: name.to_string(),
            });
        }
        Ok(self.artifact_dir(name))
    }

    /// Fresh scratch directory for an action
    pub async fn scratch_dir(&self, action: &str) -> Result<PathBuf, ShipflowError> {
        let dir = self.work_dir().join(action);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Sealed artifacts of this run
    pub fn artifacts(&self) -> Result<Vec<SealedArtifact>, ShipflowError> {
        list_manifests(&self.manifests_dir())
    }

    /// All runs under a storage root, oldest first
    pub fn list_runs(root: &Path) -> Result<Vec<RunSummary>, ShipflowError> {
        let runs_dir = root.join("runs");
        let mut runs = Vec::new();

        if !runs_dir.exists() {
            return Ok(runs);
        }

        for entry in std::fs::read_dir(&runs_dir).map_err(|e| ShipflowError::Storage {
            message: format!("Failed to read storage directory: {}", e),
        })? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(run_id) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            runs.push(RunSummary {
                run_id,
                artifacts: list_manifests(&path.join("manifests"))?,
            });
        }

        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }

    /// Storage statistics for a root
    pub fn stats(root: &Path) -> Result<StoreStats, ShipflowError> {
        let runs = Self::list_runs(root)?;
        Ok(StoreStats {
            runs: runs.len(),
            artifacts: runs.iter().map(|r| r.artifacts.len()).sum(),
            size_bytes: runs
                .iter()
                .flat_map(|r| r.artifacts.iter())
                .map(|a| a.size_bytes)
                .sum(),
        })
    }

    /// Remove every stored run; the deployment ledger is kept
    pub async fn clear(root: &Path) -> Result<(), ShipflowError> {
        let runs_dir = root.join("runs");
        if runs_dir.exists() {
            tokio::fs::remove_dir_all(&runs_dir)
                .await
                .map_err(|e| ShipflowError::Storage {
                    message: format!("Failed to clear storage: {}", e),
                })?;
        }
        Ok(())
    }
}

fn new_run_id(identifier: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let salt = hash_string(&format!("{}:{}", identifier, now.as_nanos()));
    format!("{:010}-{}", now.as_secs(), &salt[..8])
}

fn read_manifest(path: &Path) -> Option<SealedArtifact> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn list_manifests(dir: &Path) -> Result<Vec<SealedArtifact>, ShipflowError> {
    let mut manifests = Vec::new();

    if !dir.exists() {
        return Ok(manifests);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(manifest) = read_manifest(&path) {
            manifests.push(manifest);
        }
    }

    manifests.sort_by(|a, b| a.sealed_at.cmp(&b.sealed_at).then(a.name.cmp(&b.name)));
    Ok(manifests)
}

/// Copy a directory tree, skipping `.git` and any path in `exclude`.
///
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[PathBuf]) -> Result<usize, ShipflowError> {
    let excluded: Vec<PathBuf> = exclude.iter().filter_map(|p| p.canonicalize().ok()).collect();
    copy_dir(src, dst, &excluded)
}

fn copy_dir(src: &Path, dst: &Path, excluded: &[PathBuf]) -> Result<usize, ShipflowError> {
    std::fs::create_dir_all(dst).map_err(|e| ShipflowError::FileWriteError {
        path: dst.to_path_buf(),
        error: e.to_string(),
    })?;

    let entries = std::fs::read_dir(src).map_err(|e| ShipflowError::FileReadError {
        path: src.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut copied = 0;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if entry.file_name() == ".git" {
            continue;
        }
        if let Ok(canonical) = path.canonicalize() {
            if excluded.iter().any(|e| *e == canonical) {
                continue;
            }
        }

        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copied += copy_dir(&path, &target, excluded)?;
        } else {
            std::fs::copy(&path, &target).map_err(|e| ShipflowError::FileWriteError {
                path: target.clone(),
                error: e.to_string(),
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}
