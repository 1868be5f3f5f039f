// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Artifact storage
//!
//! Each pipeline run gets its own directory under the storage root. An
//! artifact is staged into an empty directory, then sealed with a digest;
//! sealed artifacts are never rewritten.

mod filesystem;
mod hash;

pub use filesystem::{copy_tree, ArtifactStore};
pub use hash::{hash_file, hash_string, ContentHasher, TreeDigest};

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Producer recorded for imported pipeline inputs
pub const EXTERNAL_PRODUCER: &str = "pipeline input";

/// Manifest of a sealed artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SealedArtifact {
    /// Artifact name
    pub name: String,
    /// Action that produced it
    pub producer: String,
    /// BLAKE3 digest of the artifact tree
    pub digest: String,
    /// Number of files
    pub files: usize,
    /// Total size in bytes
    pub size_bytes: u64,
    /// When the artifact was sealed
    pub sealed_at: SystemTime,
}

/// Summary of one stored run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub artifacts: Vec<SealedArtifact>,
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Number of stored runs
    pub runs: usize,
    /// Number of sealed artifacts across runs
    pub artifacts: usize,
    /// Total size in bytes
    pub size_bytes: u64,
}

impl StoreStats {
    /// Format size for display
    pub fn formatted_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.size_bytes >= GB {
            format!("{:.2} GB", self.size_bytes as f64 / GB as f64)
        } else if self.size_bytes >= MB {
            format!("{:.2} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.2} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_size() {
        let stats = StoreStats {
            size_bytes: 512,
            ..Default::default()
        };
        assert_eq!(stats.formatted_size(), "512 bytes");

        let stats = StoreStats {
            size_bytes: 3 * 1024 * 1024,
            ..Default::default()
        };
        assert_eq!(stats.formatted_size(), "3.00 MB");
    }
}
