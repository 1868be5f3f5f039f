// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Content hashing for artifact digests
//!
//! Uses BLAKE3 for fast, secure content hashing.

use blake3::Hasher;
use std::path::{Path, PathBuf};

use crate::errors::ShipflowError;

/// Content hasher for artifact trees
pub struct ContentHasher {
    hasher: Hasher,
    files: usize,
    bytes: u64,
}

/// Digest of a file tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDigest {
    pub digest: String,
    pub files: usize,
    pub bytes: u64,
}

impl ContentHasher {
    /// Create a new content hasher
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
            files: 0,
            bytes: 0,
        }
    }

    /// Hash every file under `root`, keyed by relative path.
    ///
    /// Files are visited in sorted order so equal trees hash equally.
    pub fn hash_tree(mut self, root: &Path) -> Result<TreeDigest, ShipflowError> {
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();

        for file in files {
            let relative = file.strip_prefix(root).unwrap_or(&file);
            self.hasher
                .update(relative.to_string_lossy().replace('\\', "/").as_bytes());
            self.hasher.update(&[0]);
            self.hash_file(&file)?;
        }

        Ok(TreeDigest {
            digest: self.hasher.finalize().to_hex().to_string(),
            files: self.files,
            bytes: self.bytes,
        })
    }

    /// Hash a single file's contents
    pub fn hash_file(&mut self, path: &Path) -> Result<(), ShipflowError> {
        let content = std::fs::read(path).map_err(|e| ShipflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        self.files += 1;
        self.bytes += content.len() as u64;
        self.hasher.update(&content);
        Ok(())
    }

    /// Hash arbitrary bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finalize and get the hash
    pub fn finalize(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ShipflowError> {
    if dir.is_file() {
        files.push(dir.to_path_buf());
        return Ok(());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| ShipflowError::FileReadError {
        path: dir.to_path_buf(),
        error: e.to_string(),
    })?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }

    Ok(())
}

/// Compute a quick hash of a string
pub fn hash_string(s: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(s.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Compute hash of a file
pub fn hash_file(path: &Path) -> Result<String, ShipflowError> {
    let content = std::fs::read(path).map_err(|e| ShipflowError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut hasher = Hasher::new();
    hasher.update(&content);
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_string() {
        assert_eq!(hash_string("hello"), hash_string("hello"));
        assert_ne!(hash_string("hello"), hash_string("world"));
    }

    #[test]
    fn test_tree_digest_tracks_paths_and_content() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();

        for dir in [a.path(), b.path()] {
            std::fs::create_dir_all(dir.join("sub")).unwrap();
            std::fs::write(dir.join("sub/out.yaml"), "Resources: {}").unwrap();
            std::fs::write(dir.join("README"), "hi").unwrap();
        }

        let first = ContentHasher::new().hash_tree(a.path()).unwrap();
        let second = ContentHasher::new().hash_tree(b.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.files, 2);
        assert_eq!(first.bytes, 15);

        std::fs::rename(b.path().join("README"), b.path().join("README.md")).unwrap();
        let renamed = ContentHasher::new().hash_tree(b.path()).unwrap();
        assert_ne!(first.digest, renamed.digest);
    }
}
