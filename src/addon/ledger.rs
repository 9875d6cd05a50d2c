//! Record of the global files an addon has placed in the shared root.
//!
//! A shared-root file counts as owned by the addon only while its content
//! still hashes to the value recorded when it was placed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::sync::{write_atomic, SyncReport};
use super::{AddonError, AddonResult};

/// Ownership ledger stored inside the addon directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalFileLedger {
    /// Relative path (forward slashes) -> SHA-256 hex of the placed content.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Directories under the shared root the addon created, relative.
    #[serde(default)]
    pub created_dirs: Vec<String>,
    /// When the files were last published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl GlobalFileLedger {
    /// Load the ledger at `path`; a missing file yields an empty ledger.
    pub fn load(path: &Path) -> AddonResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| AddonError::Config(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the ledger to `path`.
    pub fn save(&self, path: &Path) -> AddonResult<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| AddonError::Config(e.to_string()))?;
        write_atomic(path, content.as_bytes())
    }

    /// Record what an overlay push placed under `shared_root`.
    ///
    /// Directories created by an earlier push are kept so a later removal can
    /// still prune them.
    pub fn record(&mut self, shared_root: &Path, report: &SyncReport) -> AddonResult<()> {
        for file in &report.files {
            if let Some(relative) = relative_key(shared_root, file) {
                self.files.insert(relative, hash_file(file)?);
            }
        }
        for dir in &report.created_dirs {
            if let Some(relative) = relative_key(shared_root, dir) {
                if !self.created_dirs.contains(&relative) {
                    self.created_dirs.push(relative);
                }
            }
        }
        self.published_at = Some(Utc::now());
        Ok(())
    }

    /// Whether `shared_root/relative` is the file this addon placed there.
    pub fn owns(&self, shared_root: &Path, relative: &str) -> bool {
        self.files.get(relative).is_some_and(|expected| {
            hash_file(&shared_root.join(relative)).is_ok_and(|actual| &actual == expected)
        })
    }

    /// Absolute paths of the recorded created directories.
    pub fn created_dirs_under(&self, shared_root: &Path) -> Vec<PathBuf> {
        self.created_dirs.iter().map(|d| shared_root.join(d)).collect()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.files.clear();
        self.created_dirs.clear();
        self.published_at = None;
    }
}

/// SHA-256 hex digest of a file's content.
pub fn hash_file(path: &Path) -> AddonResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// `path` relative to `root`, with forward slashes.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> =
        relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
