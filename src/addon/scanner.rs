//! Global file scanning.
//!
//! Computes the set of paths an addon's overlay subtrees place into the
//! shared application root. Only the allow-listed overlay roots are walked;
//! every other top-level entry of the addon directory (`assets/`, seed
//! scripts, metadata) is ignored. Symlinks are opaque: they are neither
//! recursed into nor reported.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use super::ledger::{relative_key, GlobalFileLedger};
use super::sync::is_real_dir;
use super::AddonResult;
use crate::core::OverlayConfig;

/// Which view of the global file set to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Every overlay file, whether or not it exists in the shared root.
    All,
    /// Only overlay files that already exist in the shared root and are not
    /// owned by this addon.
    ConflictsOnly,
}

/// Scanner bound to a shared root and an ordered overlay allow-list.
#[derive(Debug, Clone, Copy)]
pub struct GlobalFileScanner<'a> {
    shared_root: &'a Path,
    overlay_roots: &'a [String],
}

impl<'a> GlobalFileScanner<'a> {
    /// Create a scanner.
    pub fn new(shared_root: &'a Path, overlay_roots: &'a [String]) -> Self {
        Self { shared_root, overlay_roots }
    }

    /// Scan `addon_dir`.
    ///
    /// Paths are relative to the addon directory (which is also their location
    /// under the shared root), use forward slashes, and come out in overlay
    /// root order, then file name order.
    pub fn scan(
        &self,
        addon_dir: &Path,
        mode: ScanMode,
        ledger: &GlobalFileLedger,
    ) -> AddonResult<Vec<String>> {
        let mut list = Vec::new();

        for root in self.overlay_roots {
            if !OverlayConfig::is_valid_root(root) {
                tracing::warn!(root = %root, "Ignoring invalid overlay root");
                continue;
            }
            let overlay = addon_dir.join(root);
            if !is_real_dir(&overlay) {
                continue;
            }

            for entry in WalkDir::new(&overlay).follow_links(false).sort_by_file_name() {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let Some(relative) = relative_key(addon_dir, entry.path()) else {
                    continue;
                };

                match mode {
                    ScanMode::All => list.push(relative),
                    ScanMode::ConflictsOnly => {
                        let target = self.shared_root.join(&relative);
                        if fs::symlink_metadata(&target).is_ok()
                            && !ledger.owns(self.shared_root, &relative)
                        {
                            list.push(relative);
                        }
                    }
                }
            }
        }

        tracing::debug!(
            addon_dir = %addon_dir.display(),
            ?mode,
            count = list.len(),
            "Scanned global files"
        );
        Ok(list)
    }
}
