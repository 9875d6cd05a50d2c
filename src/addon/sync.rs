//! Directory tree copy/removal between an addon's private tree and the
//! shared application tree.
//!
//! Symlinks are never followed: during a copy they are skipped, so a link can
//! neither loop the walk nor publish content from outside the source tree.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{AddonError, AddonResult};

/// What a [`copy_dirs`] call placed on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Destination files written (absolute).
    pub files: Vec<PathBuf>,
    /// Destination directories that did not exist before the copy, parents first.
    pub created_dirs: Vec<PathBuf>,
}

impl SyncReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.files.extend(other.files);
        self.created_dirs.extend(other.created_dirs);
    }
}

/// Whether `path` is a directory itself, not a symlink to one.
pub fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Recursively copy `src` onto `dst`, creating directories and overwriting files.
///
/// Missing ancestors of `dst` are created too and show up in the report.
pub fn copy_dirs(src: &Path, dst: &Path) -> AddonResult<SyncReport> {
    let mut report = SyncReport::default();

    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if entry.depth() == 0 {
                let missing = missing_ancestors(&target);
                fs::create_dir_all(&target).map_err(|e| AddonError::write(&target, e))?;
                report.created_dirs.extend(missing);
            } else if !target.is_dir() {
                fs::create_dir_all(&target).map_err(|e| AddonError::write(&target, e))?;
                report.created_dirs.push(target);
            }
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map_err(|e| AddonError::write(&target, e))?;
            report.files.push(target);
        } else {
            tracing::debug!(path = %entry.path().display(), "Skipping non-regular entry");
        }
    }

    tracing::debug!(
        src = %src.display(),
        dst = %dst.display(),
        files = report.files.len(),
        "Copied directory tree"
    );
    Ok(report)
}

/// `path` and its ancestors that do not exist yet, outermost first.
fn missing_ancestors(path: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = path
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && fs::symlink_metadata(p).is_err())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

/// Recursively delete `path`. An absent directory is a no-op success.
pub fn remove_dirs(path: &Path) -> AddonResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed directory tree");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AddonError::write(path, e)),
    }
}

/// Attempt [`remove_dirs`]; log but do not propagate failure.
pub fn remove_dirs_best_effort(path: &Path) {
    if let Err(e) = remove_dirs(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove directory");
    }
}

/// Attempt to delete a single file; log but do not propagate failure.
pub fn remove_file_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// Remove the given directories if they are empty, deepest first.
pub fn prune_empty_dirs(dirs: &[PathBuf]) {
    let mut dirs: Vec<&PathBuf> = dirs.iter().collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    for dir in dirs {
        // Fails on non-empty directories, which must be kept.
        if fs::remove_dir(dir).is_ok() {
            tracing::debug!(path = %dir.display(), "Pruned empty directory");
        }
    }
}

/// Write `contents` to `path` through a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> AddonResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| AddonError::write(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| AddonError::write(path, e))?;
    tmp.write_all(contents).map_err(|e| AddonError::write(path, e))?;
    tmp.persist(path).map_err(|e| AddonError::write(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_copy_dirs_creates_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");

        write(&src.join("a.txt"), "new a");
        write(&src.join("nested/deep/b.txt"), "b");
        write(&dst.join("a.txt"), "old a");

        let report = copy_dirs(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "new a");
        assert_eq!(fs::read_to_string(dst.join("nested/deep/b.txt")).unwrap(), "b");
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.created_dirs, vec![dst.join("nested"), dst.join("nested/deep")]);
    }

    #[test]
    fn test_copy_dirs_reports_created_parents() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let shared = temp_dir.path().join("shared");
        let dst = shared.join("public/assets/addons/demo");

        write(&src.join("logo.png"), "png");
        fs::create_dir_all(shared.join("public")).unwrap();

        let report = copy_dirs(&src, &dst).unwrap();

        assert_eq!(
            report.created_dirs,
            vec![shared.join("public/assets"), shared.join("public/assets/addons"), dst.clone()]
        );
        assert_eq!(report.files, vec![dst.join("logo.png")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dirs_skips_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");

        write(&src.join("real.txt"), "real");
        std::os::unix::fs::symlink(temp_dir.path(), src.join("loop")).unwrap();

        let report = copy_dirs(&src, &dst).unwrap();

        assert_eq!(report.files, vec![dst.join("real.txt")]);
        assert!(!dst.join("loop").exists());
    }

    #[test]
    fn test_remove_dirs_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("gone");
        write(&dir.join("x/y.txt"), "y");

        remove_dirs(&dir).unwrap();
        assert!(!dir.exists());
        remove_dirs(&dir).unwrap();
    }

    #[test]
    fn test_prune_keeps_non_empty() {
        let temp_dir = TempDir::new().unwrap();
        let outer = temp_dir.path().join("outer");
        let inner = outer.join("inner");
        let kept = temp_dir.path().join("kept");
        fs::create_dir_all(&inner).unwrap();
        write(&kept.join("file"), "x");

        prune_empty_dirs(&[outer.clone(), inner.clone(), kept.clone()]);

        assert!(!outer.exists());
        assert!(kept.join("file").exists());
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/out.js");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
