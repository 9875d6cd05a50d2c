//! Addon package extraction.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use super::{AddonError, AddonResult};

/// Extract the zip archive at `archive_path` into `dest_dir`, creating it if absent.
///
/// The archive's internal layout is kept verbatim. Entries whose names would
/// escape `dest_dir` fail the whole extraction. On error the caller owns the
/// cleanup of `dest_dir`.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> AddonResult<()> {
    tracing::info!(
        archive = %archive_path.display(),
        dest = %dest_dir.display(),
        "Extracting addon package"
    );

    let file = File::open(archive_path).map_err(|e| {
        AddonError::Extract(format!("Unable to open {}: {e}", archive_path.display()))
    })?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AddonError::Extract(format!("Unable to open the zip file: {e}")))?;

    fs::create_dir_all(dest_dir).map_err(|e| AddonError::write(dest_dir, e))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AddonError::Extract(format!("Failed to read archive entry: {e}")))?;

        let Some(entry_path) = entry.enclosed_name() else {
            return Err(AddonError::Extract(format!("Unsafe path in archive: {}", entry.name())));
        };
        let dest_path = dest_dir.join(entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| extract_io(&dest_path, e))?;
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| extract_io(parent, e))?;
        }
        let mut outfile = File::create(&dest_path).map_err(|e| extract_io(&dest_path, e))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| extract_io(&dest_path, e))?;
    }

    tracing::debug!(entries = archive.len(), "Extraction complete");
    Ok(())
}

fn extract_io(path: &Path, e: io::Error) -> AddonError {
    AddonError::Extract(format!("Unable to extract {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_preserves_layout() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("demo.zip");
        let dest = temp_dir.path().join("addons/demo");
        build_zip(
            &archive,
            &[
                ("info.toml", "name = \"demo\""),
                ("assets/", ""),
                ("assets/logo.png", "png"),
                ("application/demo/controller.php", "<?php"),
            ],
        );

        extract_archive(&archive, &dest).unwrap();

        assert!(dest.join("assets").is_dir());
        assert_eq!(fs::read_to_string(dest.join("assets/logo.png")).unwrap(), "png");
        assert_eq!(
            fs::read_to_string(dest.join("application/demo/controller.php")).unwrap(),
            "<?php"
        );
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("bad.zip");
        fs::write(&archive, b"{\"code\":0}").unwrap();

        let result = extract_archive(&archive, &temp_dir.path().join("out"));
        assert!(matches!(result, Err(AddonError::Extract(_))));
    }

    #[test]
    fn test_extract_missing_archive() {
        let temp_dir = TempDir::new().unwrap();
        let result =
            extract_archive(&temp_dir.path().join("absent.zip"), &temp_dir.path().join("out"));
        assert!(matches!(result, Err(AddonError::Extract(_))));
    }

    #[test]
    fn test_extract_rejects_escaping_entries() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evil.zip");
        build_zip(&archive, &[("../escape.txt", "nope")]);

        let result = extract_archive(&archive, &temp_dir.path().join("out"));

        assert!(matches!(result, Err(AddonError::Extract(_))));
        assert!(!temp_dir.path().join("escape.txt").exists());
    }
}
