//! Archive unpacking into the staging area.
//!
//! Every member passes three gates before it reaches the staging directory:
//! platform-metadata exclusion, a path-traversal check, and the document
//! sanitizer. A member that fails a gate is skipped; the archive as a whole
//! only fails when it cannot be parsed at all.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zip::ZipArchive;

use tdocgraph_sanitize::Sanitized;
use tdocgraph_shared::{Result, TdocGraphError};

/// Reserved metadata directory prefix (macOS resource forks).
const METADATA_DIR_PREFIX: &str = "__MACOSX/";

/// Reserved metadata filename (Finder droppings).
const METADATA_FILE_NAME: &str = ".DS_Store";

/// One file staged from an archive.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StagedFile {
    /// Absolute staged location.
    pub path: PathBuf,
    /// Size of the staged content in bytes.
    pub size_bytes: u64,
    /// SHA-256 of the staged content (post-sanitization).
    pub sha256: String,
}

/// Unpack `bytes` as a zip archive into `doc_dir`, sanitizing each member.
///
/// Returns the files that actually reached the staging area; members dropped
/// by the sanitizer or the exclusion gates are logged and omitted.
pub fn stage_archive(bytes: &[u8], doc_dir: &Path) -> Result<Vec<StagedFile>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| TdocGraphError::Archive(format!("unreadable archive: {e}")))?;

    let mut staged = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| TdocGraphError::Archive(format!("entry {i}: {e}")))?;
        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        if is_metadata_member(&raw_name) {
            debug!(member = %raw_name, "platform metadata member excluded");
            continue;
        }

        let Some(rel_path) = entry.enclosed_name() else {
            warn!(member = %raw_name, "path-traversal entry excluded");
            continue;
        };

        let mut data = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut data) {
            warn!(member = %raw_name, error = %e, "member unreadable, skipping");
            continue;
        }

        match tdocgraph_sanitize::sanitize_member(&rel_path.to_string_lossy(), &data, doc_dir) {
            Ok(Sanitized::Staged(path)) => match describe_staged(&path) {
                Ok(file) => staged.push(file),
                Err(e) => warn!(member = %raw_name, error = %e, "staged file unreadable"),
            },
            Ok(Sanitized::Dropped { reason }) => {
                warn!(member = %raw_name, %reason, "member withheld from staging");
            }
            Err(e) => {
                warn!(member = %raw_name, error = %e, "sanitization failed, member dropped");
            }
        }
    }

    Ok(staged)
}

/// True for archive members that are platform metadata, never corpus content.
fn is_metadata_member(name: &str) -> bool {
    name.starts_with(METADATA_DIR_PREFIX)
        || Path::new(name)
            .file_name()
            .is_some_and(|f| f == METADATA_FILE_NAME)
}

/// Hash and measure a file that was just staged.
fn describe_staged(path: &Path) -> Result<StagedFile> {
    let content = std::fs::read(path).map_err(|e| TdocGraphError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);

    Ok(StagedFile {
        path: path.to_path_buf(),
        size_bytes: content.len() as u64,
        sha256: format!("{:x}", hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use zip::write::{SimpleFileOptions, ZipWriter};

    fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn metadata_members_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("__MACOSX/._summary.txt", b"resource fork"),
            ("notes/.DS_Store", b"finder"),
            ("summary.txt", b"real content"),
        ]);

        let staged = stage_archive(&bytes, dir.path()).unwrap();
        assert_eq!(staged.len(), 1);
        assert!(staged[0].path.ends_with("summary.txt"));
        assert_eq!(staged[0].size_bytes, 12);
    }

    #[test]
    fn path_traversal_entries_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let doc_dir = dir.path().join("doc");
        let bytes = build_zip(&[("../evil.txt", b"escape"), ("ok.txt", b"fine")]);

        let staged = stage_archive(&bytes, &doc_dir).unwrap();
        assert_eq!(staged.len(), 1);
        assert!(staged[0].path.ends_with("ok.txt"));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn nested_member_paths_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("annex/tables.txt", b"t")]);

        let staged = stage_archive(&bytes, dir.path()).unwrap();
        assert_eq!(staged.len(), 1);
        assert!(dir.path().join("annex/tables.txt").exists());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = stage_archive(b"definitely not a zip", dir.path()).unwrap_err();
        assert!(err.to_string().contains("archive"));
    }

    #[test]
    fn staged_file_hash_matches_content() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("hello.txt", b"hello world")]);

        let staged = stage_archive(&bytes, dir.path()).unwrap();
        assert_eq!(
            staged[0].sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
