//! Document sanitization: the security gate between downloaded archives and
//! the staged corpus.
//!
//! Word documents in standardization archives come in three shapes:
//!
//! - modern OOXML (`.docx`/`.dotx`) — staged after a scan for stray VBA parts
//! - macro-enabled OOXML (`.docm`/`.dotm`) — an OPC zip whose VBA project is
//!   removed and whose content types are rewritten, then re-saved as the
//!   macro-free equivalent
//! - legacy OLE binaries (`.doc`/`.dot`) — no in-process re-encode to OOXML
//!   exists, so these are inspected for VBA storages and dropped
//!
//! Every other file type is staged unmodified. Failures are per-file and
//! never abort the surrounding batch.

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use tdocgraph_shared::{Result, TdocGraphError};

/// Main-part content type of a macro-enabled document and its safe equivalent.
const DOCM_MAIN_TYPE: &str = "application/vnd.ms-word.document.macroEnabled.main+xml";
const DOCX_MAIN_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";

/// Main-part content type of a macro-enabled template and its safe equivalent.
const DOTM_MAIN_TYPE: &str = "application/vnd.ms-word.template.macroEnabledTemplate.main+xml";
const DOTX_MAIN_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml";

/// VBA storage names found in legacy OLE Word binaries.
const OLE_MACRO_STORAGES: [&str; 3] = ["MACROS", "_VBA_PROJECT_CUR", "VBA"];

/// Outcome of sanitizing one archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sanitized {
    /// The member was staged at this path (possibly converted and renamed).
    Staged(PathBuf),
    /// The member was withheld from staging.
    Dropped {
        /// Per-file reason, recorded in the fetch outcome log.
        reason: String,
    },
}

/// Sanitize one archive member and stage the result under `dest_dir`.
///
/// `name` is the member's archive-relative path; parent directories are
/// created as needed.
pub fn sanitize_member(name: &str, bytes: &[u8], dest_dir: &Path) -> Result<Sanitized> {
    match extension_of(name).as_deref() {
        Some("docm") | Some("dotm") => {
            let stripped = strip_ooxml_macros(bytes)?;
            let renamed = macro_free_name(name);
            info!(member = name, staged = %renamed.display(), "macro-enabled document stripped");
            Ok(Sanitized::Staged(write_member(&renamed, &stripped, dest_dir)?))
        }
        Some("docx") | Some("dotx") => {
            if has_vba_part(bytes)? {
                // Malformed but real: a "safe" extension carrying a VBA project.
                warn!(member = name, "VBA part found in nominally macro-free document");
                let stripped = strip_ooxml_macros(bytes)?;
                Ok(Sanitized::Staged(write_member(
                    Path::new(name),
                    &stripped,
                    dest_dir,
                )?))
            } else {
                Ok(Sanitized::Staged(write_member(
                    Path::new(name),
                    bytes,
                    dest_dir,
                )?))
            }
        }
        Some("doc") | Some("dot") => {
            let reason = legacy_verdict(bytes);
            debug!(member = name, %reason, "legacy binary document dropped");
            Ok(Sanitized::Dropped { reason })
        }
        _ => Ok(Sanitized::Staged(write_member(
            Path::new(name),
            bytes,
            dest_dir,
        )?)),
    }
}

/// Lowercased extension of an archive member path.
fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// The staged name for a stripped macro-enabled member.
fn macro_free_name(name: &str) -> PathBuf {
    let path = PathBuf::from(name);
    match extension_of(name).as_deref() {
        Some("docm") => path.with_extension("docx"),
        Some("dotm") => path.with_extension("dotx"),
        _ => path,
    }
}

/// Write member bytes under `dest_dir`, creating parent directories.
fn write_member(rel_path: &Path, bytes: &[u8], dest_dir: &Path) -> Result<PathBuf> {
    let dest = dest_dir.join(rel_path);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TdocGraphError::io(parent, e))?;
    }
    std::fs::write(&dest, bytes).map_err(|e| TdocGraphError::io(&dest, e))?;
    Ok(dest)
}

// ---------------------------------------------------------------------------
// OOXML macro stripping
// ---------------------------------------------------------------------------

/// True when the OPC package contains a VBA part.
fn has_vba_part(bytes: &[u8]) -> Result<bool> {
    let mut archive = open_package(bytes)?;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| TdocGraphError::Sanitize(format!("package entry {i}: {e}")))?;
        if is_vba_part(entry.name()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Rebuild an OPC package without its VBA parts.
///
/// Drops `vbaProject.bin`/`vbaData.xml` (and their `.rels`), removes every
/// content-type and relationship entry that references them, and rewrites the
/// macro-enabled main-part content type to the macro-free equivalent.
fn strip_ooxml_macros(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut archive = open_package(bytes)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| TdocGraphError::Sanitize(format!("package entry {i}: {e}")))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        if is_vba_part(&name) {
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| TdocGraphError::Sanitize(format!("read {name}: {e}")))?;

        let data = if name == "[Content_Types].xml" {
            rewrite_content_types(&data)
        } else if name.ends_with(".rels") {
            drop_tags_mentioning(&String::from_utf8_lossy(&data), "vba").into_bytes()
        } else {
            data
        };

        writer
            .start_file(&*name, SimpleFileOptions::default())
            .map_err(|e| TdocGraphError::Sanitize(format!("write {name}: {e}")))?;
        writer
            .write_all(&data)
            .map_err(|e| TdocGraphError::Sanitize(format!("write {name}: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| TdocGraphError::Sanitize(format!("finalize package: {e}")))?;
    Ok(cursor.into_inner())
}

fn open_package(bytes: &[u8]) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
    ZipArchive::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| TdocGraphError::Sanitize(format!("not an OPC package: {e}")))
}

/// True for package parts belonging to the VBA project.
fn is_vba_part(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("vbaproject") || lower.contains("vbadata")
}

fn rewrite_content_types(data: &[u8]) -> Vec<u8> {
    let xml = String::from_utf8_lossy(data)
        .replace(DOCM_MAIN_TYPE, DOCX_MAIN_TYPE)
        .replace(DOTM_MAIN_TYPE, DOTX_MAIN_TYPE);
    drop_tags_mentioning(&xml, "vba").into_bytes()
}

/// Remove every XML tag whose text mentions `needle` (case-insensitive).
///
/// The targets here (`<Default .../>`, `<Override .../>`,
/// `<Relationship .../>`) are all self-closing, so dropping the tag span
/// removes the whole element.
fn drop_tags_mentioning(xml: &str, needle: &str) -> String {
    let needle = needle.to_ascii_lowercase();
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let tag = &rest[start..start + len + 1];
        if !tag.to_ascii_lowercase().contains(&needle) {
            out.push_str(tag);
        }
        rest = &rest[start + len + 1..];
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Legacy OLE inspection
// ---------------------------------------------------------------------------

/// Why a legacy binary document was dropped, with its macro verdict.
fn legacy_verdict(bytes: &[u8]) -> String {
    match cfb::CompoundFile::open(Cursor::new(bytes.to_vec())) {
        Ok(comp) => {
            let has_macros = comp
                .read_storage("/")
                .map(|mut entries| {
                    entries.any(|e| {
                        OLE_MACRO_STORAGES.contains(&e.name().to_ascii_uppercase().as_str())
                    })
                })
                .unwrap_or(false);

            if has_macros {
                "legacy binary document with a VBA macro storage; no safe conversion available"
                    .to_string()
            } else {
                "legacy binary document; no safe conversion available".to_string()
            }
        }
        Err(e) => format!("not a valid compound file: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal OPC package from (name, content) parts.
    fn build_package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn macro_enabled_docm() -> Vec<u8> {
        build_package(&[
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/><Override PartName="/word/document.xml" ContentType="application/vnd.ms-word.document.macroEnabled.main+xml"/><Override PartName="/word/vbaData.xml" ContentType="application/vnd.ms-word.vbaData+xml"/></Types>"#,
            ),
            (
                "word/_rels/document.xml.rels",
                r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProject" Target="vbaProject.bin"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
            ),
            ("word/document.xml", "<w:document>body</w:document>"),
            ("word/styles.xml", "<w:styles/>"),
            ("word/vbaProject.bin", "MACRO-BYTES"),
            ("word/vbaData.xml", "<wne:vbaSuppData/>"),
        ])
    }

    fn read_package(bytes: &[u8]) -> Vec<(String, String)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut parts = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let name = entry.name().to_string();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            parts.push((name, content));
        }
        parts
    }

    #[test]
    fn docm_is_stripped_and_staged_as_docx() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = macro_enabled_docm();

        let result = sanitize_member("summary.docm", &bytes, dir.path()).unwrap();
        let Sanitized::Staged(path) = result else {
            panic!("expected staged output");
        };
        assert_eq!(path.file_name().unwrap(), "summary.docx");

        let staged = std::fs::read(&path).unwrap();
        let parts = read_package(&staged);
        let names: Vec<&str> = parts.iter().map(|(n, _)| n.as_str()).collect();

        assert!(names.contains(&"word/document.xml"));
        assert!(names.contains(&"word/styles.xml"));
        assert!(!names.iter().any(|n| is_vba_part(n)));

        let content_types = &parts
            .iter()
            .find(|(n, _)| n == "[Content_Types].xml")
            .unwrap()
            .1;
        assert!(content_types.contains(DOCX_MAIN_TYPE));
        assert!(!content_types.contains("macroEnabled"));
        assert!(!content_types.to_ascii_lowercase().contains("vba"));

        let rels = &parts
            .iter()
            .find(|(n, _)| n == "word/_rels/document.xml.rels")
            .unwrap()
            .1;
        assert!(!rels.to_ascii_lowercase().contains("vba"));
        assert!(rels.contains("styles.xml"));
    }

    #[test]
    fn clean_docx_is_staged_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_package(&[
            (
                "[Content_Types].xml",
                r#"<Types><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
            ),
            ("word/document.xml", "<w:document>body</w:document>"),
        ]);

        let result = sanitize_member("contrib.docx", &bytes, dir.path()).unwrap();
        let Sanitized::Staged(path) = result else {
            panic!("expected staged output");
        };
        assert_eq!(path.file_name().unwrap(), "contrib.docx");
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn docx_with_stray_vba_part_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_package(&[
            (
                "[Content_Types].xml",
                r#"<Types><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
            ),
            ("word/document.xml", "<w:document>body</w:document>"),
            ("word/vbaProject.bin", "MACRO-BYTES"),
        ]);

        let result = sanitize_member("odd.docx", &bytes, dir.path()).unwrap();
        let Sanitized::Staged(path) = result else {
            panic!("expected staged output");
        };
        let parts = read_package(&std::fs::read(&path).unwrap());
        assert!(!parts.iter().any(|(n, _)| is_vba_part(n)));
    }

    #[test]
    fn legacy_doc_with_macro_storage_is_dropped() {
        let dir = tempfile::tempdir().unwrap();

        let mut comp = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        comp.create_storage("/Macros").unwrap();
        comp.create_stream("/WordDocument")
            .unwrap()
            .write_all(b"legacy")
            .unwrap();
        let bytes = comp.into_inner().into_inner();

        let result = sanitize_member("old.doc", &bytes, dir.path()).unwrap();
        let Sanitized::Dropped { reason } = result else {
            panic!("expected dropped outcome");
        };
        assert!(reason.contains("VBA macro storage"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_legacy_doc_is_dropped_with_reason() {
        let dir = tempfile::tempdir().unwrap();

        let result = sanitize_member("junk.doc", b"not an OLE container", dir.path()).unwrap();
        let Sanitized::Dropped { reason } = result else {
            panic!("expected dropped outcome");
        };
        assert!(reason.contains("not a valid compound file"));
    }

    #[test]
    fn plain_member_is_staged_untouched() {
        let dir = tempfile::tempdir().unwrap();

        let result = sanitize_member("notes/readme.txt", b"hello", dir.path()).unwrap();
        let Sanitized::Staged(path) = result else {
            panic!("expected staged output");
        };
        assert!(path.ends_with("notes/readme.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn tag_dropper_removes_only_matching_tags() {
        let xml = r#"<Types><Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/><Default Extension="xml" ContentType="application/xml"/></Types>"#;
        let out = drop_tags_mentioning(xml, "vba");
        assert!(!out.contains("vbaProject"));
        assert!(out.contains(r#"<Default Extension="xml""#));
        assert!(out.starts_with("<Types>"));
        assert!(out.ends_with("</Types>"));
    }
}
