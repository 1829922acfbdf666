//! Tabular export of the ranked result set.
//!
//! One file is written per query execution for audit/debugging. Export
//! failures are reported to the caller but never fail the search itself.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use tdocgraph_shared::{RankedDocument, Result, TdocGraphError};

/// Fixed-shape export record: optional attributes become empty columns so
/// every row has the same width.
#[derive(Serialize)]
struct ExportRow<'a> {
    doc_id: &'a str,
    title: &'a str,
    source_path: &'a str,
    meeting_id: &'a str,
    release: &'a str,
    total_score: f64,
    boosted_score: f64,
}

impl<'a> From<&'a RankedDocument> for ExportRow<'a> {
    fn from(row: &'a RankedDocument) -> Self {
        Self {
            doc_id: &row.doc_id,
            title: &row.title,
            source_path: row.source_path.as_deref().unwrap_or(""),
            meeting_id: row.meeting_id.as_deref().unwrap_or(""),
            release: row.release.as_deref().unwrap_or(""),
            total_score: row.total_score,
            boosted_score: row.boosted_score,
        }
    }
}

/// Write the ranked rows as CSV at `path`.
pub fn write_csv(path: &Path, rows: &[RankedDocument]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| TdocGraphError::io(path, std::io::Error::other(e)))?;

    for row in rows {
        writer
            .serialize(ExportRow::from(row))
            .map_err(|e| TdocGraphError::io(path, std::io::Error::other(e)))?;
    }

    writer
        .flush()
        .map_err(|e| TdocGraphError::io(path, e))?;

    info!(path = %path.display(), rows = rows.len(), "result export written");
    Ok(())
}
