//! Core domain types for tdocgraph query execution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one query execution (time-sortable).
///
/// Stamped into the staging ledger and the exported result file so a staged
/// corpus can be traced back to the query run that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Index hit records
// ---------------------------------------------------------------------------

/// One hit from the Document full-text index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectHit {
    /// Matched document identity.
    pub doc_id: String,
    /// Raw full-text relevance score.
    pub score: f64,
    /// Meeting identifier of the document, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
}

/// One backward traversal of an APPEARS_IN edge from an Agenda index hit.
///
/// A document linked to multiple matching agendas yields one record per
/// traversal; each contributes separately to the combined score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaTraversal {
    /// Document reached through the edge.
    pub doc_id: String,
    /// Raw agenda hit score, unweighted.
    pub score: f64,
}

/// One backward traversal of a MENTIONS edge from a TechnologyEntity index hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTraversal {
    /// Document reached through the edge.
    pub doc_id: String,
    /// Raw entity hit score, unweighted.
    pub score: f64,
}

// ---------------------------------------------------------------------------
// DocumentMeta
// ---------------------------------------------------------------------------

/// Hydrated Document attributes for a ranking candidate.
///
/// Every attribute except `doc_id` is optional in the store; absent values
/// decode to `None` at the adapter boundary and never panic downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Unique document identity.
    pub doc_id: String,
    /// Document title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Source archive URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Meeting identifier (e.g., `RAN1-118`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    /// Release label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// Document status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// RankedDocument
// ---------------------------------------------------------------------------

/// One row of the ranked result set.
///
/// Both the pre-boost and post-boost scores are retained for
/// observability/debugging; ordering uses `boosted_score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedDocument {
    /// Unique document identity.
    pub doc_id: String,
    /// Document title (empty string when the store has none).
    pub title: String,
    /// Source archive URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Meeting identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    /// Release label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// Channel-combined score before title boosting.
    pub total_score: f64,
    /// Final ordering score after title boosting.
    pub boosted_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn document_meta_optional_fields_default() {
        let json = r#"{"doc_id": "R1-2500001"}"#;
        let meta: DocumentMeta = serde_json::from_str(json).expect("deserialize");
        assert_eq!(meta.doc_id, "R1-2500001");
        assert!(meta.title.is_none());
        assert!(meta.meeting_id.is_none());
        assert!(meta.source_path.is_none());
    }

    #[test]
    fn ranked_document_serialization() {
        let row = RankedDocument {
            doc_id: "R1-2500001".into(),
            title: "Feature Lead Summary on AI/ML for CSI".into(),
            source_path: Some("https://example.org/tdocs/R1-2500001.zip".into()),
            meeting_id: Some("RAN1-118".into()),
            release: Some("Rel-19".into()),
            total_score: 4.2,
            boosted_score: 8.4,
        };

        let json = serde_json::to_string(&row).expect("serialize");
        let parsed: RankedDocument = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.doc_id, "R1-2500001");
        assert_eq!(parsed.boosted_score, 8.4);
    }
}
