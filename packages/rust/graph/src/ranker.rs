//! Multi-signal score combination and ranking.
//!
//! Pure functions over the index hits returned by the store adapter — no I/O,
//! so the full scoring semantics are unit-testable without a graph store.
//!
//! Scores flow through three channels: direct full-text hits on documents,
//! agenda hits propagated backward over APPEARS_IN edges, and technology
//! entity hits propagated backward over MENTIONS edges. Channel contributions
//! are weighted by how indirect the evidence is, summed per document, then
//! boosted for feature-lead titles.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use tdocgraph_shared::{AgendaTraversal, DirectHit, DocumentMeta, EntityTraversal, RankedDocument};

/// Agenda contribution weight when the document also matched directly —
/// agenda and document agree, so the signal is reinforced.
pub const AGENDA_REINFORCED_WEIGHT: f64 = 2.3;

/// Agenda contribution weight for documents reached only through the agenda.
pub const AGENDA_INDIRECT_WEIGHT: f64 = 0.8;

/// Entity-mention contribution weight.
pub const ENTITY_WEIGHT: f64 = 0.7;

/// Title boost for feature lead summaries.
pub const FEATURE_LEAD_SUMMARY_BOOST: f64 = 2.0;

/// Title boost for other feature lead documents.
pub const FEATURE_LEAD_BOOST: f64 = 1.5;

/// Raw index hits for one query, as returned by the store adapter.
#[derive(Debug, Clone, Default)]
pub struct IndexHits {
    /// Hits on the Document index.
    pub direct: Vec<DirectHit>,
    /// APPEARS_IN traversals from Agenda index hits (one per edge).
    pub agenda: Vec<AgendaTraversal>,
    /// MENTIONS traversals from TechnologyEntity index hits (one per edge).
    pub entity: Vec<EntityTraversal>,
}

impl IndexHits {
    /// True when no index produced a single hit.
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.agenda.is_empty() && self.entity.is_empty()
    }

    /// Every distinct doc_id reachable from any channel.
    pub fn candidate_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let all = self
            .direct
            .iter()
            .map(|h| h.doc_id.as_str())
            .chain(self.agenda.iter().map(|t| t.doc_id.as_str()))
            .chain(self.entity.iter().map(|t| t.doc_id.as_str()));
        for id in all {
            if seen.insert(id.to_string()) {
                ids.push(id.to_string());
            }
        }
        ids
    }
}

/// Rank candidate documents from raw index hits.
///
/// `metas` must contain the hydrated Document attributes for the candidate
/// set; candidates without a hydration row are dropped (an edge should never
/// point at a missing node, so this is logged).
///
/// The returned rows are unique per doc_id, ordered by boosted score
/// descending with ascending doc_id as the tie-break, and truncated to `cap`.
pub fn rank(
    hits: &IndexHits,
    metas: &HashMap<String, DocumentMeta>,
    meeting_filter: Option<&str>,
    cap: usize,
) -> Vec<RankedDocument> {
    // Channel 1: direct hits, filtered by meeting when a filter is given.
    let direct: Vec<&DirectHit> = hits
        .direct
        .iter()
        .filter(|h| meeting_matches(h.meeting_id.as_deref(), meeting_filter))
        .collect();

    let direct_ids: HashSet<&str> = direct.iter().map(|h| h.doc_id.as_str()).collect();

    // Combine all channel contributions per doc_id.
    let mut totals: HashMap<&str, f64> = HashMap::new();

    for hit in &direct {
        *totals.entry(hit.doc_id.as_str()).or_insert(0.0) += hit.score;
    }

    for traversal in &hits.agenda {
        let weight = if direct_ids.contains(traversal.doc_id.as_str()) {
            AGENDA_REINFORCED_WEIGHT
        } else {
            AGENDA_INDIRECT_WEIGHT
        };
        *totals.entry(traversal.doc_id.as_str()).or_insert(0.0) += traversal.score * weight;
    }

    for traversal in &hits.entity {
        *totals.entry(traversal.doc_id.as_str()).or_insert(0.0) +=
            traversal.score * ENTITY_WEIGHT;
    }

    // Hydrate, filter the merged set by meeting, and boost by title.
    let mut rows: Vec<RankedDocument> = Vec::with_capacity(totals.len());
    for (doc_id, total_score) in totals {
        let Some(meta) = metas.get(doc_id) else {
            warn!(doc_id, "candidate has no Document node, dropping");
            continue;
        };

        if !meeting_matches(meta.meeting_id.as_deref(), meeting_filter) {
            continue;
        }

        let title = meta.title.clone().unwrap_or_default();
        let boosted_score = total_score * title_multiplier(&title);

        rows.push(RankedDocument {
            doc_id: meta.doc_id.clone(),
            title,
            source_path: meta.source_path.clone(),
            meeting_id: meta.meeting_id.clone(),
            release: meta.release.clone(),
            total_score,
            boosted_score,
        });
    }

    // Fixed tie-break keeps the ranking deterministic for a fixed snapshot.
    rows.sort_by(|a, b| {
        b.boosted_score
            .total_cmp(&a.boosted_score)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    rows.truncate(cap);
    rows
}

/// Title-based boost multiplier.
///
/// Feature lead summaries aggregate an entire topic's discussion, so they
/// outrank individual contributions with the same combined score.
pub fn title_multiplier(title: &str) -> f64 {
    if title.contains("Feature Lead Summary") {
        FEATURE_LEAD_SUMMARY_BOOST
    } else if title.contains("Feature Lead") {
        FEATURE_LEAD_BOOST
    } else {
        1.0
    }
}

/// Case-sensitive substring containment check against an optional filter.
///
/// With no filter every document matches; with a filter, a document without
/// a meeting_id never matches.
fn meeting_matches(meeting_id: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(f) => meeting_id.is_some_and(|m| m.contains(f)),
    }
}
