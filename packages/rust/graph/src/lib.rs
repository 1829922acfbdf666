//! Graph relevance search: store adapter + multi-signal ranking.
//!
//! [`search`] is the query-time entry point: it runs the three full-text
//! index lookups concurrently, propagates scores across APPEARS_IN and
//! MENTIONS edges, combines them per document, and returns the capped,
//! deterministically ordered result set.

pub mod ranker;
pub mod store;

use tracing::{info, instrument};

use tdocgraph_shared::{RankedDocument, Result};

pub use ranker::{IndexHits, rank, title_multiplier};
pub use store::{GraphStore, StoreConfig};

/// One relevance query against the graph.
#[derive(Debug, Clone)]
pub struct RelevanceQuery {
    /// Free-text query string, passed verbatim to all three indexes.
    pub text: String,
    /// Optional meeting-id substring filter (already normalized — `None`
    /// means unfiltered).
    pub meeting: Option<String>,
    /// Maximum rows returned.
    pub cap: usize,
}

/// Execute a relevance query end to end.
///
/// An empty result is a normal terminal outcome, not an error; the caller
/// must treat it as "no matches".
#[instrument(skip_all, fields(query = %request.text, meeting = ?request.meeting))]
pub async fn search(store: &GraphStore, request: &RelevanceQuery) -> Result<Vec<RankedDocument>> {
    let (direct, agenda, entity) = tokio::try_join!(
        store.direct_hits(&request.text),
        store.agenda_traversals(&request.text),
        store.entity_traversals(&request.text),
    )?;

    let hits = IndexHits {
        direct,
        agenda,
        entity,
    };

    if hits.is_empty() {
        info!("no index hits on any channel");
        return Ok(Vec::new());
    }

    let metas = store.fetch_documents(&hits.candidate_ids()).await?;
    let ranked = ranker::rank(&hits, &metas, request.meeting.as_deref(), request.cap);

    info!(
        direct = hits.direct.len(),
        agenda = hits.agenda.len(),
        entity = hits.entity.len(),
        ranked = ranked.len(),
        "relevance query complete"
    );

    Ok(ranked)
}
