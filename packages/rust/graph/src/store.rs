//! Graph store adapter.
//!
//! Thin typed wrapper over a Bolt connection to the property graph. All
//! queries are read-only; the graph is populated and indexed by the external
//! ingestion pipeline. Row shapes are validated here at the boundary —
//! optional node properties decode to `None`, a row without a doc_id is a
//! query failure.

use std::collections::HashMap;

use neo4rs::{Graph, query};
use tracing::{debug, instrument};

use tdocgraph_shared::{
    AgendaTraversal, DirectHit, DocumentMeta, EntityTraversal, Result, TdocGraphError,
};

/// Full-text index over Document title/summary/keywords.
pub const DOC_INDEX: &str = "docIndex";

/// Full-text index over Agenda topics/descriptions.
pub const AGENDA_INDEX: &str = "agendaIndex";

/// Full-text index over TechnologyEntity names/aliases.
pub const TECH_ENTITY_INDEX: &str = "techEntityIndex";

/// Connection settings for the graph store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    pub uri: String,
    /// Store user.
    pub user: String,
    /// Store password (already resolved from the environment).
    pub password: String,
}

/// Read-only handle to the populated property graph.
///
/// Constructed per request context; the caller owns the lifecycle.
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Connect to the graph store.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| TdocGraphError::Graph(format!("connect {}: {e}", config.uri)))?;

        debug!(uri = %config.uri, "connected to graph store");
        Ok(Self { graph })
    }

    /// Full-text lookup on the Document index.
    #[instrument(skip(self))]
    pub async fn direct_hits(&self, query_text: &str) -> Result<Vec<DirectHit>> {
        let cypher = format!(
            "CALL db.index.fulltext.queryNodes(\"{DOC_INDEX}\", $query)
             YIELD node, score
             RETURN node.doc_id AS doc_id, score, node.meeting_id AS meeting_id"
        );

        let mut stream = self
            .graph
            .execute(query(&cypher).param("query", query_text))
            .await
            .map_err(|e| TdocGraphError::Graph(format!("document index lookup: {e}")))?;

        let mut hits = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| TdocGraphError::Graph(format!("document index row: {e}")))?
        {
            let doc_id: String = row.get("doc_id").map_err(|e| {
                TdocGraphError::validation(format!("document hit without doc_id: {e}"))
            })?;
            let score: f64 = row.get("score").unwrap_or(0.0);
            let meeting_id: Option<String> = row.get("meeting_id").unwrap_or(None);

            hits.push(DirectHit {
                doc_id,
                score,
                meeting_id,
            });
        }

        debug!(count = hits.len(), "document index hits");
        Ok(hits)
    }

    /// Full-text lookup on the Agenda index, traversing APPEARS_IN backward.
    ///
    /// Returns one record per (agenda hit, edge) pair; a document on several
    /// matching agendas appears once per traversal.
    #[instrument(skip(self))]
    pub async fn agenda_traversals(&self, query_text: &str) -> Result<Vec<AgendaTraversal>> {
        let cypher = format!(
            "CALL db.index.fulltext.queryNodes(\"{AGENDA_INDEX}\", $query)
             YIELD node, score
             MATCH (node)<-[:APPEARS_IN]-(d:Document)
             RETURN d.doc_id AS doc_id, score"
        );

        let mut stream = self
            .graph
            .execute(query(&cypher).param("query", query_text))
            .await
            .map_err(|e| TdocGraphError::Graph(format!("agenda index lookup: {e}")))?;

        let mut traversals = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| TdocGraphError::Graph(format!("agenda index row: {e}")))?
        {
            let doc_id: String = row.get("doc_id").map_err(|e| {
                TdocGraphError::validation(format!("agenda traversal without doc_id: {e}"))
            })?;
            let score: f64 = row.get("score").unwrap_or(0.0);

            traversals.push(AgendaTraversal { doc_id, score });
        }

        debug!(count = traversals.len(), "agenda edge traversals");
        Ok(traversals)
    }

    /// Full-text lookup on the TechnologyEntity index, traversing MENTIONS
    /// backward. One record per (entity hit, edge) pair.
    #[instrument(skip(self))]
    pub async fn entity_traversals(&self, query_text: &str) -> Result<Vec<EntityTraversal>> {
        let cypher = format!(
            "CALL db.index.fulltext.queryNodes(\"{TECH_ENTITY_INDEX}\", $query)
             YIELD node, score
             MATCH (d:Document)-[:MENTIONS]->(node)
             RETURN d.doc_id AS doc_id, score"
        );

        let mut stream = self
            .graph
            .execute(query(&cypher).param("query", query_text))
            .await
            .map_err(|e| TdocGraphError::Graph(format!("entity index lookup: {e}")))?;

        let mut traversals = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| TdocGraphError::Graph(format!("entity index row: {e}")))?
        {
            let doc_id: String = row.get("doc_id").map_err(|e| {
                TdocGraphError::validation(format!("entity traversal without doc_id: {e}"))
            })?;
            let score: f64 = row.get("score").unwrap_or(0.0);

            traversals.push(EntityTraversal { doc_id, score });
        }

        debug!(count = traversals.len(), "entity edge traversals");
        Ok(traversals)
    }

    /// Hydrate Document attributes for a candidate id set in one query.
    #[instrument(skip_all, fields(candidates = ids.len()))]
    pub async fn fetch_documents(&self, ids: &[String]) -> Result<HashMap<String, DocumentMeta>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let cypher = "MATCH (d:Document)
             WHERE d.doc_id IN $ids
             RETURN d.doc_id AS doc_id, d.title AS title, d.source_path AS source_path,
                    d.meeting_id AS meeting_id, d.release AS release, d.status AS status";

        let mut stream = self
            .graph
            .execute(query(cypher).param("ids", ids.to_vec()))
            .await
            .map_err(|e| TdocGraphError::Graph(format!("document hydration: {e}")))?;

        let mut metas = HashMap::with_capacity(ids.len());
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| TdocGraphError::Graph(format!("document hydration row: {e}")))?
        {
            let doc_id: String = row.get("doc_id").map_err(|e| {
                TdocGraphError::validation(format!("document row without doc_id: {e}"))
            })?;

            let meta = DocumentMeta {
                doc_id: doc_id.clone(),
                title: row.get("title").unwrap_or(None),
                source_path: row.get("source_path").unwrap_or(None),
                meeting_id: row.get("meeting_id").unwrap_or(None),
                release: row.get("release").unwrap_or(None),
                status: row.get("status").unwrap_or(None),
            };
            metas.insert(doc_id, meta);
        }

        debug!(hydrated = metas.len(), "document attributes hydrated");
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_match_store_schema() {
        // The three indexes are created by the external loading pipeline
        // under these exact names; the adapter must not drift from them.
        assert_eq!(DOC_INDEX, "docIndex");
        assert_eq!(AGENDA_INDEX, "agendaIndex");
        assert_eq!(TECH_ENTITY_INDEX, "techEntityIndex");
    }
}
