//! End-to-end `search` pipeline: query → rank → export → fetch → generate.
//!
//! The stages run strictly in order. The fetch pool fully drains before the
//! readiness gate is consulted, and generation is attempted at most once.
//! Failures follow the recovery rules of the error taxonomy: a graph query
//! failure aborts the request, an empty ranked list is a normal terminal
//! outcome, per-document fetch failures are aggregated into the report, and
//! readiness/generation failures degrade the answer without touching the
//! ranked list or the staged corpus.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument, warn};

use tdocgraph_generate::GenerationClient;
use tdocgraph_graph::{GraphStore, RelevanceQuery, StoreConfig};
use tdocgraph_retrieval::{FetchConfig, FetchReport, Fetcher};
use tdocgraph_shared::{
    AppConfig, RankedDocument, Result, RunId, TdocGraphError, resolve_graph_password,
    resolve_staging_dir,
};

use crate::export;

/// Default export location when the caller does not choose one.
const DEFAULT_EXPORT_FILE: &str = "search_results.csv";

/// Name of the staged-corpus ledger file, written once per run.
const LEDGER_FILE: &str = "ledger.json";

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything one search run needs: store connection, HTTP clients, staging
/// path, and configuration.
///
/// Created at request start by the caller and dropped at request end — there
/// is no process-wide session state.
pub struct SearchContext {
    /// Resolved application configuration.
    pub config: AppConfig,
    /// Read-only graph store handle.
    pub store: GraphStore,
    /// Bounded-concurrency document fetcher.
    pub fetcher: Fetcher,
    /// Generation backend client.
    pub generator: GenerationClient,
    /// Resolved staging directory.
    pub staging_dir: PathBuf,
}

impl SearchContext {
    /// Build a context from configuration, connecting to the graph store.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let password = resolve_graph_password(&config.graph)?;
        let store = GraphStore::connect(&StoreConfig {
            uri: config.graph.uri.clone(),
            user: config.graph.user.clone(),
            password,
        })
        .await?;

        let fetcher = Fetcher::new(FetchConfig {
            concurrency: config.retrieval.concurrency,
            download_timeout: config.retrieval.download_timeout(),
        })?;

        let generator = GenerationClient::new(config.generation.clone())?;
        let staging_dir = resolve_staging_dir(&config.retrieval)?;

        Ok(Self {
            config,
            store,
            fetcher,
            generator,
            staging_dir,
        })
    }
}

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Raw meeting filter input; blank/whitespace means no filter.
    pub meeting: Option<String>,
    /// Result cap override (defaults to `ranking.result_cap`).
    pub limit: Option<usize>,
    /// Whether to run the readiness gate + generation step.
    pub generate: bool,
    /// Result export location override.
    pub export_path: Option<PathBuf>,
}

/// The generation step's terminal state.
#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    /// The backend produced an answer payload.
    Generated(serde_json::Value),
    /// The backend never became ready within the wait ceiling.
    NotReady(String),
    /// The generation request itself failed.
    Failed(String),
    /// Generation was not attempted (no results, or disabled by the caller).
    Skipped,
}

/// Result of one full pipeline run.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Identifier of this query execution.
    pub run_id: RunId,
    /// Ranked result set (empty = no matches).
    pub ranked: Vec<RankedDocument>,
    /// Fetch batch report, when the fetch phase ran.
    pub fetch: Option<FetchReport>,
    /// Generation outcome.
    pub answer: AnswerOutcome,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl SearchOutcome {
    /// True when no index produced a match — a terminal state, not an error.
    pub fn is_no_results(&self) -> bool {
        self.ranked.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &SearchOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &SearchOutcome) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full search pipeline.
#[instrument(skip_all, fields(query = %request.query))]
pub async fn run_search(
    ctx: &SearchContext,
    request: &SearchRequest,
    progress: &dyn ProgressReporter,
) -> Result<SearchOutcome> {
    let start = Instant::now();
    let run_id = RunId::new();

    info!(%run_id, meeting = ?request.meeting, "starting search pipeline");

    // --- Phase 1: rank ---
    progress.phase("Querying graph store");
    let relevance = RelevanceQuery {
        text: request.query.clone(),
        meeting: normalize_meeting_filter(request.meeting.as_deref()),
        cap: request.limit.unwrap_or(ctx.config.ranking.result_cap),
    };
    let ranked = tdocgraph_graph::search(&ctx.store, &relevance).await?;

    if ranked.is_empty() {
        info!(%run_id, "no matching documents");
        let outcome = SearchOutcome {
            run_id,
            ranked,
            fetch: None,
            answer: AnswerOutcome::Skipped,
            elapsed: start.elapsed(),
        };
        progress.done(&outcome);
        return Ok(outcome);
    }

    // --- Phase 2: export (non-fatal) ---
    progress.phase("Exporting ranked results");
    let export_path = request
        .export_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
    if let Err(e) = export::write_csv(&export_path, &ranked) {
        warn!(error = %e, "result export failed");
    }

    // --- Phase 3: fetch pool (drains fully before generation) ---
    progress.phase("Fetching ranked documents");
    let fetch = match ctx.fetcher.fetch_all(&ranked, &ctx.staging_dir).await {
        Ok(report) => {
            if let Err(e) = write_ledger(ctx, &run_id, &request.query, &report) {
                warn!(error = %e, "staging ledger write failed");
            }
            Some(report)
        }
        Err(e) => {
            // Staging could not even be prepared; the ranked list is still
            // valid, but there is no corpus to generate over.
            warn!(error = %e, "fetch phase failed");
            let outcome = SearchOutcome {
                run_id,
                ranked,
                fetch: None,
                answer: AnswerOutcome::Failed(format!("document staging failed: {e}")),
                elapsed: start.elapsed(),
            };
            progress.done(&outcome);
            return Ok(outcome);
        }
    };

    // --- Phase 4: readiness gate + one generation call ---
    let answer = if !request.generate {
        AnswerOutcome::Skipped
    } else {
        progress.phase("Waiting for generation backend");
        match ctx.generator.await_ready().await {
            Err(e @ TdocGraphError::ServiceNotReady { .. }) => {
                AnswerOutcome::NotReady(e.to_string())
            }
            Err(e) => AnswerOutcome::Failed(e.to_string()),
            Ok(()) => {
                progress.phase("Generating answer");
                match ctx.generator.generate(&request.query).await {
                    Ok(payload) => AnswerOutcome::Generated(payload),
                    Err(e) => AnswerOutcome::Failed(format!("failed to generate response: {e}")),
                }
            }
        }
    };

    let outcome = SearchOutcome {
        run_id,
        ranked,
        fetch,
        answer,
        elapsed: start.elapsed(),
    };

    info!(
        run_id = %outcome.run_id,
        ranked = outcome.ranked.len(),
        staged = outcome.fetch.as_ref().map(|f| f.succeeded).unwrap_or(0),
        elapsed_ms = outcome.elapsed.as_millis(),
        "search pipeline complete"
    );

    progress.done(&outcome);
    Ok(outcome)
}

/// Normalize raw meeting filter input: blank or whitespace-only means none.
pub fn normalize_meeting_filter(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
}

// ---------------------------------------------------------------------------
// Staging ledger
// ---------------------------------------------------------------------------

/// Ledger of what one run staged, written once after the pool drains.
#[derive(Serialize)]
struct StagingLedger<'a> {
    run_id: String,
    query: &'a str,
    created_at: String,
    documents: &'a [tdocgraph_retrieval::FetchOutcome],
}

/// Write the staged-corpus ledger.
///
/// The orchestrator is the only writer; workers report outcomes instead of
/// touching shared files.
fn write_ledger(
    ctx: &SearchContext,
    run_id: &RunId,
    query: &str,
    report: &FetchReport,
) -> Result<()> {
    let ledger = StagingLedger {
        run_id: run_id.to_string(),
        query,
        created_at: chrono::Utc::now().to_rfc3339(),
        documents: &report.outcomes,
    };

    let path = ctx.staging_dir.join(LEDGER_FILE);
    let content = serde_json::to_string_pretty(&ledger)
        .map_err(|e| TdocGraphError::validation(format!("ledger serialization: {e}")))?;
    std::fs::write(&path, content).map_err(|e| TdocGraphError::io(&path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_meeting_filter_normalizes_to_none() {
        assert_eq!(normalize_meeting_filter(None), None);
        assert_eq!(normalize_meeting_filter(Some("")), None);
        assert_eq!(normalize_meeting_filter(Some("   ")), None);
        assert_eq!(
            normalize_meeting_filter(Some(" RAN1-118 ")),
            Some("RAN1-118".to_string())
        );
    }

    #[test]
    fn no_results_outcome_is_distinguished() {
        let outcome = SearchOutcome {
            run_id: RunId::new(),
            ranked: Vec::new(),
            fetch: None,
            answer: AnswerOutcome::Skipped,
            elapsed: Duration::from_millis(5),
        };
        assert!(outcome.is_no_results());
    }
}
