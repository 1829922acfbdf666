//! Concurrent fetch-and-stage pipeline for ranked documents.
//!
//! Each ranked document's source archive is downloaded, unpacked, sanitized,
//! and staged under a per-document directory inside the shared staging area.
//! Work runs on a semaphore-bounded pool; every item resolves to a structured
//! [`FetchOutcome`] so one failure never aborts the batch, and the
//! orchestrator aggregates outcomes after the pool drains.

pub mod archive;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use url::Url;

use tdocgraph_shared::{RankedDocument, Result, TdocGraphError};

pub use archive::{StagedFile, stage_archive};

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("tdocgraph/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of fetching and staging one ranked document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FetchOutcome {
    /// Document identity.
    pub doc_id: String,
    /// Document title, for human-readable failure reports.
    pub title: String,
    /// Files that reached the staging area.
    pub staged: Vec<StagedFile>,
    /// Failure description when the item failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    fn failed(doc_id: &str, title: &str, error: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            staged: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// True when the item completed without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a completed fetch batch.
///
/// "Completed" means the pool drained — callers must check `failures` for
/// partial completion, not assume every item succeeded.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Number of documents attempted.
    pub attempted: usize,
    /// Number of documents fully staged.
    pub succeeded: usize,
    /// Total files staged across all documents.
    pub staged_files: usize,
    /// Per-item failures as (doc_id, error).
    pub failures: Vec<(String, String)>,
    /// Every per-item outcome, in completion-collection order.
    pub outcomes: Vec<FetchOutcome>,
    /// Wall-clock duration of the batch.
    pub duration: Duration,
}

impl FetchReport {
    fn from_outcomes(outcomes: Vec<FetchOutcome>, duration: Duration) -> Self {
        let attempted = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let staged_files = outcomes.iter().map(|o| o.staged.len()).sum();
        let failures = outcomes
            .iter()
            .filter_map(|o| {
                o.error
                    .as_ref()
                    .map(|e| (o.doc_id.clone(), e.clone()))
            })
            .collect();

        Self {
            attempted,
            succeeded,
            staged_files,
            failures,
            outcomes,
            duration,
        }
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Runtime configuration for the fetch pool.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Ceiling on concurrent downloads; the pool never exceeds the number of
    /// documents either.
    pub concurrency: usize,
    /// Per-download request timeout.
    pub download_timeout: Duration,
}

/// Bounded-concurrency document fetcher.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| TdocGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Fetch and stage every ranked document.
    ///
    /// The staging directory is reset before any item writes to it. Returns
    /// an error only when staging cannot be prepared; per-item failures are
    /// collected into the report.
    #[instrument(skip_all, fields(rows = rows.len(), staging = %staging_dir.display()))]
    pub async fn fetch_all(
        &self,
        rows: &[RankedDocument],
        staging_dir: &Path,
    ) -> Result<FetchReport> {
        let start = Instant::now();

        reset_staging(staging_dir)?;

        if rows.is_empty() {
            return Ok(FetchReport::from_outcomes(Vec::new(), start.elapsed()));
        }

        let pool_size = self.config.concurrency.min(rows.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(pool_size));

        info!(
            pool_size,
            timeout_secs = self.config.download_timeout.as_secs(),
            "starting fetch pool"
        );

        let mut handles = Vec::with_capacity(rows.len());
        for row in rows {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let timeout = self.config.download_timeout;
            let row = row.clone();
            let doc_dir = staging_dir.join(safe_component(&row.doc_id));

            handles.push((
                row.doc_id.clone(),
                row.title.clone(),
                tokio::spawn(async move {
                    let _permit = sem.acquire().await.expect("semaphore closed");
                    fetch_one(&client, timeout, &row, &doc_dir).await
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (doc_id, title, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    outcomes.push(FetchOutcome::failed(
                        &doc_id,
                        &title,
                        format!("fetch task failed: {e}"),
                    ));
                }
            }
        }

        let report = FetchReport::from_outcomes(outcomes, start.elapsed());
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            staged_files = report.staged_files,
            failures = report.failures.len(),
            duration_ms = report.duration.as_millis(),
            "fetch pool drained"
        );

        Ok(report)
    }
}

/// Download one document's archive and stage its members.
async fn fetch_one(
    client: &Client,
    timeout: Duration,
    row: &RankedDocument,
    doc_dir: &Path,
) -> FetchOutcome {
    let Some(source) = row.source_path.as_deref() else {
        return FetchOutcome::failed(&row.doc_id, &row.title, "no source location recorded");
    };

    // Source locations are recorded verbatim from upstream archive listings,
    // spaces included; parsing percent-encodes them.
    let url = match Url::parse(source) {
        Ok(u) => u,
        Err(e) => {
            return FetchOutcome::failed(
                &row.doc_id,
                &row.title,
                format!("invalid source URL {source}: {e}"),
            );
        }
    };

    let response = match client.get(url.clone()).timeout(timeout).send().await {
        Ok(r) => r,
        Err(e) => return FetchOutcome::failed(&row.doc_id, &row.title, format!("{url}: {e}")),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchOutcome::failed(&row.doc_id, &row.title, format!("{url}: HTTP {status}"));
    }

    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            return FetchOutcome::failed(
                &row.doc_id,
                &row.title,
                format!("{url}: body read failed: {e}"),
            );
        }
    };

    // Archive parsing and staging writes are blocking work.
    let doc_dir = doc_dir.to_path_buf();
    let unpack = tokio::task::spawn_blocking(move || stage_archive(&bytes, &doc_dir)).await;

    match unpack {
        Ok(Ok(staged)) => FetchOutcome {
            doc_id: row.doc_id.clone(),
            title: row.title.clone(),
            staged,
            error: None,
        },
        Ok(Err(e)) => {
            warn!(doc_id = %row.doc_id, error = %e, "archive staging failed");
            FetchOutcome::failed(&row.doc_id, &row.title, e.to_string())
        }
        Err(e) => FetchOutcome::failed(&row.doc_id, &row.title, format!("unpack task: {e}")),
    }
}

/// Reset the staging directory to empty (idempotent).
///
/// Leftovers from a prior run must never contaminate the generation corpus.
fn reset_staging(staging_dir: &Path) -> Result<()> {
    if staging_dir.exists() {
        std::fs::remove_dir_all(staging_dir).map_err(|e| TdocGraphError::io(staging_dir, e))?;
    }
    std::fs::create_dir_all(staging_dir).map_err(|e| TdocGraphError::io(staging_dir, e))?;
    Ok(())
}

/// Make a doc_id safe to use as a single path component.
fn safe_component(doc_id: &str) -> String {
    doc_id.replace(['/', '\\'], "_")
}
