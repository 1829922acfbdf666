//! Shared types, error model, and configuration for tdocgraph.
//!
//! This crate is the foundation depended on by all other tdocgraph crates.
//! It provides:
//! - [`TdocGraphError`] — the unified error type
//! - Domain types ([`RankedDocument`], [`DocumentMeta`], index hit records, [`RunId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GenerationConfig, GraphConfig, RankingConfig, RetrievalConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_graph_password,
    resolve_staging_dir,
};
pub use error::{Result, TdocGraphError};
pub use types::{
    AgendaTraversal, DirectHit, DocumentMeta, EntityTraversal, RankedDocument, RunId,
};
