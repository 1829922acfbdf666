//! End-to-end search pipeline orchestration for tdocgraph.

pub mod export;
pub mod pipeline;

pub use pipeline::{
    AnswerOutcome, ProgressReporter, SearchContext, SearchOutcome, SearchRequest, SilentProgress,
    run_search,
};
