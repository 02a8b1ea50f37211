//! Narrow domain error types. Glue code (adapters, scheduler, CLI) uses
//! `anyhow::Result` with `.context(...)`; the feature store and the alpha
//! pipeline expose typed errors so callers can match on kind the way
//! spec.md §7 distinguishes error classes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open feature store at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("feature store migration failed: {0}")]
    Migration(String),

    #[error("constraint violation on {table}: {source}")]
    Constraint {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// The four funnel-level failure modes from spec.md §4.7, plus a deadline
/// variant carrying the breadcrumb of which levels completed (§5).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Level 1: no ticker has >= 90 trailing rows before {trade_date}")]
    InsufficientHistory { trade_date: chrono::NaiveDate },

    #[error("Level 2: universe emptied after hard-constraint filter")]
    EmptyAfterFilter,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("pipeline deadline exceeded after completing levels: {completed_levels:?}")]
    DeadlineExceeded { completed_levels: Vec<&'static str> },

    #[error("feature store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Human-readable breadcrumb attributable to exactly one level, per
    /// spec.md §8 property 8 (pipeline diagnostic completeness).
    pub fn diagnostic(&self) -> String {
        self.to_string()
    }
}
