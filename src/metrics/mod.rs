//! Derived-metric engine (spec.md §4.4, component C4).
//!
//! Recomputes per-ticker and per-sector metrics over a target trading day
//! after raw ingestion lands. Both submodules take already-loaded rows
//! rather than a `Store` handle directly, so the rolling-window math stays
//! testable without a database — the caller (scheduler's `daily_close` job)
//! owns fetching history and writing results back.

pub mod sector;
pub mod ticker;
