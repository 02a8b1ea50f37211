//! Alpha pipeline (spec.md §4.7, component C7): a four-level funnel shared
//! by three model generations (T4/T6/T7).
//!
//! `run` is the pipeline's public entrypoint: `(trade_date, params, top_n)`
//! → `(ranked_list, diagnostics, metadata)`. Levels 1-4 live in their own
//! submodules so each stays testable on plain in-memory rows.

pub mod backtest;
pub mod extraction;
pub mod filter;
pub mod model;
pub mod refine;
pub mod regime;
pub mod resonance;
pub mod scoring;

use chrono::NaiveDate;

use crate::error::PipelineError;
use crate::pipeline::extraction::ExtractedRow;
use crate::pipeline::model::PipelineParams;
use crate::pipeline::refine::RefinedRow;
use crate::pipeline::regime::{Regime, RegimeResult};
use crate::store::models::{MarketIndexDaily, Ticker};
use crate::store::Store;

pub const DEFAULT_TOP_N: usize = 20;
pub const MAX_TOP_N: usize = 100;

#[derive(Debug, Clone)]
pub struct PipelineMetadata {
    pub market_regime: Regime,
    pub regime_z_score: f64,
    pub level1_count: usize,
    pub level2_count: usize,
    pub level3_count: usize,
    pub level4_count: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub trade_date: NaiveDate,
    pub ranked: Vec<RefinedRow>,
    pub diagnostic_info: Option<String>,
    pub metadata: PipelineMetadata,
}

/// Clamps a caller-supplied `top_n` to `[1, MAX_TOP_N]`, defaulting to
/// `DEFAULT_TOP_N` for `0` (spec.md §8 E2E-5).
pub fn clamp_top_n(top_n: Option<usize>) -> usize {
    match top_n {
        None | Some(0) => DEFAULT_TOP_N,
        Some(n) => n.min(MAX_TOP_N),
    }
}

/// Runs the full funnel over a pre-loaded universe. The caller is
/// responsible for loading `universe` (ticker + its trailing history
/// ending at `trade_date`) and `index_history` (trailing broad-market
/// index bars ending at `trade_date`) from the store — this function is
/// pure over already-fetched rows, matching the rest of this crate's
/// store-free compute modules.
pub fn run<'a>(
    trade_date: NaiveDate,
    params: &PipelineParams,
    top_n: Option<usize>,
    universe: impl Iterator<Item = (&'a Ticker, &'a [crate::store::models::DailyBar])>,
    index_history: &[MarketIndexDaily],
) -> Result<PipelineResult, PipelineError> {
    let top_n = clamp_top_n(top_n);

    let universe: Vec<(&Ticker, &[crate::store::models::DailyBar])> = universe.collect();
    let mut level1: Vec<ExtractedRow> = extraction::extract_all(&universe);
    if level1.is_empty() {
        // Data insufficiency (spec.md §7 kind 2) is not an error from the
        // caller's point of view — it surfaces as an empty result with a
        // diagnostic breadcrumb, same as an empty Level 2.
        return Ok(PipelineResult {
            trade_date,
            ranked: Vec::new(),
            diagnostic_info: Some(PipelineError::InsufficientHistory { trade_date }.to_string()),
            metadata: PipelineMetadata {
                market_regime: Regime::Balance,
                regime_z_score: 0.0,
                level1_count: 0,
                level2_count: 0,
                level3_count: 0,
                level4_count: 0,
            },
        });
    }
    let level1_count = level1.len();

    let regime_result: RegimeResult = if params.model_version.uses_regime_adapter() {
        regime::detect_regime(index_history)
    } else {
        RegimeResult {
            regime: Regime::Balance,
            z_score: 0.0,
            beta: 1.0,
        }
    };

    if params.model_version.uses_sector_resonance() {
        resonance::apply(&mut level1);
    }

    let (level2, _filter_diagnostics) =
        filter::apply(level1, params, trade_date, regime_result.regime);
    if level2.is_empty() {
        return Ok(PipelineResult {
            trade_date,
            ranked: Vec::new(),
            diagnostic_info: Some(PipelineError::EmptyAfterFilter.to_string()),
            metadata: PipelineMetadata {
                market_regime: regime_result.regime,
                regime_z_score: regime_result.z_score,
                level1_count,
                level2_count: 0,
                level3_count: 0,
                level4_count: 0,
            },
        });
    }
    let level2_count = level2.len();

    let level3 = scoring::apply(level2, params, regime_result.regime);
    let level3_count = level3.len();

    let level4 = refine::apply(level3, params.ai_filter);
    let level4_count = level4.len();

    let ranked: Vec<RefinedRow> = level4.into_iter().take(top_n).collect();

    Ok(PipelineResult {
        trade_date,
        ranked,
        diagnostic_info: None,
        metadata: PipelineMetadata {
            market_regime: regime_result.regime,
            regime_z_score: regime_result.z_score,
            level1_count,
            level2_count,
            level3_count,
            level4_count,
        },
    })
}

/// Loads the per-ticker trailing windows and index history a `run` call
/// needs from the store, then delegates to `run`. Kept separate so `run`
/// itself stays pure and unit-testable without a database.
pub fn run_from_store(
    store: &Store,
    trade_date: NaiveDate,
    params: &PipelineParams,
    top_n: Option<usize>,
    index_code: &str,
) -> Result<PipelineResult, PipelineError> {
    let tickers = store.all_active_tickers()?;
    let histories: Vec<(Ticker, Vec<crate::store::models::DailyBar>)> = tickers
        .into_iter()
        .map(|t| {
            let history = store
                .recent_daily_bars(&t.ticker_code, extraction::MIN_TRAILING_ROWS)
                .unwrap_or_default();
            (t, history)
        })
        .collect();
    let index_history =
        store.recent_market_index_daily(index_code, regime::OLS_WINDOW + regime::ROLLING_WINDOWS)?;

    run(
        trade_date,
        params,
        top_n,
        histories.iter().map(|(t, h)| (t, h.as_slice())),
        &index_history,
    )
}
