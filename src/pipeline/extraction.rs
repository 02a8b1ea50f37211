//! Level 1 — feature extraction (spec.md §4.7 Level 1).
//!
//! Takes each ticker's trailing bar history and joins static metadata into
//! one flat row carrying everything the later levels read. Nothing here
//! touches the store; the caller loads `history` (ascending, ≥ 90 rows to
//! be eligible) per ticker ahead of time.

use rayon::prelude::*;

use crate::metrics::ticker::compute_ticker_metrics;
use crate::store::models::{DailyBar, Ticker};

pub const MIN_TRAILING_ROWS: usize = 90;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub ticker_code: String,
    pub industry_label: String,
    pub list_date: Option<chrono::NaiveDate>,
    pub display_name: String,
    pub trade_date: chrono::NaiveDate,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub volume: f64,
    pub turnover_amount: f64,
    pub turnover_rate: f64,
    pub change_pct: f64,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub rps_250: Option<f64>,
    pub vol_ma_5: f64,
    pub vol_ma_20: f64,
    pub vcp_factor: f64,
    pub vol_ratio_ma20: f64,
    pub upper_shadow_ratio: f64,
    pub vwap: f64,
    pub atr: f64,
    pub bias_20: f64,
    pub is_star_market: bool,
    pub is_gem: bool,
    /// 6-period RSI, used by the Defense-regime filter guard (§4.7.5).
    pub rsi_6: Option<f64>,
    /// Filled in by `resonance::apply` for T6/T7; `0.0` otherwise.
    pub sector_resonance_score: f64,
}

fn trailing_mean(values: &[f64], window: usize) -> f64 {
    let n = values.len().min(window);
    let slice = &values[values.len() - n..];
    slice.iter().sum::<f64>() / n as f64
}

/// Builds one `ExtractedRow` from a ticker's ascending history (last
/// element is the target day), or `None` if it has fewer than
/// `MIN_TRAILING_ROWS` rows.
pub fn extract_one(ticker: &Ticker, history: &[DailyBar]) -> Option<ExtractedRow> {
    if history.len() < MIN_TRAILING_ROWS {
        return None;
    }
    let today = history.last()?;
    let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = history.iter().map(|b| b.volume).collect();

    let metrics = compute_ticker_metrics(history);
    let ma20 = metrics.ma20;
    let ma60 = metrics.ma60;

    let vol_ma_5 = trailing_mean(&volumes, 5);
    let vol_ma_20 = trailing_mean(&volumes, 20);
    let vcp_factor = metrics.vcp_factor.unwrap_or(1.0);

    let vol_ratio_ma20 = if vol_ma_20 > 0.0 {
        today.volume / vol_ma_20
    } else {
        1.0
    };

    let range = today.high - today.low;
    let upper_shadow_ratio = if range > 0.0 {
        (today.high - today.close) / range
    } else {
        0.0
    };

    let vwap = if today.volume > 0.0 {
        today.turnover_amount / (today.volume * 100.0)
    } else {
        today.close
    };

    let atr = today.high - today.low;

    let bias_20 = match ma20 {
        Some(ma) if ma > 0.0 => (today.close - ma) / ma * 100.0,
        _ => 0.0,
    };

    let is_star_market = ticker.ticker_code.starts_with("688");
    let is_gem = ticker.ticker_code.starts_with("300");

    let rsi_6 = rust_ti::momentum_indicators::bulk::relative_strength_index(
        &closes,
        rust_ti::ConstantModelType::SimpleMovingAverage,
        6,
    )
    .last()
    .copied();

    Some(ExtractedRow {
        ticker_code: ticker.ticker_code.clone(),
        industry_label: ticker
            .industry_label
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        list_date: ticker.list_date,
        display_name: ticker.display_name.clone(),
        trade_date: today.trade_date,
        close: today.close,
        high: today.high,
        low: today.low,
        open: today.open,
        volume: today.volume,
        turnover_amount: today.turnover_amount,
        turnover_rate: today.turnover_rate,
        change_pct: today.change_pct,
        ma20,
        ma60,
        rps_250: today.rps_250,
        vol_ma_5,
        vol_ma_20,
        vcp_factor,
        vol_ratio_ma20,
        upper_shadow_ratio,
        vwap,
        atr,
        bias_20,
        is_star_market,
        is_gem,
        rsi_6,
        sector_resonance_score: 0.0,
    })
}

/// Level 1 across the universe; tickers with insufficient history are
/// silently dropped (the empty-result case is detected by the caller).
/// Each ticker's row is independent of every other, so the pass runs
/// across the rayon global pool rather than sequentially.
pub fn extract_all(universe: &[(&Ticker, &[DailyBar])]) -> Vec<ExtractedRow> {
    universe.par_iter().filter_map(|(t, h)| extract_one(t, h)).collect()
}
