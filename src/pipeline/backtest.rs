//! Walk-forward backtest engine (spec.md §4.7.6).
//!
//! Iterates trading days in order, running the funnel at each day and
//! scoring simulated top-N entries 5 trading days forward. Results are
//! summary stats plus per-trade records — this never persists to
//! `StrategyRecommendation`, unlike a live `/model-k/recommend` call.

use chrono::NaiveDate;

use crate::calendar::{Calendar, CalendarSource};
use crate::error::PipelineError;
use crate::pipeline::model::PipelineParams;
use crate::pipeline::{self, clamp_top_n};
use crate::store::Store;

const FORWARD_WINDOW: i64 = 5;
pub const MAX_BACKTEST_SPAN_DAYS: i64 = 180;

/// Request-side timeout budget (spec.md §4.7.6): scaled to the requested
/// date span in seconds.
pub fn timeout_seconds_for_span(span_days: i64) -> u64 {
    if span_days <= 60 {
        300
    } else if span_days <= 120 {
        450
    } else {
        600
    }
}

#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub trade_date: NaiveDate,
    pub ticker_code: String,
    pub entry_price: f64,
    pub max_return_5d: Option<f64>,
    pub final_return_5d: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct BacktestSummary {
    pub days_run: usize,
    pub total_trades: usize,
    pub win_count: usize,
    pub avg_final_return_5d: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub summary: BacktestSummary,
    pub trades: Vec<TradeRecord>,
}

/// Validates `(start_date, end_date)` against spec.md §8 E2E-3: a span
/// exceeding 6 months (180 days) is rejected up front.
pub fn validate_span(start_date: NaiveDate, end_date: NaiveDate) -> Result<(), PipelineError> {
    let span = (end_date - start_date).num_days();
    if span > MAX_BACKTEST_SPAN_DAYS {
        return Err(PipelineError::InvalidParams(
            "date range cannot exceed 6 months".to_string(),
        ));
    }
    Ok(())
}

/// Scores one simulated entry against realised closes 5 trading days out.
fn score_trade(
    ticker_code: &str,
    entry_price: f64,
    trade_date: NaiveDate,
    store: &Store,
    calendar: &Calendar<impl CalendarSource>,
) -> TradeRecord {
    let mut cursor = trade_date;
    let mut forward_bars = Vec::new();
    for _ in 0..FORWARD_WINDOW {
        match calendar.next_trading_day(cursor) {
            Some(next) => {
                cursor = next;
                if let Ok(Some(bar)) = store.daily_bar_on(ticker_code, next) {
                    forward_bars.push(bar);
                }
            }
            None => break,
        }
    }

    let max_high = forward_bars
        .iter()
        .map(|b| b.high)
        .fold(None::<f64>, |acc, h| Some(acc.map_or(h, |a: f64| a.max(h))));
    let final_close = forward_bars.last().map(|b| b.close);

    let max_return_5d = max_high.map(|h| (h - entry_price) / entry_price * 100.0);
    let final_return_5d = final_close.map(|c| (c - entry_price) / entry_price * 100.0);

    TradeRecord {
        trade_date,
        ticker_code: ticker_code.to_string(),
        entry_price,
        max_return_5d,
        final_return_5d,
    }
}

/// Runs the walk-forward engine over `[start_date, end_date]`.
pub fn run(
    store: &Store,
    calendar: &Calendar<impl CalendarSource>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    params: &PipelineParams,
    top_n: Option<usize>,
    index_code: &str,
) -> Result<BacktestResult, PipelineError> {
    validate_span(start_date, end_date)?;
    let top_n = clamp_top_n(top_n);

    let mut trades = Vec::new();
    let mut days_run = 0usize;

    for day in calendar.trading_days_in(start_date, end_date) {
        let result = pipeline::run_from_store(store, day, params, Some(top_n), index_code)?;
        days_run += 1;
        for refined in result.ranked {
            let entry_price = refined.scored.row.close;
            let trade = score_trade(&refined.scored.row.ticker_code, entry_price, day, store, calendar);
            trades.push(trade);
        }
    }

    let scored_trades: Vec<f64> = trades.iter().filter_map(|t| t.final_return_5d).collect();
    let win_count = scored_trades.iter().filter(|&&r| r > 5.0).count();
    let avg_final_return_5d = if scored_trades.is_empty() {
        0.0
    } else {
        scored_trades.iter().sum::<f64>() / scored_trades.len() as f64
    };

    Ok(BacktestResult {
        summary: BacktestSummary {
            days_run,
            total_trades: trades.len(),
            win_count,
            avg_final_return_5d,
        },
        trades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn e2e_3_span_over_six_months_rejected() {
        let end = d(2024, 6, 1);
        let start = end - chrono::Duration::days(181);
        let err = validate_span(start, end).unwrap_err();
        assert!(err.to_string().contains("cannot exceed 6 months"));
    }

    #[test]
    fn span_of_exactly_180_days_is_accepted() {
        let end = d(2024, 6, 1);
        let start = end - chrono::Duration::days(180);
        assert!(validate_span(start, end).is_ok());
    }

    #[test]
    fn timeout_scales_with_span() {
        assert_eq!(timeout_seconds_for_span(30), 300);
        assert_eq!(timeout_seconds_for_span(90), 450);
        assert_eq!(timeout_seconds_for_span(170), 600);
    }
}
