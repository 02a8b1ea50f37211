//! Recommendation persistence and verification (spec.md §4.9, component
//! C9): a thin wrapper around `store::recommendations` that turns a
//! pipeline run into durable rows and auto-verifies old ones on read.

use anyhow::Result;
use chrono::NaiveDate;

use crate::calendar::{Calendar, CalendarSource};
use crate::pipeline::PipelineResult;
use crate::store::models::{StrategyRecommendation, VerificationStatus};
use crate::store::Store;

const VERIFICATION_LAG_TRADING_DAYS: i64 = 5;
const SUCCESS_RETURN_THRESHOLD: f64 = 5.0;

/// Persists every ranked row of a pipeline run as one
/// `StrategyRecommendation`, attributed to `user_id` and tagged with
/// `strategy_version` and the exact params the run used. Re-running the
/// same `(user_id, run_date)` replaces rather than appends (handled by
/// the store's upsert).
pub fn record_run(
    store: &Store,
    user_id: &str,
    strategy_version: &str,
    params_snapshot: serde_json::Value,
    result: &PipelineResult,
) -> Result<()> {
    let recs: Vec<StrategyRecommendation> = result
        .ranked
        .iter()
        .map(|refined| StrategyRecommendation {
            user_id: user_id.to_string(),
            run_date: result.trade_date,
            ticker_code: refined.scored.row.ticker_code.clone(),
            params_snapshot: params_snapshot.clone(),
            entry_price: refined.scored.row.close,
            stop_loss_price: Some(refined.scored.row.close - refined.scored.row.atr),
            ai_score: refined.scored.total,
            win_probability: refined.win_probability,
            reason_tags: reason_tags(refined),
            strategy_version: strategy_version.to_string(),
            verification_status: VerificationStatus::Pending,
            max_return_5d: None,
            final_return_5d: None,
        })
        .collect();
    store.insert_recommendations(&recs)?;
    Ok(())
}

fn reason_tags(refined: &crate::pipeline::refine::RefinedRow) -> Vec<String> {
    let mut tags = Vec::new();
    if refined.scored.row.is_star_market {
        tags.push("star_market".to_string());
    }
    if refined.scored.row.is_gem {
        tags.push("gem".to_string());
    }
    if refined.scored.row.sector_resonance_score > 0.0 {
        tags.push("sector_resonance".to_string());
    }
    if refined.win_probability >= 70.0 {
        tags.push("high_confidence".to_string());
    }
    tags
}

/// Verifies every still-`pending` recommendation whose `run_date` is at
/// least `VERIFICATION_LAG_TRADING_DAYS` trading days in the past,
/// keyed per `(user_id, run_date, ticker_code)`. Returns the count of
/// rows moved out of `pending`.
pub fn verify_due(store: &Store, calendar: &Calendar<impl CalendarSource>, today: NaiveDate) -> Result<usize> {
    let Some(cutoff) = nth_trading_day_back(calendar, today, VERIFICATION_LAG_TRADING_DAYS) else {
        return Ok(0);
    };
    let due = store.pending_recommendations_before(cutoff)?;
    let mut verified = 0;
    for rec in due {
        if let Some((max_return_5d, final_return_5d)) =
            forward_returns(store, calendar, &rec.ticker_code, rec.run_date, rec.entry_price)
        {
            let status = if final_return_5d > SUCCESS_RETURN_THRESHOLD {
                VerificationStatus::Success
            } else {
                VerificationStatus::Fail
            };
            store.update_verification(
                &rec.user_id,
                rec.run_date,
                &rec.ticker_code,
                status,
                max_return_5d,
                final_return_5d,
            )?;
            verified += 1;
        }
    }
    Ok(verified)
}

fn nth_trading_day_back(calendar: &Calendar<impl CalendarSource>, from: NaiveDate, n: i64) -> Option<NaiveDate> {
    let mut cursor = from;
    for _ in 0..n {
        cursor = calendar.last_trading_day(cursor - chrono::Duration::days(1))?;
    }
    Some(cursor)
}

fn forward_returns(
    store: &Store,
    calendar: &Calendar<impl CalendarSource>,
    ticker_code: &str,
    run_date: NaiveDate,
    entry_price: f64,
) -> Option<(f64, f64)> {
    let mut cursor = run_date;
    let mut bars = Vec::new();
    for _ in 0..VERIFICATION_LAG_TRADING_DAYS {
        cursor = calendar.next_trading_day(cursor)?;
        if let Ok(Some(bar)) = store.daily_bar_on(ticker_code, cursor) {
            bars.push(bar);
        }
    }
    if bars.is_empty() {
        return None;
    }
    let max_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let final_close = bars.last()?.close;
    let max_return_5d = (max_high - entry_price) / entry_price * 100.0;
    let final_return_5d = (final_close - entry_price) / entry_price * 100.0;
    Some((max_return_5d, final_return_5d))
}
