//! Next-day predictor (spec.md §4.8, component C8).
//!
//! Surfaces tomorrow's likely hot virtual boards and a short ticker
//! watchlist, blending sector money-flow momentum with xueqiu/dongcai
//! hot-rank attention. Glue code over the store, so it returns
//! `anyhow::Result` like the scheduler rather than the pipeline's typed
//! `PipelineError`.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::{Calendar, CalendarSource};
use crate::store::models::{HotRankSource, NextDayPredictionCache, SectorFlow};
use crate::store::Store;

const CACHE_FRESHNESS_MINUTES: i64 = 30;
const TREND_WINDOW: usize = 3;
const TOP_BOARDS: usize = 5;
const CANDIDATES_PER_BOARD: usize = 5;
const TOP_TICKERS: usize = 10;

fn market_close_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).expect("valid constant time")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorMomentum {
    pub sector_name: String,
    pub net_sum: f64,
    pub trend_slope: f64,
    pub acceleration: f64,
    pub large_order_ratio: f64,
}

/// Trend/acceleration over the trailing `flows` (ascending by trade_date,
/// as `recent_sector_flow` already returns them). `None` below 2 rows —
/// a slope needs at least two points.
pub fn sector_momentum(sector_name: &str, flows: &[SectorFlow]) -> Option<SectorMomentum> {
    if flows.len() < 2 {
        return None;
    }
    let nets: Vec<f64> = flows.iter().rev().take(TREND_WINDOW).rev().map(|f| f.main_net).collect();
    let n = nets.len();
    let mean_x = (n as f64 - 1.0) / 2.0;
    let mean_y = nets.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in nets.iter().enumerate() {
        let x = i as f64 - mean_x;
        num += x * y;
        den += x * x;
    }
    let trend_slope = if den > 0.0 { num / den } else { 0.0 };
    let acceleration = if n >= 3 {
        (nets[n - 1] - nets[n - 2]) - (nets[n - 2] - nets[n - 3])
    } else {
        0.0
    };
    let latest = flows.last().expect("checked len >= 2");
    let large_order_ratio = (latest.super_large_net + latest.large_net) / latest.main_net.abs().max(f64::EPSILON);

    Some(SectorMomentum {
        sector_name: sector_name.to_string(),
        net_sum: nets.iter().sum(),
        trend_slope,
        acceleration,
        large_order_ratio,
    })
}

/// Squashes a trend+acceleration pair into a bounded 0-100 money score.
pub fn money_score(momentum: Option<&SectorMomentum>) -> f64 {
    let Some(m) = momentum else { return 50.0 };
    let raw = m.trend_slope + m.acceleration;
    (50.0 + raw.tanh() * 50.0).clamp(0.0, 100.0)
}

/// `10*count + 0.5*(200-mean_rank) + 0.1*mean_hot`, clamped to [0,100]
/// (spec.md §4.8 step 2).
pub fn concept_hot_score(count: usize, mean_rank: f64, mean_hot: f64) -> f64 {
    let raw = 10.0 * count as f64 + 0.5 * (200.0 - mean_rank) + 0.1 * mean_hot;
    raw.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardScore {
    pub virtual_board_name: String,
    pub money_score: f64,
    pub hot_score: f64,
    pub momentum_score: f64,
    pub resonance_score: f64,
    pub composite: f64,
}

/// `0.35*money + 0.25*hot + 0.20*momentum + 0.20*resonance`, momentum
/// proxied as `0.8*hot` (spec.md §4.8 step 4).
pub fn board_composite(money: f64, hot: f64, resonance: f64) -> BoardScore {
    let momentum = 0.8 * hot;
    let composite = 0.35 * money + 0.25 * hot + 0.20 * momentum + 0.20 * resonance;
    BoardScore {
        virtual_board_name: String::new(),
        money_score: money,
        hot_score: hot,
        momentum_score: momentum,
        resonance_score: resonance,
        composite: composite.clamp(0.0, 100.0),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerCandidate {
    pub ticker_code: String,
    pub virtual_board_name: String,
    pub rank: i32,
    pub score: f64,
}

/// `board_composite*0.4 + rank_score*0.2 + technical_score` (spec.md §4.8
/// step 5). `rank_score` rewards a low (better) hot-rank position.
pub fn candidate_score(board_composite: f64, rank: i32, technical_score: f64) -> f64 {
    let rank_score = (100.0 - f64::from(rank)).max(0.0);
    board_composite * 0.4 + rank_score * 0.2 + technical_score
}

/// Proxy for a candidate's own technical strength: today's change_pct,
/// scaled and capped so it never swamps the board/rank terms.
pub fn technical_score(change_pct: Option<f64>) -> f64 {
    change_pct.unwrap_or(0.0).max(0.0).min(10.0) * 2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub as_of: NaiveDate,
    pub boards: Vec<BoardScore>,
    pub tickers: Vec<TickerCandidate>,
}

/// Builds tomorrow's watchlist from today's close-of-day store state.
/// Every read is best-effort degraded: a ticker with no concept
/// membership, a concept with no virtual-board mapping, or a sector with
/// no flow history simply contributes nothing rather than failing the
/// whole run.
pub fn predict(store: &Store, today: NaiveDate) -> Result<PredictionResult> {
    let sector_rows = store.sector_flow_for_date(today)?;
    let mut momentum_by_sector: HashMap<String, SectorMomentum> = HashMap::new();
    for row in &sector_rows {
        let history = store.recent_sector_flow(&row.sector_name, TREND_WINDOW)?;
        if let Some(m) = sector_momentum(&row.sector_name, &history) {
            momentum_by_sector.insert(row.sector_name.clone(), m);
        }
    }

    let hot_rows = store.hot_rank_list(HotRankSource::Xueqiu, today)?;

    // concept_id -> (concept_name, [(ticker_code, rank, hot_score)])
    let mut concept_tickers: HashMap<i64, (String, Vec<(String, i32, f64)>)> = HashMap::new();
    for entry in &hot_rows {
        let memberships = store.concepts_for_ticker(&entry.ticker_code)?;
        for membership in memberships {
            let concept = match store.get_concept(membership.concept_id)? {
                Some(c) if c.active_flag => c,
                _ => continue,
            };
            concept_tickers
                .entry(membership.concept_id)
                .or_insert_with(|| (concept.concept_name.clone(), Vec::new()))
                .1
                .push((entry.ticker_code.clone(), entry.rank, entry.hot_score));
        }
    }

    // virtual_board_name -> [(concept_hot_score, weight, [(ticker_code, rank)])]
    let mut board_inputs: HashMap<String, Vec<(f64, f64, Vec<(String, i32)>)>> = HashMap::new();
    for (concept_name, ticker_ranks) in concept_tickers.values() {
        let count = ticker_ranks.len();
        let mean_rank = ticker_ranks.iter().map(|(_, r, _)| f64::from(*r)).sum::<f64>() / count as f64;
        let mean_hot = ticker_ranks.iter().map(|(_, _, h)| h).sum::<f64>() / count as f64;
        let hot = concept_hot_score(count, mean_rank, mean_hot);

        let mappings = store.virtual_boards_for_concept(concept_name)?;
        for mapping in mappings.iter().filter(|m| m.active_flag) {
            let pairs: Vec<(String, i32)> = ticker_ranks.iter().map(|(t, r, _)| (t.clone(), *r)).collect();
            board_inputs
                .entry(mapping.virtual_board_name.clone())
                .or_default()
                .push((hot, mapping.weight, pairs));
        }
    }

    let mut boards: Vec<(BoardScore, Vec<(String, i32)>)> = board_inputs
        .into_iter()
        .map(|(board_name, contributions)| {
            let weight_sum: f64 = contributions.iter().map(|(_, w, _)| w).sum();
            let hot = if weight_sum > 0.0 {
                contributions.iter().map(|(h, w, _)| h * w).sum::<f64>() / weight_sum
            } else {
                0.0
            };
            let resonance = (10.0 * contributions.len() as f64).min(100.0);
            let money = money_score(momentum_by_sector.get(&board_name));
            let mut score = board_composite(money, hot, resonance);
            score.virtual_board_name = board_name.clone();

            let mut tickers: HashMap<String, i32> = HashMap::new();
            for (_, _, pairs) in &contributions {
                for (ticker_code, rank) in pairs {
                    tickers
                        .entry(ticker_code.clone())
                        .and_modify(|best| *best = (*best).min(*rank))
                        .or_insert(*rank);
                }
            }
            let mut ranked_tickers: Vec<(String, i32)> = tickers.into_iter().collect();
            ranked_tickers.sort_by_key(|(_, rank)| *rank);

            (score, ranked_tickers)
        })
        .collect();

    boards.sort_by(|a, b| b.0.composite.partial_cmp(&a.0.composite).unwrap_or(std::cmp::Ordering::Equal));
    boards.truncate(TOP_BOARDS);

    let mut candidates: HashMap<String, TickerCandidate> = HashMap::new();
    for (board, ranked_tickers) in &boards {
        for (ticker_code, rank) in ranked_tickers.iter().take(CANDIDATES_PER_BOARD) {
            let bar = store.daily_bar_on(ticker_code, today)?;
            let technical = technical_score(bar.map(|b| b.change_pct));
            let score = candidate_score(board.composite, *rank, technical);
            candidates
                .entry(ticker_code.clone())
                .and_modify(|existing| {
                    if score > existing.score {
                        existing.score = score;
                        existing.virtual_board_name = board.virtual_board_name.clone();
                        existing.rank = *rank;
                    }
                })
                .or_insert(TickerCandidate {
                    ticker_code: ticker_code.clone(),
                    virtual_board_name: board.virtual_board_name.clone(),
                    rank: *rank,
                    score,
                });
        }
    }
    let mut tickers: Vec<TickerCandidate> = candidates.into_values().collect();
    tickers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    tickers.truncate(TOP_TICKERS);

    Ok(PredictionResult {
        as_of: today,
        boards: boards.into_iter().map(|(b, _)| b).collect(),
        tickers,
    })
}

/// Serves a cached prediction when it is still usable, otherwise
/// regenerates and overwrites the day's cache row (spec.md §4.8 caching
/// policy). `force` always regenerates.
pub fn get_or_generate(
    store: &Store,
    calendar: &Calendar<impl CalendarSource>,
    now: NaiveDateTime,
    force: bool,
) -> Result<NextDayPredictionCache> {
    let today = now.date();
    if !force {
        if let Some(cached) = store.get_prediction_cache(today)? {
            let off_trading_day = !calendar.is_trading_day(today);
            let after_close = now.time() >= market_close_time();
            let still_fresh = now - cached.created_at < Duration::minutes(CACHE_FRESHNESS_MINUTES);
            if off_trading_day || after_close || still_fresh {
                return Ok(cached);
            }
        }
    }

    let payload = predict(store, today)?;
    let entry = NextDayPredictionCache {
        target_date: today,
        prediction_payload: serde_json::to_value(&payload)?,
        created_at: now,
    };
    store.put_prediction_cache(&entry)?;
    Ok(entry)
}
