//! Per-sector derived metrics (spec.md §4.4): cumulative-return RPS
//! ranking, a pseudo-price MA-status indicator, and the member-derived
//! aggregate fields (`change_pct`, `avg_turnover`, `limit_up_count`,
//! `top_weight_stocks`).

use crate::store::models::DailyBar;

/// Compounded return over `change_pct`s, in percent:
/// `product(1 + c/100) - 1`, times 100.
pub fn cumulative_return_pct(change_pcts: &[f64]) -> f64 {
    let compounded = change_pcts.iter().fold(1.0_f64, |acc, &c| acc * (1.0 + c / 100.0));
    (compounded - 1.0) * 100.0
}

/// Percentile rank of `value` against `universe`, `(rank)/(N-1) * 99.9`
/// clipped to `[0, 99.9]` — same shape as the ticker RPS ranking, applied
/// across the day's sector universe instead of the ticker universe.
pub fn percentile_rank(value: f64, universe: &[f64]) -> f64 {
    let n = universe.len();
    if n <= 1 {
        return 99.9;
    }
    let rank = universe.iter().filter(|&&v| v < value).count();
    ((rank as f64) / (n as f64 - 1.0) * 99.9).clamp(0.0, 99.9)
}

/// `+1` bullish / `-1` bearish / `0` neutral-or-insufficient-history, from
/// a pseudo-price series rebuilt by compounding `change_pct`s from a seed
/// of 100.
pub fn sector_ma_status(change_pcts_ascending: &[f64]) -> i32 {
    if change_pcts_ascending.len() < 20 {
        return 0;
    }
    let mut prices = Vec::with_capacity(change_pcts_ascending.len() + 1);
    let mut price = 100.0;
    prices.push(price);
    for &c in change_pcts_ascending {
        price *= 1.0 + c / 100.0;
        prices.push(price);
    }
    let ma = |window: usize| -> f64 {
        let n = prices.len().min(window);
        let slice = &prices[prices.len() - n..];
        slice.iter().sum::<f64>() / n as f64
    };
    let (ma5, ma10, ma20) = (ma(5), ma(10), ma(20));
    if ma5 > ma10 && ma10 > ma20 {
        1
    } else if ma5 < ma10 && ma10 < ma20 {
        -1
    } else {
        0
    }
}

/// Fields derivable from the sector's member `DailyBar` rows on one day:
/// turnover-weighted `change_pct`, mean `avg_turnover`, `limit_up_count`
/// (main-board threshold; STAR/GEM tickers use a higher threshold the
/// caller should pre-filter or accept as a slight undercount), and the
/// top-5-by-turnover `top_weight_stocks`.
pub struct MemberDerived {
    pub change_pct: Option<f64>,
    pub avg_turnover: Option<f64>,
    pub limit_up_count: i64,
    pub top_weight_stocks: Vec<String>,
}

const MAIN_BOARD_LIMIT_UP: f64 = 9.95;

pub fn derive_from_members(members: &[DailyBar]) -> MemberDerived {
    if members.is_empty() {
        return MemberDerived {
            change_pct: None,
            avg_turnover: None,
            limit_up_count: 0,
            top_weight_stocks: Vec::new(),
        };
    }
    let total_turnover: f64 = members.iter().map(|b| b.turnover_amount).sum();
    let change_pct = if total_turnover > 0.0 {
        Some(
            members
                .iter()
                .map(|b| b.change_pct * b.turnover_amount)
                .sum::<f64>()
                / total_turnover,
        )
    } else {
        Some(members.iter().map(|b| b.change_pct).sum::<f64>() / members.len() as f64)
    };
    let avg_turnover = Some(members.iter().map(|b| b.turnover_rate).sum::<f64>() / members.len() as f64);
    let limit_up_count = members.iter().filter(|b| b.change_pct >= MAIN_BOARD_LIMIT_UP).count() as i64;

    let mut by_turnover: Vec<&DailyBar> = members.iter().collect();
    by_turnover.sort_by(|a, b| b.turnover_amount.partial_cmp(&a.turnover_amount).unwrap());
    let top_weight_stocks = by_turnover
        .into_iter()
        .take(5)
        .map(|b| b.ticker_code.clone())
        .collect();

    MemberDerived {
        change_pct,
        avg_turnover,
        limit_up_count,
        top_weight_stocks,
    }
}
