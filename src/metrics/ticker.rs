//! Per-ticker derived metrics (spec.md §4.4): trailing moving averages,
//! 5-row volume MA, the VCP contraction factor, and the cross-sectional
//! RPS-250 percentile rank.

use crate::store::models::DailyBar;

/// Result of recomputing one ticker's metrics for its most recent row in
/// `history`. All fields are populated whenever `history` is non-empty —
/// partial windows use the shorter available span rather than `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickerMetrics {
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma30: Option<f64>,
    pub ma60: Option<f64>,
    pub vol_ma_5: Option<f64>,
    pub vcp_factor: Option<f64>,
}

const MA_WINDOWS: [usize; 5] = [5, 10, 20, 30, 60];

fn trailing_mean(values: &[f64], window: usize) -> f64 {
    let n = values.len().min(window);
    let slice = &values[values.len() - n..];
    slice.iter().sum::<f64>() / n as f64
}

/// `history` must be ascending by `trade_date`, non-empty, with the target
/// day as the last element.
pub fn compute_ticker_metrics(history: &[DailyBar]) -> TickerMetrics {
    if history.is_empty() {
        return TickerMetrics::default();
    }
    let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = history.iter().map(|b| b.volume).collect();

    let mut mas = [None; 5];
    for (i, &w) in MA_WINDOWS.iter().enumerate() {
        mas[i] = Some(trailing_mean(&closes, w));
    }

    let vol_ma_5 = Some(trailing_mean(&volumes, 5));

    let vcp_factor = if history.len() < 20 {
        Some(1.0)
    } else {
        let window = &history[history.len() - 20..];
        let high_max = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low_min = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let close_mean = window.iter().map(|b| b.close).sum::<f64>() / window.len() as f64;
        Some(if close_mean > 0.0 {
            (high_max - low_min) / close_mean
        } else {
            1.0
        })
    };

    TickerMetrics {
        ma5: mas[0],
        ma10: mas[1],
        ma20: mas[2],
        ma30: mas[3],
        ma60: mas[4],
        vol_ma_5,
        vcp_factor,
    }
}

/// RPS-250 percentile ranking (spec.md §4.4): for every ticker with a
/// 250-trading-day-ago bar, compute the trailing return, rank ascending,
/// and map to `(rank - 1)/(N - 1) * 99.9`, clipped to `[0, 99.9]`. Tickers
/// without a 250-ago bar are absent from the input and the output both —
/// they get no RPS, not 0.
pub fn compute_rps_250(returns: &[(String, f64)]) -> Vec<(String, f64)> {
    let n = returns.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![(returns[0].0.clone(), 99.9)];
    }
    let mut sorted: Vec<&(String, f64)> = returns.iter().collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    sorted
        .iter()
        .enumerate()
        .map(|(rank, (code, _))| {
            let pct = (rank as f64) / (n as f64 - 1.0) * 99.9;
            (code.clone(), pct.clamp(0.0, 99.9))
        })
        .collect()
}

/// `(close_today / close_250_ago - 1) * 100`, or `None` when fewer than
/// 251 ascending rows are available (no bar 250 trading days back).
pub fn trailing_return_250(history: &[DailyBar]) -> Option<f64> {
    if history.len() < 251 {
        return None;
    }
    let today = history.last()?.close;
    let ago = history[history.len() - 251].close;
    if ago == 0.0 {
        return None;
    }
    Some((today / ago - 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: i64, close: f64, high: f64, low: f64, volume: f64) -> DailyBar {
        DailyBar {
            ticker_code: "600000".into(),
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day),
            open: close,
            close,
            high,
            low,
            volume,
            turnover_amount: 0.0,
            turnover_rate: 0.0,
            change_pct: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn ma5_matches_e2e_1_expectation() {
        let closes = [10.0, 11.0, 10.0, 12.0, 13.0, 12.0, 14.0, 15.0, 16.0, 15.0];
        let history: Vec<DailyBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(i as i64, c, c + 1.0, c - 1.0, 1000.0))
            .collect();
        let metrics = compute_ticker_metrics(&history);
        assert!((metrics.ma5.unwrap() - 14.4).abs() < 1e-9);
    }

    #[test]
    fn partial_window_never_returns_none_or_nan() {
        let history = vec![bar(0, 10.0, 11.0, 9.0, 100.0), bar(1, 11.0, 12.0, 10.0, 100.0)];
        let metrics = compute_ticker_metrics(&history);
        assert_eq!(metrics.ma60, Some(10.5));
        assert!(!metrics.ma60.unwrap().is_nan());
    }

    #[test]
    fn vcp_factor_falls_back_to_one_below_twenty_rows() {
        let history: Vec<DailyBar> = (0..10).map(|i| bar(i, 10.0, 11.0, 9.0, 100.0)).collect();
        let metrics = compute_ticker_metrics(&history);
        assert_eq!(metrics.vcp_factor, Some(1.0));
    }

    #[test]
    fn vcp_factor_uses_twenty_row_window_when_available() {
        let history: Vec<DailyBar> = (0..25).map(|i| bar(i, 10.0, 12.0, 8.0, 100.0)).collect();
        let metrics = compute_ticker_metrics(&history);
        // (12 - 8) / 10 = 0.4
        assert!((metrics.vcp_factor.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn rps_bounds_are_zero_to_99_9() {
        let returns: Vec<(String, f64)> = (0..10)
            .map(|i| (format!("60000{i}"), i as f64))
            .collect();
        let ranked = compute_rps_250(&returns);
        for (_, rps) in &ranked {
            assert!(*rps >= 0.0 && *rps <= 99.9);
        }
        // highest return gets the top percentile
        let (top_code, top_rps) = ranked.iter().find(|(c, _)| c == "600009").unwrap();
        assert_eq!(top_code, "600009");
        assert!((top_rps - 99.9).abs() < 1e-9);
    }

    #[test]
    fn trailing_return_250_requires_251_rows() {
        let short: Vec<DailyBar> = (0..100).map(|i| bar(i, 10.0, 11.0, 9.0, 100.0)).collect();
        assert_eq!(trailing_return_250(&short), None);

        let mut long: Vec<DailyBar> = (0..250).map(|i| bar(i, 10.0, 11.0, 9.0, 100.0)).collect();
        long.push(bar(250, 12.0, 13.0, 11.0, 100.0));
        let ret = trailing_return_250(&long).unwrap();
        assert!((ret - 20.0).abs() < 1e-9);
    }
}
