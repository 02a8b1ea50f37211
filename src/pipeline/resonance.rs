//! Sector resonance (spec.md §4.7.4, T6/T7 only).
//!
//! Groups Level-1 rows by `industry_label` and computes three group
//! aggregates via a `groupby.transform`-style broadcast, then folds a
//! per-ticker bonus/penalty into `sector_resonance_score`.

use std::collections::HashMap;

use crate::pipeline::extraction::ExtractedRow;

const MAIN_LINE_BONUS: f64 = 40.0;
const PEER_VALIDATION_BONUS: f64 = 30.0;
const SOLO_RALLY_PENALTY: f64 = -50.0;

struct SectorAggregate {
    avg_chg: f64,
    breadth: f64,
    max_chg: f64,
}

fn aggregate(rows: &[&ExtractedRow]) -> SectorAggregate {
    let n = rows.len() as f64;
    let avg_chg = rows.iter().map(|r| r.change_pct).sum::<f64>() / n;
    let breadth = rows.iter().filter(|r| r.change_pct > 3.0).count() as f64 / n;
    let max_chg = rows
        .iter()
        .map(|r| r.change_pct)
        .fold(f64::MIN, f64::max);
    SectorAggregate {
        avg_chg,
        breadth,
        max_chg,
    }
}

/// Mutates `rows` in place, setting `sector_resonance_score` per ticker.
pub fn apply(rows: &mut [ExtractedRow]) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups.entry(row.industry_label.clone()).or_default().push(i);
    }

    let mut scores = vec![0.0_f64; rows.len()];
    for indices in groups.values() {
        let group_rows: Vec<&ExtractedRow> = indices.iter().map(|&i| &rows[i]).collect();
        let agg = aggregate(&group_rows);
        for &i in indices {
            let r = &rows[i];
            let mut score = 0.0;
            if agg.avg_chg > 1.5 && agg.breadth > 0.20 {
                score += MAIN_LINE_BONUS;
            }
            if agg.max_chg > 9.8 && r.change_pct < 9.8 {
                score += PEER_VALIDATION_BONUS;
            }
            if r.change_pct > 6.0 && agg.avg_chg < 0.5 {
                score += SOLO_RALLY_PENALTY;
            }
            scores[i] = score;
        }
    }

    for (row, score) in rows.iter_mut().zip(scores) {
        row.sector_resonance_score = score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(code: &str, industry: &str, change_pct: f64) -> ExtractedRow {
        ExtractedRow {
            ticker_code: code.into(),
            industry_label: industry.into(),
            list_date: None,
            display_name: code.into(),
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            close: 10.0,
            high: 10.5,
            low: 9.5,
            open: 10.0,
            volume: 1000.0,
            turnover_amount: 1.0,
            turnover_rate: 1.0,
            change_pct,
            ma20: Some(10.0),
            ma60: Some(10.0),
            rps_250: Some(50.0),
            vol_ma_5: 1000.0,
            vol_ma_20: 1000.0,
            vcp_factor: 0.5,
            vol_ratio_ma20: 1.0,
            upper_shadow_ratio: 0.0,
            vwap: 10.0,
            atr: 1.0,
            bias_20: 0.0,
            is_star_market: false,
            is_gem: false,
            rsi_6: None,
            sector_resonance_score: 0.0,
        }
    }

    #[test]
    fn main_line_bonus_applies_to_whole_hot_sector() {
        let mut rows = vec![
            row("a", "tech", 3.0),
            row("b", "tech", 2.5),
            row("c", "tech", 1.0),
        ];
        apply(&mut rows);
        for r in &rows {
            assert!((r.sector_resonance_score - MAIN_LINE_BONUS).abs() < 1e-9);
        }
    }

    #[test]
    fn peer_validation_rewards_follower_not_leader() {
        let mut rows = vec![row("leader", "tech", 10.0), row("follower", "tech", 5.0)];
        apply(&mut rows);
        // leader's own change_pct (10.0) is not < 9.8, so it gets no peer bonus
        assert_eq!(rows[0].sector_resonance_score, 0.0);
        assert!((rows[1].sector_resonance_score - PEER_VALIDATION_BONUS).abs() < 1e-9);
    }

    #[test]
    fn solo_rally_penalized_in_dead_sector() {
        let mut rows = vec![row("solo", "tech", 7.0), row("dead", "tech", -1.0)];
        apply(&mut rows);
        assert!((rows[0].sector_resonance_score - SOLO_RALLY_PENALTY).abs() < 1e-9);
    }
}
