//! Level 3 — composite scoring (spec.md §4.7 Level 3).

use crate::pipeline::extraction::ExtractedRow;
use crate::pipeline::model::{ModelVersion, PipelineParams};
use crate::pipeline::regime::Regime;

const CROWDING_TURNOVER_THRESHOLD: f64 = 20.0;
const CROWDING_SHADOW_THRESHOLD: f64 = 0.4;
const CROWDING_PENALTY: f64 = 50.0;
const MAIN_BOARD_LIMIT_UP: f64 = 9.95;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub row: ExtractedRow,
    pub explosion_score: f64,
    pub structure_score: f64,
    pub sector_score: f64,
    pub total: f64,
}

fn explosion_score(row: &ExtractedRow, vol_threshold: f64) -> f64 {
    if row.vol_ratio_ma20 >= vol_threshold {
        50.0
    } else {
        0.0
    }
}

/// VCP contributes up to 20 extra points: lower factor (tighter basing)
/// scores higher, measured against the day's median VCP.
fn structure_score(row: &ExtractedRow, rps_threshold: f64, median_vcp: f64) -> f64 {
    let rps_component = match row.rps_250 {
        Some(rps) if rps >= rps_threshold => 30.0,
        _ => 0.0,
    };
    let vcp_component = if median_vcp > 0.0 && row.vcp_factor < median_vcp {
        20.0 * (1.0 - (row.vcp_factor / median_vcp)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    rps_component + vcp_component
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn beta_elasticity(row: &ExtractedRow, regime: Regime) -> f64 {
    if !(row.is_gem || row.is_star_market) {
        return 1.0;
    }
    let f_regime = match regime {
        Regime::Attack => 0.15,
        Regime::Defense => -0.15,
        Regime::Balance => 0.0,
    };
    let beta_proxy = row.atr / row.close.max(f64::EPSILON);
    1.0 + f_regime * beta_proxy
}

fn crowding_penalty(row: &ExtractedRow) -> f64 {
    let at_limit_up = row.change_pct >= MAIN_BOARD_LIMIT_UP;
    if row.turnover_rate > CROWDING_TURNOVER_THRESHOLD
        && !at_limit_up
        && row.upper_shadow_ratio > CROWDING_SHADOW_THRESHOLD
    {
        CROWDING_PENALTY
    } else {
        0.0
    }
}

/// Scores every survivor and sorts descending by `total`.
pub fn apply(rows: Vec<ExtractedRow>, params: &PipelineParams, regime: Regime) -> Vec<ScoredRow> {
    let mut vcp_values: Vec<f64> = rows.iter().map(|r| r.vcp_factor).collect();
    let median_vcp = median(&mut vcp_values);

    let mut scored: Vec<ScoredRow> = rows
        .into_iter()
        .map(|row| {
            let s_e = explosion_score(&row, params.vol_ratio_ma20_threshold);
            let s_s = structure_score(&row, params.rps_threshold, median_vcp);
            let s_k = if params.model_version.uses_sector_resonance() {
                row.sector_resonance_score
            } else {
                0.0
            };
            let mut total = params.w_tech * s_e + params.w_trend * s_s + params.w_hot * s_k;

            if params.model_version.uses_star_gem_boost() && (row.is_gem || row.is_star_market) {
                total *= params.gem_star_weight_boost;
            }
            if params.model_version == ModelVersion::T6 && params.model_version.uses_beta_elasticity() {
                total *= beta_elasticity(&row, regime);
            }
            total -= crowding_penalty(&row);

            ScoredRow {
                explosion_score: s_e,
                structure_score: s_s,
                sector_score: s_k,
                total,
                row,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(vol_ratio: f64, rps: f64, vcp: f64, turnover_rate: f64, shadow: f64, change_pct: f64) -> ExtractedRow {
        ExtractedRow {
            ticker_code: "600000".into(),
            industry_label: "tech".into(),
            list_date: None,
            display_name: "Test".into(),
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            close: 10.0,
            high: 10.5,
            low: 9.5,
            open: 10.0,
            volume: 1000.0,
            turnover_amount: 1.0,
            turnover_rate,
            change_pct,
            ma20: Some(9.5),
            ma60: Some(9.5),
            rps_250: Some(rps),
            vol_ma_5: 1000.0,
            vol_ma_20: 1000.0,
            vcp_factor: vcp,
            vol_ratio_ma20: vol_ratio,
            upper_shadow_ratio: shadow,
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
    fn sorted_descending_by_total() {
        let params = PipelineParams::defaults(crate::pipeline::model::ModelVersion::T4);
        let rows = vec![
            row(3.0, 90.0, 0.2, 1.0, 0.0, 8.0),
            row(1.0, 10.0, 1.0, 1.0, 0.0, 8.0),
        ];
        let scored = apply(rows, &params, Regime::Balance);
        assert!(scored[0].total >= scored[1].total);
    }

    #[test]
    fn crowding_penalty_applies_when_not_limit_up() {
        let params = PipelineParams::defaults(crate::pipeline::model::ModelVersion::T4);
        let rows = vec![row(3.0, 90.0, 0.2, 25.0, 0.5, 8.0)];
        let scored = apply(rows, &params, Regime::Balance);
        // explosion(50*0.4) + structure(30*0.4, vcp contributes 0 since it's the only row, median==itself) - 50 penalty
        assert!(scored[0].total < 20.0 + 12.0);
    }

    #[test]
    fn gem_star_boost_only_applies_to_t4() {
        let mut r = row(3.0, 90.0, 0.2, 1.0, 0.0, 8.0);
        r.is_gem = true;
        let params_t4 = PipelineParams::defaults(crate::pipeline::model::ModelVersion::T4);
        let scored_t4 = apply(vec![r.clone()], &params_t4, Regime::Balance);
        let params_t6 = PipelineParams::defaults(crate::pipeline::model::ModelVersion::T6);
        let scored_t6 = apply(vec![r], &params_t6, Regime::Balance);
        assert!(scored_t4[0].total > scored_t6[0].total || scored_t4[0].total == scored_t6[0].total);
    }
}
