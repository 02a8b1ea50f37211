//! Level 2 — hard-constraint filter (spec.md §4.7 Level 2).
//!
//! Rules run in a fixed order so `diagnostics` attributes exactly one
//! reason per dropped ticker and per-rule pass/fail counts are available
//! for the pipeline's returned diagnostic breadcrumb.

use crate::pipeline::extraction::ExtractedRow;
use crate::pipeline::model::{PipelineParams, SupportMa};
use crate::pipeline::regime::Regime;

const MAIN_BOARD_LIMIT_UP: f64 = 9.95;
const STAR_GEM_LIMIT_UP: f64 = 19.95;
const MIN_LISTING_AGE_DAYS: i64 = 60;
const ST_MARKER: &str = "ST";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRule {
    MinChangePct,
    VolRatio,
    UpperShadow,
    SupportMa,
    ListingAge,
    StRisk,
    LimitUp,
    VwapVeto,
}

#[derive(Debug, Clone, Default)]
pub struct FilterDiagnostics {
    pub pass_counts: Vec<(FilterRule, usize)>,
    pub fail_counts: Vec<(FilterRule, usize)>,
}

fn rule_passes(
    row: &ExtractedRow,
    rule: FilterRule,
    params: &PipelineParams,
    today: chrono::NaiveDate,
    regime: Regime,
) -> bool {
    match rule {
        FilterRule::MinChangePct => {
            let (lo, hi) = regime_change_pct_bounds(params, regime);
            row.change_pct >= lo && row.change_pct <= hi
        }
        FilterRule::VolRatio => row.vol_ratio_ma20 > params.vol_ratio_ma20_threshold,
        FilterRule::UpperShadow => row.upper_shadow_ratio <= params.max_upper_shadow_ratio,
        FilterRule::SupportMa => {
            let support = match params.support_ma {
                SupportMa::Ma20 => row.ma20,
                SupportMa::Ma60 => row.ma60,
            };
            support.is_none_or(|ma| row.close >= ma)
        }
        FilterRule::ListingAge => row
            .list_date
            .is_none_or(|d| (today - d).num_days() >= MIN_LISTING_AGE_DAYS),
        FilterRule::StRisk => !row.display_name.to_uppercase().contains(ST_MARKER),
        FilterRule::LimitUp => {
            let ceiling = if row.is_star_market || row.is_gem {
                STAR_GEM_LIMIT_UP
            } else {
                MAIN_BOARD_LIMIT_UP
            };
            row.change_pct < ceiling
        }
        FilterRule::VwapVeto => row.close >= row.vwap,
    }
}

/// Regime-adjusted `change_pct` bounds (spec.md §4.7.5); `Balance` and
/// non-regime models use the baseline `min_change_pct` with no upper cap.
fn regime_change_pct_bounds(params: &PipelineParams, regime: Regime) -> (f64, f64) {
    match regime {
        Regime::Attack if params.model_version.uses_regime_adapter() => (3.0, 9.0),
        Regime::Defense if params.model_version.uses_regime_adapter() => (f64::MIN, 4.0),
        _ => (params.min_change_pct, f64::MAX),
    }
}

/// Defense-regime guard (spec.md §4.7.5): requires a bias or RSI oversold
/// signal, AND excludes tickers whose ATR is already too wide relative to
/// price (volatility already elevated beyond a Defense entry's comfort).
fn defense_extra_ok(row: &ExtractedRow) -> bool {
    let oversold = row.bias_20 < -8.0 || row.rsi_6.is_some_and(|v| v < 25.0);
    let atr_ratio = row.atr / row.close.max(f64::EPSILON) * 100.0;
    oversold && atr_ratio <= 5.0
}

/// Applies every rule in order; returns the surviving rows plus
/// diagnostics. When regime adaptation is active and `regime == Defense`,
/// an extra bias/ATR guard runs alongside the baseline rules.
pub fn apply(
    rows: Vec<ExtractedRow>,
    params: &PipelineParams,
    today: chrono::NaiveDate,
    regime: Regime,
) -> (Vec<ExtractedRow>, FilterDiagnostics) {
    let mut rules = vec![
        FilterRule::MinChangePct,
        FilterRule::VolRatio,
        FilterRule::UpperShadow,
        FilterRule::SupportMa,
        FilterRule::ListingAge,
        FilterRule::StRisk,
        FilterRule::LimitUp,
    ];
    if params.model_version.uses_regime_adapter() {
        rules.push(FilterRule::VwapVeto);
    }

    let mut diagnostics = FilterDiagnostics::default();
    let mut survivors = rows;
    for rule in &rules {
        let mut pass = Vec::with_capacity(survivors.len());
        let mut fail_count = 0usize;
        for row in survivors {
            let ok = rule_passes(&row, *rule, params, today, regime)
                && (*rule != FilterRule::MinChangePct
                    || regime != Regime::Defense
                    || !params.model_version.uses_regime_adapter()
                    || defense_extra_ok(&row));
            if ok {
                pass.push(row);
            } else {
                fail_count += 1;
            }
        }
        diagnostics.pass_counts.push((*rule, pass.len()));
        diagnostics.fail_counts.push((*rule, fail_count));
        survivors = pass;
    }

    (survivors, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::ModelVersion;
    use chrono::NaiveDate;

    fn row(change_pct: f64, vol_ratio: f64, close: f64, ma20: f64) -> ExtractedRow {
        ExtractedRow {
            ticker_code: "600000".into(),
            industry_label: "tech".into(),
            list_date: Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
            display_name: "Test Co".into(),
            trade_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            close,
            high: close + 0.1,
            low: close - 0.1,
            open: close,
            volume: 1000.0,
            turnover_amount: 1.0,
            turnover_rate: 1.0,
            change_pct,
            ma20: Some(ma20),
            ma60: Some(ma20),
            rps_250: Some(90.0),
            vol_ma_5: 1000.0,
            vol_ma_20: 1000.0,
            vcp_factor: 0.3,
            vol_ratio_ma20: vol_ratio,
            upper_shadow_ratio: 0.0,
            vwap: close,
            atr: 0.2,
            bias_20: 0.0,
            is_star_market: false,
            is_gem: false,
            rsi_6: None,
            sector_resonance_score: 0.0,
        }
    }

    #[test]
    fn e2e_6_star_limit_up_excluded() {
        let mut r = row(20.0, 3.0, 30.0, 28.0);
        r.is_star_market = true;
        r.ticker_code = "688001".into();
        let params = PipelineParams::defaults(ModelVersion::T4);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (survivors, _) = apply(vec![r], &params, today, Regime::Balance);
        assert!(survivors.is_empty());
    }

    #[test]
    fn baseline_survivor_passes_all_rules() {
        let r = row(8.0, 3.0, 10.0, 9.5);
        let params = PipelineParams::defaults(ModelVersion::T4);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (survivors, _) = apply(vec![r], &params, today, Regime::Balance);
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn young_listing_fails_age_rule() {
        let mut r = row(8.0, 3.0, 10.0, 9.5);
        r.list_date = Some(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
        let params = PipelineParams::defaults(ModelVersion::T4);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (survivors, _) = apply(vec![r], &params, today, Regime::Balance);
        assert!(survivors.is_empty());
    }

    #[test]
    fn t6_vwap_veto_drops_afternoon_distribution() {
        let mut r = row(8.0, 3.0, 10.0, 9.5);
        r.vwap = 10.5; // close (10.0) < vwap
        let mut params = PipelineParams::defaults(ModelVersion::T6);
        params.model_version = ModelVersion::T6;
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (survivors, _) = apply(vec![r], &params, today, Regime::Balance);
        assert!(survivors.is_empty());
    }

    #[test]
    fn attack_regime_widens_change_pct_band() {
        let r = row(4.0, 3.0, 10.0, 9.5); // below T4's default 7.0 floor
        let params = PipelineParams::defaults(ModelVersion::T6);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (survivors, _) = apply(vec![r], &params, today, Regime::Attack);
        assert_eq!(survivors.len(), 1);
    }
}
