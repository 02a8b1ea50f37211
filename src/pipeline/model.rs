//! Model-generation parameters (spec.md §4.7): T4 is the baseline funnel,
//! T6 adds regime adaptation + sector resonance + beta elasticity, T7 runs
//! the same levels as T6 (kept distinct for the backtest engine's
//! model-version labeling and any future divergence).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVersion {
    T4,
    T6,
    T7,
}

impl ModelVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelVersion::T4 => "T4",
            ModelVersion::T6 => "T6",
            ModelVersion::T7 => "T7",
        }
    }

    pub fn uses_regime_adapter(self) -> bool {
        matches!(self, ModelVersion::T6 | ModelVersion::T7)
    }

    pub fn uses_sector_resonance(self) -> bool {
        matches!(self, ModelVersion::T6 | ModelVersion::T7)
    }

    pub fn uses_beta_elasticity(self) -> bool {
        matches!(self, ModelVersion::T6 | ModelVersion::T7)
    }

    pub fn uses_star_gem_boost(self) -> bool {
        matches!(self, ModelVersion::T4)
    }
}

/// Tunable thresholds and weights, one record per pipeline call (spec.md
/// §4.7 Level 2/3 defaults). `GET /model-k/default-params` returns this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub model_version: ModelVersion,
    pub min_change_pct: f64,
    pub vol_ratio_ma20_threshold: f64,
    pub max_upper_shadow_ratio: f64,
    pub support_ma: SupportMa,
    pub rps_threshold: f64,
    pub w_tech: f64,
    pub w_trend: f64,
    pub w_hot: f64,
    pub gem_star_weight_boost: f64,
    pub ai_filter: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportMa {
    Ma20,
    Ma60,
}

impl PipelineParams {
    pub fn defaults(model_version: ModelVersion) -> Self {
        Self {
            model_version,
            min_change_pct: 7.0,
            vol_ratio_ma20_threshold: 2.5,
            max_upper_shadow_ratio: 0.10,
            support_ma: SupportMa::Ma20,
            rps_threshold: 85.0,
            w_tech: 0.4,
            w_trend: 0.4,
            w_hot: 0.2,
            gem_star_weight_boost: 1.15,
            ai_filter: true,
        }
    }
}
