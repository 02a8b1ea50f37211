//! Market-regime detection (spec.md §4.7.5, T6/T7 only).
//!
//! RSRS: ordinary least squares of `index_high` on `index_low` over an
//! 18-trading-day window, z-scored against the rolling mean/std of β over
//! up to 30 trailing windows.

use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;

use crate::store::models::MarketIndexDaily;

pub const OLS_WINDOW: usize = 18;
pub const ROLLING_WINDOWS: usize = 30;
const ATTACK_Z: f64 = 0.7;
const DEFENSE_Z: f64 = -0.7;
const MIN_WINDOWS_FOR_Z_SCORE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Attack,
    Defense,
    Balance,
}

impl Regime {
    pub fn as_str(self) -> &'static str {
        match self {
            Regime::Attack => "attack",
            Regime::Defense => "defense",
            Regime::Balance => "balance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeResult {
    pub regime: Regime,
    pub z_score: f64,
    pub beta: f64,
}

/// OLS slope of `y = alpha + beta*x` via the normal equations, solved with
/// `nalgebra`. Returns `None` when fewer than 2 points or `x` has zero
/// variance.
fn ols_beta(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { x[r] });
    let target = DVector::from_row_slice(y);
    let xtx = design.transpose() * &design;
    let xty = design.transpose() * target;
    let solved = xtx.try_inverse()? * xty;
    Some(solved[1])
}

/// Rolling betas computed from successive `OLS_WINDOW`-sized slices of
/// `(index_low, index_high)`, most recent last.
fn rolling_betas(index_low: &[f64], index_high: &[f64]) -> Vec<f64> {
    if index_low.len() < OLS_WINDOW {
        return Vec::new();
    }
    let mut betas = Vec::new();
    let n = index_low.len();
    let start = n.saturating_sub(OLS_WINDOW + ROLLING_WINDOWS - 1);
    let mut i = start;
    while i + OLS_WINDOW <= n {
        let x = &index_low[i..i + OLS_WINDOW];
        let y = &index_high[i..i + OLS_WINDOW];
        if let Some(beta) = ols_beta(x, y) {
            betas.push(beta);
        }
        i += 1;
    }
    betas
}

/// `history` ascending by `trade_date`, most recent last. Returns
/// `Regime::Balance` with `z_score = 0.0` when there isn't enough history
/// to run the OLS window at all.
pub fn detect_regime(history: &[MarketIndexDaily]) -> RegimeResult {
    let highs: Vec<f64> = history.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = history.iter().map(|b| b.low).collect();
    let betas = rolling_betas(&lows, &highs);

    if betas.is_empty() {
        return RegimeResult {
            regime: Regime::Balance,
            z_score: 0.0,
            beta: 1.0,
        };
    }

    let current_beta = *betas.last().unwrap();
    let z = if betas.len() >= MIN_WINDOWS_FOR_Z_SCORE {
        let m = (&betas[..]).mean();
        let sd = (&betas[..]).std_dev();
        if sd > 0.0 {
            (current_beta - m) / sd
        } else {
            0.0
        }
    } else {
        // Open question (spec.md §9): pragmatic surrogate below the
        // minimum rolling-window count.
        (current_beta - 1.0) * 10.0
    };

    let regime = if z > ATTACK_Z {
        Regime::Attack
    } else if z < DEFENSE_Z {
        Regime::Defense
    } else {
        Regime::Balance
    };

    RegimeResult {
        regime,
        z_score: z,
        beta: current_beta,
    }
}
