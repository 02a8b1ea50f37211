//! Row types for the feature-store schema (spec.md §3). Vendor adapters
//! (§4.2) produce these directly; repositories persist them verbatim.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub ticker_code: String,
    pub display_name: String,
    pub listing_market: String,
    pub industry_label: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub active_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DailyBar {
    pub ticker_code: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub turnover_amount: f64,
    pub turnover_rate: f64,
    pub change_pct: f64,
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma30: Option<f64>,
    pub ma60: Option<f64>,
    pub rps_250: Option<f64>,
    pub vcp_factor: Option<f64>,
    pub vol_ma_5: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MoneyFlow {
    pub ticker_code: String,
    pub trade_date: NaiveDate,
    pub main_net: f64,
    pub super_large_net: f64,
    pub large_net: f64,
    pub medium_net: f64,
    pub small_net: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SectorFlow {
    pub sector_name: String,
    pub trade_date: NaiveDate,
    pub main_net: f64,
    pub super_large_net: f64,
    pub large_net: f64,
    pub medium_net: f64,
    pub small_net: f64,
    pub change_pct: Option<f64>,
    pub avg_turnover: Option<f64>,
    pub limit_up_count: Option<i64>,
    pub sector_rps_20: Option<f64>,
    pub sector_rps_50: Option<f64>,
    pub sector_ma_status: i32,
    pub top_weight_stocks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotRankSource {
    Xueqiu,
    Dongcai,
}

impl HotRankSource {
    pub fn as_str(self) -> &'static str {
        match self {
            HotRankSource::Xueqiu => "xueqiu",
            HotRankSource::Dongcai => "dongcai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "xueqiu" => Some(HotRankSource::Xueqiu),
            "dongcai" => Some(HotRankSource::Dongcai),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotRankEntry {
    pub ticker_code: String,
    pub source: HotRankSource,
    pub trade_date: NaiveDate,
    pub rank: i32,
    pub hot_score: f64,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub concept_id: i64,
    pub concept_name: String,
    pub concept_code: Option<String>,
    pub origin_source: String,
    pub active_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMembership {
    pub ticker_code: String,
    pub concept_id: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualBoardMapping {
    pub id: i64,
    pub virtual_board_name: String,
    pub source_concept_name: String,
    pub weight: f64,
    pub active_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MarketIndexDaily {
    pub index_code: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub amount: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    Success,
    Fail,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Success => "success",
            VerificationStatus::Fail => "fail",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VerificationStatus::Pending),
            "success" => Some(VerificationStatus::Success),
            "fail" => Some(VerificationStatus::Fail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    pub user_id: String,
    pub run_date: NaiveDate,
    pub ticker_code: String,
    pub params_snapshot: serde_json::Value,
    pub entry_price: f64,
    pub stop_loss_price: Option<f64>,
    pub ai_score: f64,
    pub win_probability: f64,
    pub reason_tags: Vec<String>,
    pub strategy_version: String,
    pub verification_status: VerificationStatus,
    pub max_return_5d: Option<f64>,
    pub final_return_5d: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextDayPredictionCache {
    pub target_date: NaiveDate,
    pub prediction_payload: serde_json::Value,
    pub created_at: chrono::NaiveDateTime,
}
