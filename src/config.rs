//! Process configuration, loaded from the environment.
//!
//! Mirrors the teacher's `CachedStore::from_env` shape: every field has a
//! documented default so an empty environment still boots in a degraded
//! (no vendor credentials, local sqlite file) mode.

use std::path::PathBuf;
use std::time::Duration;

/// | Env Var | Default | Purpose |
/// |---|---|---|
/// | `DATABASE_PATH` | `./falcon_radar.sqlite3` | feature-store file |
/// | `VENDOR_BASE_URL` | `https://quote.vendor.example` | quote/bar/flow endpoints |
/// | `VENDOR_RATE_LIMIT_PER_SEC` | `5` | adapter throttle |
/// | `SCHEDULER_ENABLED` | `true` | master switch for C6 |
/// | `RETENTION_DAILY_BARS_DAYS` | `1095` | N1 |
/// | `RETENTION_MONEY_FLOW_DAYS` | `1095` | N2 |
/// | `RETENTION_SECTOR_FLOW_DAYS` | `1095` | N3 |
/// | `RETENTION_HOT_RANK_DAYS` | `30` | N4 |
/// | `RSRS_INDEX_CODE` | `"000852"` | broad-market index used by the regime detector |
/// | `CONCEPT_BLACKLIST` | `""` (comma separated) | names excluded from concept sync |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub vendor_base_url: String,
    pub vendor_rate_limit_per_sec: u32,
    pub scheduler_enabled: bool,
    pub retention_daily_bars_days: i64,
    pub retention_money_flow_days: i64,
    pub retention_sector_flow_days: i64,
    pub retention_hot_rank_days: i64,
    pub rsrs_index_code: String,
    pub concept_blacklist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./falcon_radar.sqlite3"),
            vendor_base_url: "https://quote.vendor.example".to_string(),
            vendor_rate_limit_per_sec: 5,
            scheduler_enabled: true,
            retention_daily_bars_days: 1095,
            retention_money_flow_days: 1095,
            retention_sector_flow_days: 1095,
            retention_hot_rank_days: 30,
            rsrs_index_code: "000852".to_string(),
            concept_blacklist: Vec::new(),
        }
    }
}

impl Config {
    /// Load from the process environment, falling back to `.env` via
    /// `dotenvy` first (no-op if the file doesn't exist).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("DATABASE_PATH") {
            cfg.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VENDOR_BASE_URL") {
            cfg.vendor_base_url = v;
        }
        if let Ok(v) = std::env::var("VENDOR_RATE_LIMIT_PER_SEC") {
            if let Ok(n) = v.parse() {
                cfg.vendor_rate_limit_per_sec = n;
            }
        }
        if let Ok(v) = std::env::var("SCHEDULER_ENABLED") {
            cfg.scheduler_enabled = v != "0" && v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("RETENTION_DAILY_BARS_DAYS") {
            if let Ok(n) = v.parse() {
                cfg.retention_daily_bars_days = n;
            }
        }
        if let Ok(v) = std::env::var("RETENTION_MONEY_FLOW_DAYS") {
            if let Ok(n) = v.parse() {
                cfg.retention_money_flow_days = n;
            }
        }
        if let Ok(v) = std::env::var("RETENTION_SECTOR_FLOW_DAYS") {
            if let Ok(n) = v.parse() {
                cfg.retention_sector_flow_days = n;
            }
        }
        if let Ok(v) = std::env::var("RETENTION_HOT_RANK_DAYS") {
            if let Ok(n) = v.parse() {
                cfg.retention_hot_rank_days = n;
            }
        }
        if let Ok(v) = std::env::var("RSRS_INDEX_CODE") {
            cfg.rsrs_index_code = v;
        }
        if let Ok(v) = std::env::var("CONCEPT_BLACKLIST") {
            cfg.concept_blacklist = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        cfg
    }

    pub fn vendor_min_request_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.vendor_rate_limit_per_sec.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.retention_hot_rank_days < cfg.retention_daily_bars_days);
        assert!(cfg.scheduler_enabled);
    }

    #[test]
    fn rate_limit_interval_scales_inversely() {
        let mut cfg = Config::default();
        cfg.vendor_rate_limit_per_sec = 10;
        assert_eq!(cfg.vendor_min_request_interval(), Duration::from_millis(100));
    }
}
