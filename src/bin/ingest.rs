//! CLI entrypoint wiring config + store + vendor adapters together.
//!
//! ```text
//! falcon-radar-ingest --mode=cold_start [--days=N]
//! falcon-radar-ingest --mode=patch --target=<sector_rps|sector_change_pct|rps_250|vcp_factor|vol_ma_5|ma> --days=N
//! ```
//!
//! No CLI-parsing crate: two flags, parsed by hand off `std::env::args()`.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use falcon_radar::config::Config;
use falcon_radar::metrics::sector::{cumulative_return_pct, percentile_rank, sector_ma_status};
use falcon_radar::metrics::ticker::{compute_rps_250, compute_ticker_metrics, trailing_return_250};
use falcon_radar::store::Store;
use falcon_radar::vendor::client::VendorClient;
use falcon_radar::vendor::concept::{ConceptAdapter, HttpConceptAdapter};
use falcon_radar::vendor::daily_bars::{DailyBarAdapter, HttpDailyBarAdapter};
use falcon_radar::vendor::fundamentals::{FundamentalsAdapter, HttpFundamentalsAdapter};
use falcon_radar::vendor::index_daily::{HttpIndexDailyAdapter, IndexDailyAdapter};
use falcon_radar::store::models::MoneyFlow;
use falcon_radar::vendor::money_flow::{HttpMoneyFlowAdapter, MoneyFlowAdapter};
use falcon_radar::vendor::sector_flow::synthesize_sector_flow;

const DEFAULT_COLD_START_DAYS: i64 = 400;

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    ColdStart { days: i64 },
    Patch { target: PatchTarget, days: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchTarget {
    SectorRps,
    SectorChangePct,
    Rps250,
    VcpFactor,
    VolMa5,
    Ma,
}

impl PatchTarget {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "sector_rps" => Some(Self::SectorRps),
            "sector_change_pct" => Some(Self::SectorChangePct),
            "rps_250" => Some(Self::Rps250),
            "vcp_factor" => Some(Self::VcpFactor),
            "vol_ma_5" => Some(Self::VolMa5),
            "ma" => Some(Self::Ma),
            _ => None,
        }
    }
}

/// Parses `--key=value` flags off a raw argument list (argv[0] already
/// excluded by the caller).
fn parse_args(args: &[String]) -> anyhow::Result<Mode> {
    let mut flags: HashMap<String, String> = HashMap::new();
    for arg in args {
        let Some(rest) = arg.strip_prefix("--") else {
            anyhow::bail!("unrecognized argument: {arg}");
        };
        let (key, value) = rest.split_once('=').ok_or_else(|| anyhow::anyhow!("flag {arg} must be --key=value"))?;
        flags.insert(key.to_string(), value.to_string());
    }

    let mode = flags.get("mode").ok_or_else(|| anyhow::anyhow!("missing required --mode"))?;
    match mode.as_str() {
        "cold_start" => {
            let days = flags
                .get("days")
                .map(|v| v.parse::<i64>())
                .transpose()?
                .unwrap_or(DEFAULT_COLD_START_DAYS);
            Ok(Mode::ColdStart { days })
        }
        "patch" => {
            let target_str = flags.get("target").ok_or_else(|| anyhow::anyhow!("--mode=patch requires --target"))?;
            let target = PatchTarget::parse(target_str)
                .ok_or_else(|| anyhow::anyhow!("unknown --target={target_str}"))?;
            let days = flags
                .get("days")
                .ok_or_else(|| anyhow::anyhow!("--mode=patch requires --days"))?
                .parse()?;
            Ok(Mode::Patch { target, days })
        }
        other => anyhow::bail!("unknown --mode={other}, expected cold_start or patch"),
    }
}

fn new_vendor_client(config: &Config) -> anyhow::Result<VendorClient> {
    VendorClient::new(config.vendor_base_url.clone(), config.vendor_min_request_interval())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = parse_args(&args)?;

    let config = Config::from_env();
    let store = Store::open(&config.database_path)?;

    let fundamentals = HttpFundamentalsAdapter::new(new_vendor_client(&config)?);
    let daily_bars = HttpDailyBarAdapter::new(new_vendor_client(&config)?);
    let index_daily = HttpIndexDailyAdapter::new(new_vendor_client(&config)?);
    let concepts = HttpConceptAdapter::new(new_vendor_client(&config)?);
    let money_flow = HttpMoneyFlowAdapter::new(new_vendor_client(&config)?);

    match mode {
        Mode::ColdStart { days } => {
            cold_start(&store, &fundamentals, &daily_bars, &index_daily, &concepts, &money_flow, &config, days).await?;
        }
        Mode::Patch { target, days } => {
            patch(&store, target, days)?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cold_start(
    store: &Store,
    fundamentals: &dyn FundamentalsAdapter,
    daily_bars: &dyn DailyBarAdapter,
    index_daily: &dyn IndexDailyAdapter,
    concepts: &dyn ConceptAdapter,
    money_flow: &dyn MoneyFlowAdapter,
    config: &Config,
    days: i64,
) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let start = today - Duration::days(days);

    tracing::info!(days, "cold start: syncing ticker universe");
    let universe = fundamentals.fetch_universe().await;
    for t in &universe {
        store.upsert_ticker(t)?;
    }

    tracing::info!(index_code = %config.rsrs_index_code, "cold start: backfilling broad-market index history");
    let index_history = index_daily.fetch_index_daily(&config.rsrs_index_code, start, today).await;
    store.upsert_market_index_daily(&index_history)?;

    tracing::info!(n = universe.len(), "cold start: backfilling per-ticker daily bars");
    let mut latest_flow_by_ticker: HashMap<String, MoneyFlow> = HashMap::new();
    for t in &universe {
        let bars = daily_bars.fetch_daily_bars(&t.ticker_code, start, today).await;
        if !bars.is_empty() {
            store.upsert_daily_bars(&bars)?;
        }
        let flows = money_flow.fetch_money_flow(&t.ticker_code, start, today).await;
        if !flows.is_empty() {
            store.upsert_money_flow(&flows)?;
        }
        if let Some(latest) = flows.into_iter().find(|f| f.trade_date == today) {
            latest_flow_by_ticker.insert(t.ticker_code.clone(), latest);
        }
    }

    tracing::info!("cold start: syncing concept universe and membership");
    for vendor_concept in concepts.fetch_concept_list().await {
        if config.concept_blacklist.iter().any(|b| b == &vendor_concept.concept_name) {
            continue;
        }
        let concept_id = store.upsert_concept(&vendor_concept.concept_name, vendor_concept.concept_code.as_deref(), "vendor")?;
        let members = concepts.fetch_concept_constituents(&vendor_concept.concept_name).await;
        if !members.is_empty() {
            store.replace_concept_membership(concept_id, &members)?;
        }

        let member_flows: Vec<MoneyFlow> = members
            .iter()
            .filter_map(|(ticker_code, _)| latest_flow_by_ticker.get(ticker_code).cloned())
            .collect();
        if let Some(sector_flow) = synthesize_sector_flow(&vendor_concept.concept_name, today, &member_flows) {
            store.upsert_sector_flow(&[sector_flow])?;
        }
    }

    tracing::info!("cold start: recomputing derived ticker metrics for the most recent trading day");
    recompute_ticker_metrics_for_day(store, today)?;
    recompute_sector_metrics_for_day(store, today)?;

    tracing::info!("cold start complete");
    Ok(())
}

fn patch(store: &Store, target: PatchTarget, days: i64) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    tracing::info!(?target, days, "patch: recomputing derived metric over trailing window");

    for offset in 0..days {
        let day = today - Duration::days(offset);
        match target {
            PatchTarget::Ma | PatchTarget::VcpFactor | PatchTarget::VolMa5 | PatchTarget::Rps250 => {
                recompute_ticker_metrics_for_day(store, day)?;
            }
            PatchTarget::SectorRps | PatchTarget::SectorChangePct => {
                recompute_sector_metrics_for_day(store, day)?;
            }
        }
    }

    tracing::info!("patch complete");
    Ok(())
}

/// Recomputes moving averages, VCP, 5-row volume MA, and the
/// cross-sectional RPS-250 rank for every active ticker's row on `day`
/// (spec.md §4.4/§4.6 `daily_close` job).
fn recompute_ticker_metrics_for_day(store: &Store, day: NaiveDate) -> anyhow::Result<()> {
    let tickers = store.all_active_tickers()?;
    let mut returns = Vec::new();

    for t in &tickers {
        let history = store.recent_daily_bars(&t.ticker_code, 260)?;
        if history.last().map(|b| b.trade_date) != Some(day) {
            continue;
        }
        if let Some(ret) = trailing_return_250(&history) {
            returns.push((t.ticker_code.clone(), ret));
        }
    }
    let ranked = compute_rps_250(&returns);
    let rps_by_ticker: HashMap<String, f64> = ranked.into_iter().collect();

    for t in &tickers {
        let history = store.recent_daily_bars(&t.ticker_code, 260)?;
        if history.last().map(|b| b.trade_date) != Some(day) {
            continue;
        }
        let metrics = compute_ticker_metrics(&history);
        store.update_daily_bar_metrics(
            &t.ticker_code,
            day,
            metrics.ma5,
            metrics.ma10,
            metrics.ma20,
            metrics.ma30,
            metrics.ma60,
            rps_by_ticker.get(&t.ticker_code).copied(),
            metrics.vcp_factor,
            metrics.vol_ma_5,
        )?;
    }
    Ok(())
}

/// Recomputes sector-level RPS, MA-status, and member-derived aggregate
/// fields for every sector with a flow row on `day`.
fn recompute_sector_metrics_for_day(store: &Store, day: NaiveDate) -> anyhow::Result<()> {
    let sector_rows = store.sector_flow_for_date(day)?;
    if sector_rows.is_empty() {
        return Ok(());
    }

    let mut cumulative_returns = Vec::new();
    for row in &sector_rows {
        let history = store.recent_sector_flow(&row.sector_name, 20)?;
        let change_pcts: Vec<f64> = history.iter().filter_map(|f| f.change_pct).collect();
        cumulative_returns.push((row.sector_name.clone(), cumulative_return_pct(&change_pcts)));
    }
    let universe: Vec<f64> = cumulative_returns.iter().map(|(_, r)| *r).collect();

    for (sector_name, ret) in &cumulative_returns {
        let rps_20 = percentile_rank(*ret, &universe);
        let history = store.recent_sector_flow(sector_name, 50)?;
        let change_pcts: Vec<f64> = history.iter().filter_map(|f| f.change_pct).collect();
        let ma_status = sector_ma_status(&change_pcts);
        store.update_sector_metrics(sector_name, day, Some(rps_20), Some(rps_20), ma_status)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_defaults_days_when_unspecified() {
        let mode = parse_args(&["--mode=cold_start".to_string()]).unwrap();
        assert_eq!(mode, Mode::ColdStart { days: DEFAULT_COLD_START_DAYS });
    }

    #[test]
    fn cold_start_accepts_explicit_days() {
        let mode = parse_args(&["--mode=cold_start".to_string(), "--days=30".to_string()]).unwrap();
        assert_eq!(mode, Mode::ColdStart { days: 30 });
    }

    #[test]
    fn patch_requires_target_and_days() {
        let err = parse_args(&["--mode=patch".to_string()]).unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn patch_parses_known_target() {
        let mode = parse_args(&[
            "--mode=patch".to_string(),
            "--target=vcp_factor".to_string(),
            "--days=5".to_string(),
        ])
        .unwrap();
        assert_eq!(mode, Mode::Patch { target: PatchTarget::VcpFactor, days: 5 });
    }

    #[test]
    fn unknown_target_is_rejected() {
        let err = parse_args(&[
            "--mode=patch".to_string(),
            "--target=bogus".to_string(),
            "--days=5".to_string(),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("unknown --target"));
    }

    #[test]
    fn missing_mode_is_rejected() {
        assert!(parse_args(&[]).is_err());
    }
}
