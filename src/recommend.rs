//! Flow-based recommendation reads (spec.md §6 "Flow recommendations"):
//! capital-inflow screening and clustered sector money-flow ranking. Both
//! sit directly on the feature store with no alpha-pipeline involvement.

use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveDate;
use rustc_hash::FxHashSet;

use crate::calendar::{Calendar, CalendarSource};
use crate::cluster::{cluster_sectors, ClusteredSector, SectorCandidate, SectorMembership};
use crate::store::Store;

/// Tickers whose `main_net > 0` on every one of the last `days` trading
/// days up to and including `as_of` (spec.md §6, E2E-4). A ticker missing a
/// row on any of those days is excluded along with one whose flow ever
/// turns negative.
pub fn capital_inflow_candidates(
    store: &Store,
    calendar: &Calendar<impl CalendarSource>,
    as_of: NaiveDate,
    days: usize,
) -> Result<Vec<String>> {
    let window = calendar.trading_days_in(as_of - chrono::Duration::days(days as i64 * 2), as_of);
    let window: Vec<NaiveDate> = window.into_iter().rev().take(days).collect();
    if window.len() < days {
        return Ok(Vec::new());
    }
    let window: HashSet<NaiveDate> = window.into_iter().collect();

    let mut out = Vec::new();
    for t in store.all_active_tickers()? {
        let flows = store.recent_money_flow(&t.ticker_code, days)?;
        if flows.len() != days {
            continue;
        }
        let covers_window = flows.iter().all(|f| window.contains(&f.trade_date));
        let all_positive = flows.iter().all(|f| f.main_net > 0.0);
        if covers_window && all_positive {
            out.push(t.ticker_code);
        }
    }
    Ok(out)
}

struct StoreSectorMembership<'a>(&'a Store);

impl SectorMembership for StoreSectorMembership<'_> {
    fn full_members(&self, sector_name: &str) -> FxHashSet<String> {
        let Ok(concepts) = self.0.all_active_concepts() else {
            return FxHashSet::default();
        };
        let Some(concept) = concepts.into_iter().find(|c| c.concept_name == sector_name) else {
            return FxHashSet::default();
        };
        self.0
            .tickers_for_concept(concept.concept_id)
            .map(|members| members.into_iter().map(|m| m.ticker_code).collect())
            .unwrap_or_default()
    }
}

/// Top sectors by cumulative `main_net` over the last `days` trading days,
/// clustered to collapse near-synonymous sectors (spec.md §6, E2E-2),
/// capped at `limit` (≤ 30 per the external contract).
pub fn sector_money_flow_recommend(
    store: &Store,
    as_of: NaiveDate,
    days: usize,
    limit: usize,
) -> Result<Vec<ClusteredSector>> {
    let sector_names: HashSet<String> = store
        .sector_flow_for_date(as_of)?
        .into_iter()
        .map(|f| f.sector_name)
        .collect();

    let mut candidates = Vec::new();
    for name in sector_names {
        let history = store.recent_sector_flow(&name, days)?;
        if history.is_empty() {
            continue;
        }
        let cumulative_main_net: f64 = history.iter().map(|f| f.main_net).sum();
        let top5 = history.last().map(|f| f.top_weight_stocks.clone()).unwrap_or_default();
        candidates.push(SectorCandidate {
            name,
            score: cumulative_main_net,
            top5,
        });
    }

    let membership = StoreSectorMembership(store);
    let mut clustered = cluster_sectors(candidates, &membership);
    clustered.truncate(limit.min(30));
    Ok(clustered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{MoneyFlow, SectorFlow};

    struct FixedCalendar(Vec<NaiveDate>);
    impl CalendarSource for FixedCalendar {
        fn fetch_trading_days(&self) -> anyhow::Result<Vec<NaiveDate>> {
            Ok(self.0.clone())
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn consecutive_days(start: NaiveDate, n: i64) -> Vec<NaiveDate> {
        (0..n).map(|i| start + chrono::Duration::days(i)).collect()
    }

    fn flow(code: &str, date: NaiveDate, main_net: f64) -> MoneyFlow {
        MoneyFlow {
            ticker_code: code.to_string(),
            trade_date: date,
            main_net,
            super_large_net: main_net * 0.5,
            large_net: main_net * 0.5,
            medium_net: 0.0,
            small_net: 0.0,
        }
    }

    #[test]
    fn e2e_4_all_positive_inflow_qualifies() {
        let store = Store::open_in_memory().unwrap();
        let days = consecutive_days(d(2024, 1, 1), 10);
        let calendar = Calendar::new(FixedCalendar(days.clone()));
        let as_of = days[6];

        let window = &days[2..7];
        let rows: Vec<MoneyFlow> = window.iter().map(|&date| flow("000001", date, 10.0)).collect();
        store.upsert_money_flow(&rows).unwrap();

        let got = capital_inflow_candidates(&store, &calendar, as_of, 5).unwrap();
        assert_eq!(got, vec!["000001".to_string()]);
    }

    #[test]
    fn e2e_4_one_negative_day_disqualifies() {
        let store = Store::open_in_memory().unwrap();
        let days = consecutive_days(d(2024, 1, 1), 10);
        let calendar = Calendar::new(FixedCalendar(days.clone()));
        let as_of = days[6];

        let window = &days[2..7];
        let mut rows: Vec<MoneyFlow> = window.iter().map(|&date| flow("000001", date, 10.0)).collect();
        rows[2].main_net = -5.0;
        store.upsert_money_flow(&rows).unwrap();

        let got = capital_inflow_candidates(&store, &calendar, as_of, 5).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn sector_recommend_ranks_by_cumulative_main_net() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store
            .upsert_sector_flow(&[
                SectorFlow {
                    sector_name: "semiconductors".into(),
                    trade_date: date,
                    main_net: 500.0,
                    top_weight_stocks: vec!["600000".into()],
                    ..Default::default()
                },
                SectorFlow {
                    sector_name: "banks".into(),
                    trade_date: date,
                    main_net: 100.0,
                    top_weight_stocks: vec!["000001".into()],
                    ..Default::default()
                },
            ])
            .unwrap();

        let got = sector_money_flow_recommend(&store, date, 1, 30).unwrap();
        assert_eq!(got[0].name, "semiconductors");
    }

    #[test]
    fn sector_recommend_caps_at_limit() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        let rows: Vec<SectorFlow> = (0..5)
            .map(|i| SectorFlow {
                sector_name: format!("sector_{i}"),
                trade_date: date,
                main_net: i as f64,
                top_weight_stocks: vec![format!("60000{i}")],
                ..Default::default()
            })
            .collect();
        store.upsert_sector_flow(&rows).unwrap();

        let got = sector_money_flow_recommend(&store, date, 1, 3).unwrap();
        assert_eq!(got.len(), 3);
    }
}
