//! Black-box coverage spanning the capital-inflow screen
//! (`recommend::capital_inflow_candidates`), recommendation persistence, and
//! read-triggered auto-verification (`recommendations::verify_due`) against
//! a single in-memory store — the shape of a real cold-start-to-verification
//! cycle (spec.md §8, E2E-4 and E2E-9).

use chrono::NaiveDate;

use falcon_radar::calendar::{Calendar, CalendarSource};
use falcon_radar::recommend::capital_inflow_candidates;
use falcon_radar::recommendations::verify_due;
use falcon_radar::store::models::{DailyBar, MoneyFlow, StrategyRecommendation, VerificationStatus};
use falcon_radar::store::Store;

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

fn rec(run_date: NaiveDate, ticker_code: &str, entry_price: f64) -> StrategyRecommendation {
    StrategyRecommendation {
        user_id: "u1".into(),
        run_date,
        ticker_code: ticker_code.to_string(),
        params_snapshot: serde_json::json!({"strategy": "t4"}),
        entry_price,
        stop_loss_price: Some(entry_price * 0.92),
        ai_score: 80.0,
        win_probability: 65.0,
        reason_tags: vec!["sector_resonance".into()],
        strategy_version: "t4".into(),
        verification_status: VerificationStatus::Pending,
        max_return_5d: None,
        final_return_5d: None,
    }
}

/// A ticker with five straight days of positive main-net inflow surfaces
/// from the capital-inflow screen, gets recorded as a recommendation, and
/// is auto-verified as a success once five trading days of favorable price
/// action have passed.
#[test]
fn capital_inflow_pick_is_recorded_then_auto_verified_success() {
    let store = Store::open_in_memory().unwrap();
    let days = consecutive_days(d(2024, 1, 1), 20);
    let calendar = Calendar::new(FixedCalendar(days.clone()));

    let run_date = days[6];
    let inflow_window = &days[2..7];
    let flows: Vec<MoneyFlow> = inflow_window.iter().map(|&date| flow("600000", date, 10.0)).collect();
    store.upsert_money_flow(&flows).unwrap();

    let candidates = capital_inflow_candidates(&store, &calendar, run_date, 5).unwrap();
    assert_eq!(candidates, vec!["600000".to_string()]);

    let entry_price = 10.0;
    store.insert_recommendations(&[rec(run_date, &candidates[0], entry_price)]).unwrap();

    for (i, date) in days.iter().skip(7).take(5).enumerate() {
        store
            .upsert_daily_bars(&[DailyBar {
                ticker_code: "600000".into(),
                trade_date: *date,
                close: entry_price * (1.0 + 0.02 * (i as f64 + 1.0)),
                high: entry_price * (1.0 + 0.03 * (i as f64 + 1.0)),
                ..Default::default()
            }])
            .unwrap();
    }

    let verified = verify_due(&store, &calendar, days[18]).unwrap();
    assert_eq!(verified, 1);

    let recs = store.recommendations_for_run("u1", run_date).unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].verification_status, VerificationStatus::Success);
    assert!(recs[0].final_return_5d.unwrap() > 5.0);
}

/// The same flow, but price action never clears the 5% success threshold —
/// the recommendation should verify to `Fail`, not stay pending forever.
#[test]
fn recommendation_with_weak_followthrough_verifies_as_fail() {
    let store = Store::open_in_memory().unwrap();
    let days = consecutive_days(d(2024, 1, 1), 20);
    let calendar = Calendar::new(FixedCalendar(days.clone()));

    let run_date = days[6];
    let entry_price = 10.0;
    store.insert_recommendations(&[rec(run_date, "600000", entry_price)]).unwrap();

    for date in days.iter().skip(7).take(5) {
        store
            .upsert_daily_bars(&[DailyBar {
                ticker_code: "600000".into(),
                trade_date: *date,
                close: entry_price * 1.01,
                high: entry_price * 1.01,
                ..Default::default()
            }])
            .unwrap();
    }

    let verified = verify_due(&store, &calendar, days[18]).unwrap();
    assert_eq!(verified, 1);

    let recs = store.recommendations_for_run("u1", run_date).unwrap();
    assert_eq!(recs[0].verification_status, VerificationStatus::Fail);
}
