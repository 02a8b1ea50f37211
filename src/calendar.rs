//! Trading calendar (spec.md §4.1, component C1).
//!
//! Loads the vendor-provided trading-day list once per process-local day
//! (or on explicit refresh) and derives every predicate from that cached
//! list. On load failure, predicates degrade gracefully rather than
//! raising: `is_trading_day` falls back to "not Saturday/Sunday" and
//! `last_trading_day` searches back up to 7 calendar days.

use std::sync::Mutex;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

/// Morning and afternoon trading sessions, local exchange time.
const MORNING: (NaiveTime, NaiveTime) = (
    NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
    NaiveTime::from_hms_opt(11, 30, 0).expect("valid time"),
);
const AFTERNOON: (NaiveTime, NaiveTime) = (
    NaiveTime::from_hms_opt(13, 0, 0).expect("valid time"),
    NaiveTime::from_hms_opt(15, 0, 0).expect("valid time"),
);

/// A source of the vendor's trading-day list. Production wires this to a
/// vendor adapter; tests wire in a fixed list or a failing stub.
pub trait CalendarSource: Send + Sync {
    /// Returns the full known trading-day list, sorted ascending.
    fn fetch_trading_days(&self) -> anyhow::Result<Vec<NaiveDate>>;
}

struct CachedCalendar {
    loaded_on: NaiveDate,
    days: Vec<NaiveDate>,
}

pub struct Calendar<S: CalendarSource> {
    source: S,
    cache: Mutex<Option<CachedCalendar>>,
}

impl<S: CalendarSource> Calendar<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: Mutex::new(None),
        }
    }

    /// Force a reload regardless of the cache's age.
    pub fn refresh(&self, today: NaiveDate) {
        let mut guard = self.cache.lock().expect("calendar cache lock poisoned");
        *guard = self.load(today);
    }

    fn load(&self, today: NaiveDate) -> Option<CachedCalendar> {
        match self.source.fetch_trading_days() {
            Ok(mut days) => {
                days.sort_unstable();
                Some(CachedCalendar {
                    loaded_on: today,
                    days,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "trading calendar load failed, falling back to weekday heuristic");
                None
            }
        }
    }

    /// Ensures the cache is populated for `today`, reloading once per
    /// process-local day.
    fn ensure_loaded(&self, today: NaiveDate) {
        let needs_load = {
            let guard = self.cache.lock().expect("calendar cache lock poisoned");
            match guard.as_ref() {
                Some(c) => c.loaded_on != today,
                None => true,
            }
        };
        if needs_load {
            let loaded = self.load(today);
            let mut guard = self.cache.lock().expect("calendar cache lock poisoned");
            *guard = loaded;
        }
    }

    pub fn is_trading_day(&self, d: NaiveDate) -> bool {
        self.ensure_loaded(d);
        let guard = self.cache.lock().expect("calendar cache lock poisoned");
        match guard.as_ref() {
            Some(c) => c.days.binary_search(&d).is_ok(),
            None => !matches!(d.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }

    pub fn last_trading_day(&self, d: NaiveDate) -> Option<NaiveDate> {
        self.ensure_loaded(d);
        let guard = self.cache.lock().expect("calendar cache lock poisoned");
        if let Some(c) = guard.as_ref() {
            return c.days.iter().rev().find(|&&day| day <= d).copied();
        }
        drop(guard);
        // Fallback: search back up to 7 calendar days using the weekday heuristic.
        let mut cursor = d;
        for _ in 0..7 {
            if !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
                return Some(cursor);
            }
            cursor = cursor.pred_opt()?;
        }
        None
    }

    pub fn next_trading_day(&self, d: NaiveDate) -> Option<NaiveDate> {
        self.ensure_loaded(d);
        let guard = self.cache.lock().expect("calendar cache lock poisoned");
        if let Some(c) = guard.as_ref() {
            return c.days.iter().find(|&&day| day > d).copied();
        }
        drop(guard);
        let mut cursor = d;
        for _ in 0..7 {
            cursor = cursor.succ_opt()?;
            if !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
                return Some(cursor);
            }
        }
        None
    }

    pub fn trading_days_in(&self, a: NaiveDate, b: NaiveDate) -> Vec<NaiveDate> {
        self.ensure_loaded(b);
        let guard = self.cache.lock().expect("calendar cache lock poisoned");
        if let Some(c) = guard.as_ref() {
            return c
                .days
                .iter()
                .filter(|&&d| d >= a && d <= b)
                .copied()
                .collect();
        }
        drop(guard);
        let mut out = Vec::new();
        let mut cursor = a;
        while cursor <= b {
            if !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
                out.push(cursor);
            }
            match cursor.succ_opt() {
                Some(next) => cursor = next,
                None => break,
            }
        }
        out
    }

    /// Trading day AND within [09:30, 11:30] ∪ [13:00, 15:00] local.
    pub fn is_trading_hours(&self, dt: chrono::NaiveDateTime) -> bool {
        if !self.is_trading_day(dt.date()) {
            return false;
        }
        let t = dt.time();
        (t >= MORNING.0 && t <= MORNING.1) || (t >= AFTERNOON.0 && t <= AFTERNOON.1)
    }
}
