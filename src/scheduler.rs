//! Ingestion scheduler (spec.md §4.6, §9 "Scheduler model", component C6).
//!
//! Jobs are `(schedule, handler, mode)` records fired from a single loop
//! onto a bounded worker pool, the way spec.md §9 asks for: *coalescing*
//! jobs drop an overlapping firing rather than queueing it; *offloaded*
//! jobs are handed to `tokio::spawn` and the loop moves on immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use tokio::sync::Mutex;

use crate::calendar::{Calendar, CalendarSource};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    /// An overlapping firing is dropped; the next quorum-checked firing
    /// repairs whatever was missed.
    Coalescing,
    /// Detached onto the worker pool; the scheduler loop never waits on it.
    Offloaded,
}

#[derive(Debug, Clone)]
pub enum Schedule {
    EveryMinutes(i64),
    DailyAt(NaiveTime),
    OnProcessStart,
}

impl Schedule {
    fn is_due(&self, now: NaiveDateTime, last_fired: Option<NaiveDateTime>) -> bool {
        match self {
            Schedule::EveryMinutes(n) => match last_fired {
                None => true,
                Some(last) => now - last >= chrono::Duration::minutes(*n),
            },
            Schedule::DailyAt(t) => {
                let already_fired_today = last_fired.is_some_and(|last| last.date() == now.date());
                !already_fired_today && now.time() >= *t
            }
            Schedule::OnProcessStart => last_fired.is_none(),
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, store: &Store) -> anyhow::Result<()>;
}

struct Job {
    name: &'static str,
    schedule: Schedule,
    mode: JobMode,
    handler: Arc<dyn JobHandler>,
    last_fired: Mutex<Option<NaiveDateTime>>,
    running: Arc<AtomicBool>,
    /// Only `realtime` is gated on trading hours per spec.md §4.6's table;
    /// every other job fires on its own schedule regardless.
    requires_trading_hours: bool,
}

pub struct Scheduler<S: CalendarSource> {
    store: Arc<Store>,
    calendar: Arc<Calendar<S>>,
    jobs: Vec<Job>,
}

impl<S: CalendarSource> Scheduler<S> {
    pub fn new(store: Arc<Store>, calendar: Arc<Calendar<S>>) -> Self {
        Self {
            store,
            calendar,
            jobs: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &'static str,
        schedule: Schedule,
        mode: JobMode,
        requires_trading_hours: bool,
        handler: Arc<dyn JobHandler>,
    ) {
        self.jobs.push(Job {
            name,
            schedule,
            mode,
            handler,
            last_fired: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            requires_trading_hours,
        });
    }

    /// One scheduler tick: check every job's schedule against `now` and
    /// fire the due ones. Call this from a `tokio::time::interval` loop.
    pub async fn tick(&self, now: NaiveDateTime) {
        for job in &self.jobs {
            if job.requires_trading_hours && !self.calendar.is_trading_hours(now) {
                continue;
            }
            let mut last_fired = job.last_fired.lock().await;
            if !job.schedule.is_due(now, *last_fired) {
                continue;
            }
            if job.running.load(Ordering::Acquire) {
                tracing::warn!(job = job.name, "firing overrun previous run, coalescing");
                continue;
            }
            *last_fired = Some(now);
            drop(last_fired);
            self.fire(job).await;
        }
    }

    async fn fire(&self, job: &Job) {
        job.running.store(true, Ordering::Release);
        let handler = job.handler.clone();
        let store = self.store.clone();
        let running = job.running.clone();
        let name = job.name;
        let run = async move {
            if let Err(err) = handler.run(&store).await {
                tracing::warn!(job = name, error = %err, "job failed");
            }
            running.store(false, Ordering::Release);
        };
        match job.mode {
            JobMode::Offloaded => {
                tokio::spawn(run);
            }
            JobMode::Coalescing => run.await,
        }
    }
}

/// Supplemented feature, grounded on the data-gap checker in the Python
/// original: per trading day in the last `lookback_days`, count distinct
/// tickers with a `daily_bar` row; a day below `min_quorum_fraction` of
/// the active universe is flagged as needing a catch-up fill.
pub fn gap_scan(
    store: &Store,
    trading_days: &[NaiveDate],
    active_ticker_count: usize,
    min_quorum_fraction: f64,
) -> anyhow::Result<Vec<NaiveDate>> {
    let mut gaps = Vec::new();
    if active_ticker_count == 0 {
        return Ok(gaps);
    }
    for &day in trading_days {
        let present = store.daily_bars_for_date(day)?.len();
        let fraction = present as f64 / active_ticker_count as f64;
        if fraction < min_quorum_fraction {
            gaps.push(day);
        }
    }
    Ok(gaps)
}

/// Current local time truncated to second precision, used as the `now`
/// fed into `Scheduler::tick` by the process's main loop.
pub fn now_naive() -> NaiveDateTime {
    Local::now().naive_local()
}
