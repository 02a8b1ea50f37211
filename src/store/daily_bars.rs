use chrono::NaiveDate;
use rusqlite::params;

use super::{Store, LARGE_BATCH_SIZE};
use crate::error::StoreError;
use crate::store::models::DailyBar;

impl Store {
    /// Batched insert-or-replace-on-conflict(pk) upsert (spec.md §4.3).
    /// Safe to run the same batch twice: the second run rewrites the same
    /// rows rather than duplicating them.
    pub fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        for chunk in bars.chunks(LARGE_BATCH_SIZE) {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO daily_bar
                        (ticker_code, trade_date, open, close, high, low, volume,
                         turnover_amount, turnover_rate, change_pct,
                         ma5, ma10, ma20, ma30, ma60, rps_250, vcp_factor, vol_ma_5)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
                     ON CONFLICT(ticker_code, trade_date) DO UPDATE SET
                        open=excluded.open, close=excluded.close, high=excluded.high,
                        low=excluded.low, volume=excluded.volume,
                        turnover_amount=excluded.turnover_amount,
                        turnover_rate=excluded.turnover_rate, change_pct=excluded.change_pct,
                        ma5=excluded.ma5, ma10=excluded.ma10, ma20=excluded.ma20,
                        ma30=excluded.ma30, ma60=excluded.ma60, rps_250=excluded.rps_250,
                        vcp_factor=excluded.vcp_factor, vol_ma_5=excluded.vol_ma_5",
                )?;
                for b in chunk {
                    // change_pct is clamped with a warning, per spec.md §3.
                    let clamped = b.change_pct.clamp(-1000.0, 1000.0);
                    if (clamped - b.change_pct).abs() > f64::EPSILON {
                        tracing::warn!(
                            ticker_code = %b.ticker_code,
                            trade_date = %b.trade_date,
                            raw = b.change_pct,
                            "change_pct out of [-1000, 1000], clamped"
                        );
                    }
                    stmt.execute(params![
                        b.ticker_code,
                        b.trade_date.to_string(),
                        b.open,
                        b.close,
                        b.high,
                        b.low,
                        b.volume,
                        b.turnover_amount,
                        b.turnover_rate,
                        clamped,
                        b.ma5,
                        b.ma10,
                        b.ma20,
                        b.ma30,
                        b.ma60,
                        b.rps_250,
                        b.vcp_factor,
                        b.vol_ma_5,
                    ])
                    .map_err(|source| StoreError::Constraint {
                        table: "daily_bar",
                        source,
                    })?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Realtime-job upsert (spec.md §4.6): writes OHLCV/turnover/change_pct
    /// only. On conflict the existing `ma*`/`rps_250`/`vcp_factor`/
    /// `vol_ma_5` columns are left exactly as they are — the realtime job
    /// never touches derived metrics, only `daily_close` does.
    pub fn upsert_intraday_ohlcv(&self, bars: &[DailyBar]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        for chunk in bars.chunks(LARGE_BATCH_SIZE) {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO daily_bar
                        (ticker_code, trade_date, open, close, high, low, volume,
                         turnover_amount, turnover_rate, change_pct)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)
                     ON CONFLICT(ticker_code, trade_date) DO UPDATE SET
                        open=excluded.open, close=excluded.close, high=excluded.high,
                        low=excluded.low, volume=excluded.volume,
                        turnover_amount=excluded.turnover_amount,
                        turnover_rate=excluded.turnover_rate, change_pct=excluded.change_pct",
                )?;
                for b in chunk {
                    let clamped = b.change_pct.clamp(-1000.0, 1000.0);
                    stmt.execute(params![
                        b.ticker_code,
                        b.trade_date.to_string(),
                        b.open,
                        b.close,
                        b.high,
                        b.low,
                        b.volume,
                        b.turnover_amount,
                        b.turnover_rate,
                        clamped,
                    ])
                    .map_err(|source| StoreError::Constraint {
                        table: "daily_bar",
                        source,
                    })?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Update only the derived columns of an existing row (used by C4's
    /// back-fill — raw OHLCV columns are never touched here).
    pub fn update_daily_bar_metrics(
        &self,
        ticker_code: &str,
        trade_date: NaiveDate,
        ma5: Option<f64>,
        ma10: Option<f64>,
        ma20: Option<f64>,
        ma30: Option<f64>,
        ma60: Option<f64>,
        rps_250: Option<f64>,
        vcp_factor: Option<f64>,
        vol_ma_5: Option<f64>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE daily_bar SET ma5=?3, ma10=?4, ma20=?5, ma30=?6, ma60=?7,
                rps_250=?8, vcp_factor=?9, vol_ma_5=?10
             WHERE ticker_code = ?1 AND trade_date = ?2",
            params![
                ticker_code,
                trade_date.to_string(),
                ma5,
                ma10,
                ma20,
                ma30,
                ma60,
                rps_250,
                vcp_factor,
                vol_ma_5,
            ],
        )?;
        Ok(())
    }

    /// Most recent `limit` rows for `ticker_code`, in **ascending**
    /// `trade_date` order — the ordering contract spec.md §4.3 calls out as
    /// binding for derived-metric and chart code.
    pub fn recent_daily_bars(
        &self,
        ticker_code: &str,
        limit: usize,
    ) -> Result<Vec<DailyBar>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT ticker_code, trade_date, open, close, high, low, volume,
                       turnover_amount, turnover_rate, change_pct,
                       ma5, ma10, ma20, ma30, ma60, rps_250, vcp_factor, vol_ma_5
                FROM daily_bar WHERE ticker_code = ?1
                ORDER BY trade_date DESC LIMIT ?2
             ) ORDER BY trade_date ASC",
        )?;
        let rows = stmt
            .query_map(params![ticker_code, limit as i64], row_to_bar)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Daily bar for exactly one `(ticker_code, trade_date)`.
    pub fn daily_bar_on(
        &self,
        ticker_code: &str,
        trade_date: NaiveDate,
    ) -> Result<Option<DailyBar>, StoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT ticker_code, trade_date, open, close, high, low, volume,
                        turnover_amount, turnover_rate, change_pct,
                        ma5, ma10, ma20, ma30, ma60, rps_250, vcp_factor, vol_ma_5
                 FROM daily_bar WHERE ticker_code = ?1 AND trade_date = ?2",
                params![ticker_code, trade_date.to_string()],
                row_to_bar,
            )
            .optional_store()?;
        Ok(row)
    }

    /// All bars dated exactly `trade_date`, for cross-ticker recomputation
    /// passes (RPS ranking, sector aggregation).
    pub fn daily_bars_for_date(&self, trade_date: NaiveDate) -> Result<Vec<DailyBar>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, trade_date, open, close, high, low, volume,
                    turnover_amount, turnover_rate, change_pct,
                    ma5, ma10, ma20, ma30, ma60, rps_250, vcp_factor, vol_ma_5
             FROM daily_bar WHERE trade_date = ?1",
        )?;
        let rows = stmt
            .query_map(params![trade_date.to_string()], row_to_bar)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Deletes rows older than `today - n_days`, returning the count
    /// removed (spec.md §4.3 retention contract).
    pub fn cleanup_old_daily_bars(&self, today: NaiveDate, n_days: i64) -> Result<usize, StoreError> {
        let cutoff = today - chrono::Duration::days(n_days);
        let conn = self.lock();
        let n = conn.execute(
            "DELETE FROM daily_bar WHERE trade_date < ?1",
            params![cutoff.to_string()],
        )?;
        Ok(n)
    }
}

trait OptionalStore<T> {
    fn optional_store(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalStore<T> for rusqlite::Result<T> {
    fn optional_store(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

fn row_to_bar(row: &rusqlite::Row) -> rusqlite::Result<DailyBar> {
    let trade_date: String = row.get(1)?;
    Ok(DailyBar {
        ticker_code: row.get(0)?,
        trade_date: trade_date.parse().expect("valid stored date"),
        open: row.get(2)?,
        close: row.get(3)?,
        high: row.get(4)?,
        low: row.get(5)?,
        volume: row.get(6)?,
        turnover_amount: row.get(7)?,
        turnover_rate: row.get(8)?,
        change_pct: row.get(9)?,
        ma5: row.get(10)?,
        ma10: row.get(11)?,
        ma20: row.get(12)?,
        ma30: row.get(13)?,
        ma60: row.get(14)?,
        rps_250: row.get(15)?,
        vcp_factor: row.get(16)?,
        vol_ma_5: row.get(17)?,
    })
}
