use chrono::NaiveDate;
use rusqlite::params;

use super::Store;
use crate::error::StoreError;
use crate::store::models::MarketIndexDaily;

impl Store {
    pub fn upsert_market_index_daily(&self, rows: &[MarketIndexDaily]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO market_index_daily
                    (index_code, trade_date, open, close, high, low, volume, amount, change_pct)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
                 ON CONFLICT(index_code, trade_date) DO UPDATE SET
                    open=excluded.open, close=excluded.close, high=excluded.high,
                    low=excluded.low, volume=excluded.volume, amount=excluded.amount,
                    change_pct=excluded.change_pct",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.index_code,
                    r.trade_date.to_string(),
                    r.open,
                    r.close,
                    r.high,
                    r.low,
                    r.volume,
                    r.amount,
                    r.change_pct,
                ])
                .map_err(|source| StoreError::Constraint {
                    table: "market_index_daily",
                    source,
                })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recent `limit` bars for `index_code`, ascending — regime
    /// detection (§4.7.5) needs a contiguous ascending window for its OLS fit.
    pub fn recent_market_index_daily(
        &self,
        index_code: &str,
        limit: usize,
    ) -> Result<Vec<MarketIndexDaily>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT index_code, trade_date, open, close, high, low, volume, amount, change_pct
                FROM market_index_daily WHERE index_code = ?1
                ORDER BY trade_date DESC LIMIT ?2
             ) ORDER BY trade_date ASC",
        )?;
        let rows = stmt
            .query_map(params![index_code, limit as i64], row_to_index)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_index(row: &rusqlite::Row) -> rusqlite::Result<MarketIndexDaily> {
    let trade_date: String = row.get(1)?;
    Ok(MarketIndexDaily {
        index_code: row.get(0)?,
        trade_date: trade_date.parse().expect("valid stored date"),
        open: row.get(2)?,
        close: row.get(3)?,
        high: row.get(4)?,
        low: row.get(5)?,
        volume: row.get(6)?,
        amount: row.get(7)?,
        change_pct: row.get(8)?,
    })
}
