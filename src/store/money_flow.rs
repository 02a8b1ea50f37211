use chrono::NaiveDate;
use rusqlite::params;

use super::{Store, LARGE_BATCH_SIZE};
use crate::error::StoreError;
use crate::store::models::MoneyFlow;

impl Store {
    pub fn upsert_money_flow(&self, rows: &[MoneyFlow]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        for chunk in rows.chunks(LARGE_BATCH_SIZE) {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO money_flow
                        (ticker_code, trade_date, main_net, super_large_net, large_net, medium_net, small_net)
                     VALUES (?1,?2,?3,?4,?5,?6,?7)
                     ON CONFLICT(ticker_code, trade_date) DO UPDATE SET
                        main_net=excluded.main_net, super_large_net=excluded.super_large_net,
                        large_net=excluded.large_net, medium_net=excluded.medium_net,
                        small_net=excluded.small_net",
                )?;
                for r in chunk {
                    stmt.execute(params![
                        r.ticker_code,
                        r.trade_date.to_string(),
                        r.main_net,
                        r.super_large_net,
                        r.large_net,
                        r.medium_net,
                        r.small_net,
                    ])
                    .map_err(|source| StoreError::Constraint {
                        table: "money_flow",
                        source,
                    })?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    pub fn recent_money_flow(
        &self,
        ticker_code: &str,
        limit: usize,
    ) -> Result<Vec<MoneyFlow>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT ticker_code, trade_date, main_net, super_large_net, large_net, medium_net, small_net
                FROM money_flow WHERE ticker_code = ?1
                ORDER BY trade_date DESC LIMIT ?2
             ) ORDER BY trade_date ASC",
        )?;
        let rows = stmt
            .query_map(params![ticker_code, limit as i64], row_to_flow)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn money_flow_for_date(&self, trade_date: NaiveDate) -> Result<Vec<MoneyFlow>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, trade_date, main_net, super_large_net, large_net, medium_net, small_net
             FROM money_flow WHERE trade_date = ?1",
        )?;
        let rows = stmt
            .query_map(params![trade_date.to_string()], row_to_flow)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn cleanup_old_money_flow(&self, today: NaiveDate, n_days: i64) -> Result<usize, StoreError> {
        let cutoff = today - chrono::Duration::days(n_days);
        let conn = self.lock();
        let n = conn.execute(
            "DELETE FROM money_flow WHERE trade_date < ?1",
            params![cutoff.to_string()],
        )?;
        Ok(n)
    }
}

fn row_to_flow(row: &rusqlite::Row) -> rusqlite::Result<MoneyFlow> {
    let trade_date: String = row.get(1)?;
    Ok(MoneyFlow {
        ticker_code: row.get(0)?,
        trade_date: trade_date.parse().expect("valid stored date"),
        main_net: row.get(2)?,
        super_large_net: row.get(3)?,
        large_net: row.get(4)?,
        medium_net: row.get(5)?,
        small_net: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flow(code: &str, date: NaiveDate, main_net: f64) -> MoneyFlow {
        MoneyFlow {
            ticker_code: code.to_string(),
            trade_date: date,
            main_net,
            super_large_net: main_net * 0.6,
            large_net: main_net * 0.4,
            medium_net: -main_net * 0.3,
            small_net: -main_net * 0.7,
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store.upsert_money_flow(&[flow("600000", date, 1000.0)]).unwrap();
        store.upsert_money_flow(&[flow("600000", date, 2000.0)]).unwrap();

        let rows = store.recent_money_flow("600000", 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].main_net, 2000.0);
    }

    #[test]
    fn recent_money_flow_is_ascending() {
        let store = Store::open_in_memory().unwrap();
        let rows: Vec<MoneyFlow> = (0..5)
            .map(|i| flow("600000", d(2024, 1, 1) + chrono::Duration::days(i), i as f64))
            .collect();
        store.upsert_money_flow(&rows).unwrap();
        let got = store.recent_money_flow("600000", 5).unwrap();
        for w in got.windows(2) {
            assert!(w[0].trade_date < w[1].trade_date);
        }
    }

    #[test]
    fn money_flow_for_date_spans_tickers() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store
            .upsert_money_flow(&[flow("600000", date, 100.0), flow("600001", date, -50.0)])
            .unwrap();
        let rows = store.money_flow_for_date(date).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
