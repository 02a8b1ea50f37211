use rusqlite::{params, OptionalExtension};

use super::Store;
use crate::error::StoreError;
use crate::store::models::Ticker;

impl Store {
    /// Create-on-first-appearance upsert. `active_flag` is intentionally
    /// never overwritten here — spec.md §3 says it is "mutated only via
    /// admin", so ingestion only ever inserts a fresh ticker or refreshes
    /// its display metadata.
    pub fn upsert_ticker(&self, t: &Ticker) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO ticker (ticker_code, display_name, listing_market, industry_label, list_date, active_flag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(ticker_code) DO UPDATE SET
                display_name = excluded.display_name,
                listing_market = excluded.listing_market,
                industry_label = excluded.industry_label,
                list_date = excluded.list_date",
            params![
                t.ticker_code,
                t.display_name,
                t.listing_market,
                t.industry_label,
                t.list_date.map(|d| d.to_string()),
                t.active_flag as i64,
            ],
        )
        .map_err(|source| StoreError::Constraint { table: "ticker", source })?;
        Ok(())
    }

    pub fn set_ticker_active(&self, ticker_code: &str, active: bool) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE ticker SET active_flag = ?1 WHERE ticker_code = ?2",
            params![active as i64, ticker_code],
        )?;
        Ok(())
    }

    pub fn get_ticker(&self, ticker_code: &str) -> Result<Option<Ticker>, StoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT ticker_code, display_name, listing_market, industry_label, list_date, active_flag
                 FROM ticker WHERE ticker_code = ?1",
                params![ticker_code],
                row_to_ticker,
            )
            .optional()?;
        Ok(row)
    }

    pub fn all_active_tickers(&self) -> Result<Vec<Ticker>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, display_name, listing_market, industry_label, list_date, active_flag
             FROM ticker WHERE active_flag = 1 ORDER BY ticker_code",
        )?;
        let rows = stmt
            .query_map([], row_to_ticker)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_ticker(row: &rusqlite::Row) -> rusqlite::Result<Ticker> {
    let list_date: Option<String> = row.get(4)?;
    Ok(Ticker {
        ticker_code: row.get(0)?,
        display_name: row.get(1)?,
        listing_market: row.get(2)?,
        industry_label: row.get(3)?,
        list_date: list_date.and_then(|s| s.parse().ok()),
        active_flag: row.get::<_, i64>(5)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(code: &str) -> Ticker {
        Ticker {
            ticker_code: code.to_string(),
            display_name: "Example Corp".to_string(),
            listing_market: "SH".to_string(),
            industry_label: Some("tech".to_string()),
            list_date: Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
            active_flag: true,
        }
    }

    #[test]
    fn upsert_is_idempotent_and_keeps_row_count() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_ticker(&sample("600000")).unwrap();
        let mut t2 = sample("600000");
        t2.display_name = "Renamed Corp".to_string();
        store.upsert_ticker(&t2).unwrap();

        let got = store.get_ticker("600000").unwrap().unwrap();
        assert_eq!(got.display_name, "Renamed Corp");

        let conn = store.lock();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM ticker", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn set_active_does_not_touch_display_fields() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_ticker(&sample("600000")).unwrap();
        store.set_ticker_active("600000", false).unwrap();
        let got = store.get_ticker("600000").unwrap().unwrap();
        assert!(!got.active_flag);
        assert_eq!(got.display_name, "Example Corp");
    }

    #[test]
    fn all_active_tickers_excludes_deactivated() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_ticker(&sample("600000")).unwrap();
        store.upsert_ticker(&sample("600001")).unwrap();
        store.set_ticker_active("600001", false).unwrap();
        let active = store.all_active_tickers().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].ticker_code, "600000");
    }
}
