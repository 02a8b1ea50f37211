use chrono::NaiveDate;
use rusqlite::params;

use super::Store;
use crate::error::StoreError;
use crate::store::models::{HotRankEntry, HotRankSource};

impl Store {
    pub fn upsert_hot_rank_entries(&self, rows: &[HotRankEntry]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO hot_rank_entry (ticker_code, source, trade_date, rank, hot_score, volume)
                 VALUES (?1,?2,?3,?4,?5,?6)
                 ON CONFLICT(ticker_code, source, trade_date) DO UPDATE SET
                    rank=excluded.rank, hot_score=excluded.hot_score, volume=excluded.volume",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.ticker_code,
                    r.source.as_str(),
                    r.trade_date.to_string(),
                    r.rank,
                    r.hot_score,
                    r.volume,
                ])
                .map_err(|source| StoreError::Constraint {
                    table: "hot_rank_entry",
                    source,
                })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Entries for one `(source, trade_date)` ordered by `rank` ascending —
    /// the list a hot-rank scan walks top-to-bottom.
    pub fn hot_rank_list(
        &self,
        source: HotRankSource,
        trade_date: NaiveDate,
    ) -> Result<Vec<HotRankEntry>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, source, trade_date, rank, hot_score, volume
             FROM hot_rank_entry WHERE source = ?1 AND trade_date = ?2 ORDER BY rank ASC",
        )?;
        let rows = stmt
            .query_map(params![source.as_str(), trade_date.to_string()], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every `(source, trade_date)` rank for one ticker, most recent first —
    /// used by the hot-rank "consecutive days on list" supplemented feature.
    pub fn hot_rank_history_for_ticker(
        &self,
        ticker_code: &str,
        source: HotRankSource,
        limit: usize,
    ) -> Result<Vec<HotRankEntry>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, source, trade_date, rank, hot_score, volume
             FROM hot_rank_entry WHERE ticker_code = ?1 AND source = ?2
             ORDER BY trade_date DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(
                params![ticker_code, source.as_str(), limit as i64],
                row_to_entry,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn cleanup_old_hot_rank(&self, today: NaiveDate, n_days: i64) -> Result<usize, StoreError> {
        let cutoff = today - chrono::Duration::days(n_days);
        let conn = self.lock();
        let n = conn.execute(
            "DELETE FROM hot_rank_entry WHERE trade_date < ?1",
            params![cutoff.to_string()],
        )?;
        Ok(n)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<HotRankEntry> {
    let trade_date: String = row.get(2)?;
    let source: String = row.get(1)?;
    Ok(HotRankEntry {
        ticker_code: row.get(0)?,
        source: HotRankSource::from_str(&source).expect("valid stored hot rank source"),
        trade_date: trade_date.parse().expect("valid stored date"),
        rank: row.get(3)?,
        hot_score: row.get(4)?,
        volume: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(code: &str, date: NaiveDate, rank: i32) -> HotRankEntry {
        HotRankEntry {
            ticker_code: code.to_string(),
            source: HotRankSource::Xueqiu,
            trade_date: date,
            rank,
            hot_score: 100.0 - rank as f64,
            volume: Some(1000.0),
        }
    }

    #[test]
    fn hot_rank_list_is_ordered_by_rank() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store
            .upsert_hot_rank_entries(&[entry("600002", date, 2), entry("600001", date, 1)])
            .unwrap();
        let list = store.hot_rank_list(HotRankSource::Xueqiu, date).unwrap();
        assert_eq!(list[0].ticker_code, "600001");
        assert_eq!(list[1].ticker_code, "600002");
    }

    #[test]
    fn upsert_twice_replaces_rank_not_duplicates_row() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store.upsert_hot_rank_entries(&[entry("600001", date, 5)]).unwrap();
        store.upsert_hot_rank_entries(&[entry("600001", date, 1)]).unwrap();
        let list = store.hot_rank_list(HotRankSource::Xueqiu, date).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].rank, 1);
    }

    #[test]
    fn hot_rank_history_is_most_recent_first() {
        let store = Store::open_in_memory().unwrap();
        let rows: Vec<HotRankEntry> = (0..3)
            .map(|i| entry("600001", d(2024, 1, 1) + chrono::Duration::days(i), 1))
            .collect();
        store.upsert_hot_rank_entries(&rows).unwrap();
        let history = store
            .hot_rank_history_for_ticker("600001", HotRankSource::Xueqiu, 10)
            .unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].trade_date > history[1].trade_date);
    }
}
