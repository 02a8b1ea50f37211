use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::params;

use super::Store;
use crate::error::StoreError;
use crate::store::models::NextDayPredictionCache;

impl Store {
    /// Single-row-per-date cache for the next-day predictor (component C8);
    /// a fresh run simply overwrites the day's cached payload.
    pub fn put_prediction_cache(&self, entry: &NextDayPredictionCache) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO next_day_prediction_cache (target_date, prediction_payload, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(target_date) DO UPDATE SET
                prediction_payload = excluded.prediction_payload,
                created_at = excluded.created_at",
            params![
                entry.target_date.to_string(),
                entry.prediction_payload.to_string(),
                entry.created_at.to_string(),
            ],
        )
        .map_err(|source| StoreError::Constraint {
            table: "next_day_prediction_cache",
            source,
        })?;
        Ok(())
    }

    pub fn get_prediction_cache(
        &self,
        target_date: NaiveDate,
    ) -> Result<Option<NextDayPredictionCache>, StoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT target_date, prediction_payload, created_at
                 FROM next_day_prediction_cache WHERE target_date = ?1",
                params![target_date.to_string()],
                row_to_cache,
            )
            .optional_store()?;
        Ok(row)
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

fn row_to_cache(row: &rusqlite::Row) -> rusqlite::Result<NextDayPredictionCache> {
    let target_date: String = row.get(0)?;
    let payload_raw: String = row.get(1)?;
    let created_at: String = row.get(2)?;
    Ok(NextDayPredictionCache {
        target_date: target_date.parse().expect("valid stored date"),
        prediction_payload: serde_json::from_str(&payload_raw).unwrap_or(serde_json::Value::Null),
        created_at: NaiveDateTime::parse_from_str(&created_at, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(&created_at, "%Y-%m-%d %H:%M:%S"))
            .expect("valid stored timestamp"),
    })
}
