use chrono::NaiveDate;
use rusqlite::params;

use super::Store;
use crate::error::StoreError;
use crate::store::models::{StrategyRecommendation, VerificationStatus};

impl Store {
    /// A pipeline run's output is always inserted as a batch under one
    /// `(user_id, run_date)`; re-running the same day replaces the prior
    /// picks rather than appending to them.
    pub fn insert_recommendations(&self, recs: &[StrategyRecommendation]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO strategy_recommendation
                    (user_id, run_date, ticker_code, params_snapshot, entry_price, stop_loss_price,
                     ai_score, win_probability, reason_tags, strategy_version, verification_status,
                     max_return_5d, final_return_5d)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)
                 ON CONFLICT(user_id, run_date, ticker_code) DO UPDATE SET
                    params_snapshot=excluded.params_snapshot, entry_price=excluded.entry_price,
                    stop_loss_price=excluded.stop_loss_price, ai_score=excluded.ai_score,
                    win_probability=excluded.win_probability, reason_tags=excluded.reason_tags,
                    strategy_version=excluded.strategy_version",
            )?;
            for r in recs {
                let reason_tags_json = serde_json::to_string(&r.reason_tags)
                    .expect("Vec<String> always serializes");
                stmt.execute(params![
                    r.user_id,
                    r.run_date.to_string(),
                    r.ticker_code,
                    r.params_snapshot.to_string(),
                    r.entry_price,
                    r.stop_loss_price,
                    r.ai_score,
                    r.win_probability,
                    reason_tags_json,
                    r.strategy_version,
                    r.verification_status.as_str(),
                    r.max_return_5d,
                    r.final_return_5d,
                ])
                .map_err(|source| StoreError::Constraint {
                    table: "strategy_recommendation",
                    source,
                })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn recommendations_for_run(
        &self,
        user_id: &str,
        run_date: NaiveDate,
    ) -> Result<Vec<StrategyRecommendation>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, run_date, ticker_code, params_snapshot, entry_price, stop_loss_price,
                    ai_score, win_probability, reason_tags, strategy_version, verification_status,
                    max_return_5d, final_return_5d
             FROM strategy_recommendation WHERE user_id = ?1 AND run_date = ?2
             ORDER BY ai_score DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id, run_date.to_string()], row_to_rec)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Recommendations still `pending` verification whose `run_date` is at
    /// least 5 trading days in the past — candidates for read-triggered
    /// auto-verification (component C9).
    pub fn pending_recommendations_before(
        &self,
        cutoff_date: NaiveDate,
    ) -> Result<Vec<StrategyRecommendation>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, run_date, ticker_code, params_snapshot, entry_price, stop_loss_price,
                    ai_score, win_probability, reason_tags, strategy_version, verification_status,
                    max_return_5d, final_return_5d
             FROM strategy_recommendation
             WHERE verification_status = 'pending' AND run_date <= ?1",
        )?;
        let rows = stmt
            .query_map(params![cutoff_date.to_string()], row_to_rec)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_verification(
        &self,
        user_id: &str,
        run_date: NaiveDate,
        ticker_code: &str,
        status: VerificationStatus,
        max_return_5d: f64,
        final_return_5d: f64,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE strategy_recommendation
             SET verification_status = ?4, max_return_5d = ?5, final_return_5d = ?6
             WHERE user_id = ?1 AND run_date = ?2 AND ticker_code = ?3",
            params![
                user_id,
                run_date.to_string(),
                ticker_code,
                status.as_str(),
                max_return_5d,
                final_return_5d,
            ],
        )?;
        Ok(())
    }
}

fn row_to_rec(row: &rusqlite::Row) -> rusqlite::Result<StrategyRecommendation> {
    let run_date: String = row.get(1)?;
    let params_raw: String = row.get(3)?;
    let reason_tags_raw: String = row.get(8)?;
    let status: String = row.get(10)?;
    Ok(StrategyRecommendation {
        user_id: row.get(0)?,
        run_date: run_date.parse().expect("valid stored date"),
        ticker_code: row.get(2)?,
        params_snapshot: serde_json::from_str(&params_raw).unwrap_or(serde_json::Value::Null),
        entry_price: row.get(4)?,
        stop_loss_price: row.get(5)?,
        ai_score: row.get(6)?,
        win_probability: row.get(7)?,
        reason_tags: serde_json::from_str(&reason_tags_raw).unwrap_or_default(),
        strategy_version: row.get(9)?,
        verification_status: VerificationStatus::from_str(&status).expect("valid stored status"),
        max_return_5d: row.get(11)?,
        final_return_5d: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(user: &str, date: NaiveDate, ticker: &str, score: f64) -> StrategyRecommendation {
        StrategyRecommendation {
            user_id: user.to_string(),
            run_date: date,
            ticker_code: ticker.to_string(),
            params_snapshot: serde_json::json!({"model": "t6"}),
            entry_price: 10.0,
            stop_loss_price: Some(9.0),
            ai_score: score,
            win_probability: 0.6,
            reason_tags: vec!["momentum".to_string()],
            strategy_version: "t6".to_string(),
            verification_status: VerificationStatus::Pending,
            max_return_5d: None,
            final_return_5d: None,
        }
    }

    #[test]
    fn recommendations_for_run_ordered_by_score_desc() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store
            .insert_recommendations(&[rec("u1", date, "600000", 50.0), rec("u1", date, "600001", 90.0)])
            .unwrap();
        let got = store.recommendations_for_run("u1", date).unwrap();
        assert_eq!(got[0].ticker_code, "600001");
        assert_eq!(got[1].ticker_code, "600000");
    }

    #[test]
    fn rerunning_same_day_replaces_rather_than_duplicates() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store.insert_recommendations(&[rec("u1", date, "600000", 50.0)]).unwrap();
        store.insert_recommendations(&[rec("u1", date, "600000", 80.0)]).unwrap();
        let got = store.recommendations_for_run("u1", date).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].ai_score, 80.0);
    }

    #[test]
    fn update_verification_moves_out_of_pending() {
        let store = Store::open_in_memory().unwrap();
        let date = d(2024, 1, 1);
        store.insert_recommendations(&[rec("u1", date, "600000", 50.0)]).unwrap();
        store
            .update_verification("u1", date, "600000", VerificationStatus::Success, 0.08, 0.05)
            .unwrap();
        let got = store.recommendations_for_run("u1", date).unwrap();
        assert_eq!(got[0].verification_status, VerificationStatus::Success);
        assert_eq!(got[0].final_return_5d, Some(0.05));

        let pending = store.pending_recommendations_before(date).unwrap();
        assert!(pending.is_empty());
    }
}
