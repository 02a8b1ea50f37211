use chrono::NaiveDate;
use rusqlite::params;

use super::{Store, SECTOR_BATCH_SIZE};
use crate::error::StoreError;
use crate::store::models::SectorFlow;

impl Store {
    pub fn upsert_sector_flow(&self, rows: &[SectorFlow]) -> Result<(), StoreError> {
        let mut conn = self.lock();
        for chunk in rows.chunks(SECTOR_BATCH_SIZE) {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO sector_flow
                        (sector_name, trade_date, main_net, super_large_net, large_net, medium_net,
                         small_net, change_pct, avg_turnover, limit_up_count, sector_rps_20,
                         sector_rps_50, sector_ma_status, top_weight_stocks)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
                     ON CONFLICT(sector_name, trade_date) DO UPDATE SET
                        main_net=excluded.main_net, super_large_net=excluded.super_large_net,
                        large_net=excluded.large_net, medium_net=excluded.medium_net,
                        small_net=excluded.small_net, change_pct=excluded.change_pct,
                        avg_turnover=excluded.avg_turnover, limit_up_count=excluded.limit_up_count,
                        sector_rps_20=excluded.sector_rps_20, sector_rps_50=excluded.sector_rps_50,
                        sector_ma_status=excluded.sector_ma_status,
                        top_weight_stocks=excluded.top_weight_stocks",
                )?;
                for r in chunk {
                    let top_weight_json = serde_json::to_string(&r.top_weight_stocks)
                        .expect("Vec<String> always serializes");
                    stmt.execute(params![
                        r.sector_name,
                        r.trade_date.to_string(),
                        r.main_net,
                        r.super_large_net,
                        r.large_net,
                        r.medium_net,
                        r.small_net,
                        r.change_pct,
                        r.avg_turnover,
                        r.limit_up_count,
                        r.sector_rps_20,
                        r.sector_rps_50,
                        r.sector_ma_status,
                        top_weight_json,
                    ])
                    .map_err(|source| StoreError::Constraint {
                        table: "sector_flow",
                        source,
                    })?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    pub fn recent_sector_flow(
        &self,
        sector_name: &str,
        limit: usize,
    ) -> Result<Vec<SectorFlow>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT sector_name, trade_date, main_net, super_large_net, large_net, medium_net,
                       small_net, change_pct, avg_turnover, limit_up_count, sector_rps_20,
                       sector_rps_50, sector_ma_status, top_weight_stocks
                FROM sector_flow WHERE sector_name = ?1
                ORDER BY trade_date DESC LIMIT ?2
             ) ORDER BY trade_date ASC",
        )?;
        let rows = stmt
            .query_map(params![sector_name, limit as i64], row_to_sector)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn sector_flow_for_date(&self, trade_date: NaiveDate) -> Result<Vec<SectorFlow>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT sector_name, trade_date, main_net, super_large_net, large_net, medium_net,
                    small_net, change_pct, avg_turnover, limit_up_count, sector_rps_20,
                    sector_rps_50, sector_ma_status, top_weight_stocks
             FROM sector_flow WHERE trade_date = ?1",
        )?;
        let rows = stmt
            .query_map(params![trade_date.to_string()], row_to_sector)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Overwrites just the derived ranking columns, used by the sector
    /// derived-metric pass (C4) after the raw flow rows have already landed.
    pub fn update_sector_metrics(
        &self,
        sector_name: &str,
        trade_date: NaiveDate,
        sector_rps_20: Option<f64>,
        sector_rps_50: Option<f64>,
        sector_ma_status: i32,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE sector_flow SET sector_rps_20=?3, sector_rps_50=?4, sector_ma_status=?5
             WHERE sector_name = ?1 AND trade_date = ?2",
            params![
                sector_name,
                trade_date.to_string(),
                sector_rps_20,
                sector_rps_50,
                sector_ma_status,
            ],
        )?;
        Ok(())
    }
}

fn row_to_sector(row: &rusqlite::Row) -> rusqlite::Result<SectorFlow> {
    let trade_date: String = row.get(1)?;
    let top_weight_json: String = row.get(13)?;
    let top_weight_stocks: Vec<String> = serde_json::from_str(&top_weight_json).unwrap_or_default();
    Ok(SectorFlow {
        sector_name: row.get(0)?,
        trade_date: trade_date.parse().expect("valid stored date"),
        main_net: row.get(2)?,
        super_large_net: row.get(3)?,
        large_net: row.get(4)?,
        medium_net: row.get(5)?,
        small_net: row.get(6)?,
        change_pct: row.get(7)?,
        avg_turnover: row.get(8)?,
        limit_up_count: row.get(9)?,
        sector_rps_20: row.get(10)?,
        sector_rps_50: row.get(11)?,
        sector_ma_status: row.get(12)?,
        top_weight_stocks,
    })
}
