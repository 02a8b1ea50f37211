use rusqlite::params;
use rusqlite::OptionalExtension;

use super::Store;
use crate::error::StoreError;
use crate::store::models::VirtualBoardMapping;

impl Store {
    pub fn upsert_virtual_board_mapping(
        &self,
        virtual_board_name: &str,
        source_concept_name: &str,
        weight: f64,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM virtual_board_mapping
                 WHERE virtual_board_name = ?1 AND source_concept_name = ?2",
                params![virtual_board_name, source_concept_name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            conn.execute(
                "UPDATE virtual_board_mapping SET weight = ?2, active_flag = 1 WHERE id = ?1",
                params![id, weight],
            )?;
        } else {
            conn.execute(
                "INSERT INTO virtual_board_mapping
                    (virtual_board_name, source_concept_name, weight, active_flag)
                 VALUES (?1, ?2, ?3, 1)",
                params![virtual_board_name, source_concept_name, weight],
            )
            .map_err(|source| StoreError::Constraint {
                table: "virtual_board_mapping",
                source,
            })?;
        }
        Ok(())
    }

    pub fn deactivate_virtual_board_mapping(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE virtual_board_mapping SET active_flag = 0 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// All active source concepts feeding `virtual_board_name`, with their
    /// projection weights (spec.md §4.8 virtual-board aggregation).
    pub fn concepts_for_virtual_board(
        &self,
        virtual_board_name: &str,
    ) -> Result<Vec<VirtualBoardMapping>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, virtual_board_name, source_concept_name, weight, active_flag
             FROM virtual_board_mapping WHERE virtual_board_name = ?1 AND active_flag = 1",
        )?;
        let rows = stmt
            .query_map(params![virtual_board_name], row_to_mapping)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All distinct active virtual-board names a given concept feeds into.
    pub fn virtual_boards_for_concept(
        &self,
        source_concept_name: &str,
    ) -> Result<Vec<VirtualBoardMapping>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, virtual_board_name, source_concept_name, weight, active_flag
             FROM virtual_board_mapping WHERE source_concept_name = ?1 AND active_flag = 1",
        )?;
        let rows = stmt
            .query_map(params![source_concept_name], row_to_mapping)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_virtual_board_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT virtual_board_name FROM virtual_board_mapping
             WHERE active_flag = 1 ORDER BY virtual_board_name",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_mapping(row: &rusqlite::Row) -> rusqlite::Result<VirtualBoardMapping> {
    Ok(VirtualBoardMapping {
        id: row.get(0)?,
        virtual_board_name: row.get(1)?,
        source_concept_name: row.get(2)?,
        weight: row.get(3)?,
        active_flag: row.get::<_, i64>(4)? != 0,
    })
}
