use rusqlite::{params, OptionalExtension};

use super::Store;
use crate::error::StoreError;
use crate::store::models::{Concept, ConceptMembership};

impl Store {
    /// Inserts a new concept, or reactivates/renames the existing active
    /// concept of the same name (the unique partial index on
    /// `(concept_name) WHERE active_flag=1` is what makes this an upsert
    /// rather than a duplicate-name error).
    pub fn upsert_concept(&self, concept_name: &str, concept_code: Option<&str>, origin_source: &str) -> Result<i64, StoreError> {
        let conn = self.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT concept_id FROM concept WHERE concept_name = ?1 AND active_flag = 1",
                params![concept_name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            conn.execute(
                "UPDATE concept SET concept_code = ?2, origin_source = ?3 WHERE concept_id = ?1",
                params![id, concept_code, origin_source],
            )?;
            Ok(id)
        } else {
            conn.execute(
                "INSERT INTO concept (concept_name, concept_code, origin_source, active_flag)
                 VALUES (?1, ?2, ?3, 1)",
                params![concept_name, concept_code, origin_source],
            )
            .map_err(|source| StoreError::Constraint {
                table: "concept",
                source,
            })?;
            Ok(conn.last_insert_rowid())
        }
    }

    pub fn deactivate_concept(&self, concept_id: i64) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "UPDATE concept SET active_flag = 0 WHERE concept_id = ?1",
            params![concept_id],
        )?;
        Ok(())
    }

    pub fn get_concept(&self, concept_id: i64) -> Result<Option<Concept>, StoreError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT concept_id, concept_name, concept_code, origin_source, active_flag
                 FROM concept WHERE concept_id = ?1",
                params![concept_id],
                row_to_concept,
            )
            .optional()?;
        Ok(row)
    }

    pub fn all_active_concepts(&self) -> Result<Vec<Concept>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT concept_id, concept_name, concept_code, origin_source, active_flag
             FROM concept WHERE active_flag = 1 ORDER BY concept_name",
        )?;
        let rows = stmt
            .query_map([], row_to_concept)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replaces the full membership set of `concept_id` with `members`
    /// (ticker_code, weight) — concept constituents are always
    /// resynced wholesale from a vendor snapshot, never patched row by row.
    pub fn replace_concept_membership(
        &self,
        concept_id: i64,
        members: &[(String, f64)],
    ) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM concept_membership WHERE concept_id = ?1",
            params![concept_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO concept_membership (ticker_code, concept_id, weight) VALUES (?1, ?2, ?3)",
            )?;
            for (ticker_code, weight) in members {
                stmt.execute(params![ticker_code, concept_id, weight])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn concepts_for_ticker(&self, ticker_code: &str) -> Result<Vec<ConceptMembership>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, concept_id, weight FROM concept_membership WHERE ticker_code = ?1",
        )?;
        let rows = stmt
            .query_map(params![ticker_code], row_to_membership)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn tickers_for_concept(&self, concept_id: i64) -> Result<Vec<ConceptMembership>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, concept_id, weight FROM concept_membership WHERE concept_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![concept_id], row_to_membership)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_concept(row: &rusqlite::Row) -> rusqlite::Result<Concept> {
    Ok(Concept {
        concept_id: row.get(0)?,
        concept_name: row.get(1)?,
        concept_code: row.get(2)?,
        origin_source: row.get(3)?,
        active_flag: row.get::<_, i64>(4)? != 0,
    })
}

fn row_to_membership(row: &rusqlite::Row) -> rusqlite::Result<ConceptMembership> {
    Ok(ConceptMembership {
        ticker_code: row.get(0)?,
        concept_id: row.get(1)?,
        weight: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_concept_is_idempotent_by_name() {
        let store = Store::open_in_memory().unwrap();
        let id1 = store.upsert_concept("semiconductors", Some("BK001"), "dongcai").unwrap();
        let id2 = store.upsert_concept("semiconductors", Some("BK001-renamed"), "dongcai").unwrap();
        assert_eq!(id1, id2);
        let concept = store.get_concept(id1).unwrap().unwrap();
        assert_eq!(concept.concept_code.as_deref(), Some("BK001-renamed"));
    }

    #[test]
    fn deactivated_concept_name_can_be_reused() {
        let store = Store::open_in_memory().unwrap();
        let id1 = store.upsert_concept("semiconductors", None, "dongcai").unwrap();
        store.deactivate_concept(id1).unwrap();
        let id2 = store.upsert_concept("semiconductors", None, "dongcai").unwrap();
        assert_ne!(id1, id2);
        assert_eq!(store.all_active_concepts().unwrap().len(), 1);
    }

    #[test]
    fn replace_membership_clears_stale_members() {
        let store = Store::open_in_memory().unwrap();
        let id = store.upsert_concept("semiconductors", None, "dongcai").unwrap();
        store
            .replace_concept_membership(id, &[("600000".into(), 1.0), ("600001".into(), 0.5)])
            .unwrap();
        store
            .replace_concept_membership(id, &[("600002".into(), 1.0)])
            .unwrap();
        let members = store.tickers_for_concept(id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].ticker_code, "600002");
    }
}
