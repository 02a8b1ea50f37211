//! Ticker search (spec.md §4.3 / §4.9 supplemented search surface).
//!
//! Three ways a caller may type a query, tried in order: a bare 6-digit
//! string is a code prefix; anything containing a Han character is matched
//! as a substring of the display name; anything else is treated as pinyin
//! initials (e.g. "gfzq" for 国风长青) and matched against initials derived
//! from the display name in memory, since SQLite has no pinyin collation.

use pinyin::ToPinyin;

use super::Store;
use crate::error::StoreError;
use crate::store::models::Ticker;

const MAX_RESULTS: usize = 20;

impl Store {
    pub fn search_tickers(&self, query: &str) -> Result<Vec<Ticker>, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if is_code_prefix(query) {
            return self.search_by_code_prefix(query);
        }
        if contains_han(query) {
            return self.search_by_name_substring(query);
        }
        self.search_by_pinyin_initials(query)
    }

    fn search_by_code_prefix(&self, prefix: &str) -> Result<Vec<Ticker>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, display_name, listing_market, industry_label, list_date, active_flag
             FROM ticker WHERE ticker_code LIKE ?1 ESCAPE '\\' ORDER BY ticker_code LIMIT ?2",
        )?;
        let like_pattern = format!("{}%", escape_like(prefix));
        let rows = stmt
            .query_map(
                rusqlite::params![like_pattern, MAX_RESULTS as i64],
                row_to_ticker,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn search_by_name_substring(&self, needle: &str) -> Result<Vec<Ticker>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, display_name, listing_market, industry_label, list_date, active_flag
             FROM ticker WHERE display_name LIKE ?1 ESCAPE '\\' ORDER BY ticker_code LIMIT ?2",
        )?;
        let like_pattern = format!("%{}%", escape_like(needle));
        let rows = stmt
            .query_map(
                rusqlite::params![like_pattern, MAX_RESULTS as i64],
                row_to_ticker,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn search_by_pinyin_initials(&self, query: &str) -> Result<Vec<Ticker>, StoreError> {
        let needle = query.to_lowercase();
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT ticker_code, display_name, listing_market, industry_label, list_date, active_flag
             FROM ticker ORDER BY ticker_code",
        )?;
        let all = stmt
            .query_map([], row_to_ticker)?
            .collect::<Result<Vec<_>, _>>()?;
        let matched = all
            .into_iter()
            .filter(|t| pinyin_initials(&t.display_name).starts_with(&needle))
            .take(MAX_RESULTS)
            .collect();
        Ok(matched)
    }
}

fn is_code_prefix(query: &str) -> bool {
    !query.is_empty() && query.len() <= 6 && query.chars().all(|c| c.is_ascii_digit())
}

fn contains_han(query: &str) -> bool {
    query.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Lowercase pinyin-initial string for a (possibly mixed Han/ASCII) name,
/// e.g. "国风长青A" -> "gfzqa".
fn pinyin_initials(name: &str) -> String {
    let mut out = String::with_capacity(name.chars().count());
    for c in name.chars() {
        if let Some(p) = c.to_pinyin() {
            out.push_str(&p.first_letter().to_lowercase());
        } else if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
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
