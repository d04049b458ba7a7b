//! SurrealDB repository implementations.

mod autocode;
mod dict;
mod metadata;
mod org_unit;

use chrono::NaiveDate;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

pub use autocode::StoreConfig;
pub use dict::SurrealDictResolver;
pub use org_unit::SurrealOrgUnitStore;

/// Effective dates are stored as `YYYY-MM-DD` so they compare lexically.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DbError::InvalidRow(format!("invalid date {s:?}: {e}")))
}

fn parse_optional_date(s: Option<&str>) -> Result<Option<NaiveDate>, DbError> {
    s.map(parse_date).transpose()
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::InvalidRow(format!("invalid {what} UUID: {e}")))
}

fn total(rows: &[CountRow]) -> u64 {
    rows.first().map_or(0, |row| row.total)
}

/// Filter for rows carrying an `[enabled_on, disabled_on)` window.
const ENABLED_AS_OF: &str =
    "enabled_on <= $as_of AND (disabled_on = NONE OR disabled_on > $as_of)";
