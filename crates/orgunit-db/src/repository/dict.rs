//! SurrealDB implementation of [`DictResolver`] over `dict_item`.

use chrono::NaiveDate;
use orgunit_core::error::OrgUnitResult;
use orgunit_core::models::dict::DictOption;
use orgunit_core::repository::DictResolver;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{ENABLED_AS_OF, date_key};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct DictItemRow {
    code: String,
    label: String,
}

impl From<DictItemRow> for DictOption {
    fn from(row: DictItemRow) -> Self {
        Self {
            code: row.code,
            label: row.label,
        }
    }
}

/// Dictionary lookups for DICT extension fields.
#[derive(Clone)]
pub struct SurrealDictResolver<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDictResolver<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Add a dictionary item enabled from `enabled_on` until `disabled_on`.
    pub async fn put_item(
        &self,
        tenant_id: Uuid,
        dict_code: &str,
        item: DictOption,
        enabled_on: NaiveDate,
        disabled_on: Option<NaiveDate>,
    ) -> Result<(), DbError> {
        self.db
            .query(
                "CREATE dict_item SET \
                 tenant_id = $tenant_id, dict_code = $dict_code, \
                 code = $code, label = $label, \
                 enabled_on = $enabled_on, disabled_on = $disabled_on",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dict_code", dict_code.to_string()))
            .bind(("code", item.code))
            .bind(("label", item.label))
            .bind(("enabled_on", date_key(enabled_on)))
            .bind(("disabled_on", disabled_on.map(date_key)))
            .await?
            .check()
            .map_err(DbError::from_statement)?;
        Ok(())
    }
}

impl<C: Connection> DictResolver for SurrealDictResolver<C> {
    async fn resolve_value_label(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
        dict_code: &str,
        code: &str,
    ) -> OrgUnitResult<Option<String>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT code, label, enabled_on FROM dict_item \
                 WHERE tenant_id = $tenant_id AND dict_code = $dict_code \
                 AND code = $code AND {ENABLED_AS_OF} \
                 ORDER BY enabled_on DESC LIMIT 1"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dict_code", dict_code.to_string()))
            .bind(("code", code.to_string()))
            .bind(("as_of", date_key(as_of)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DictItemRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| row.label))
    }

    async fn list_options(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
        dict_code: &str,
        keyword: &str,
        limit: usize,
    ) -> OrgUnitResult<Vec<DictOption>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Case-insensitive substring match on code or label; blank matches all.
        let mut result = self
            .db
            .query(format!(
                "SELECT code, label FROM dict_item \
                 WHERE tenant_id = $tenant_id AND dict_code = $dict_code \
                 AND {ENABLED_AS_OF} \
                 AND (string::contains(string::lowercase(code), $keyword) \
                 OR string::contains(string::lowercase(label), $keyword)) \
                 ORDER BY code ASC LIMIT $limit"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dict_code", dict_code.to_string()))
            .bind(("as_of", date_key(as_of)))
            .bind(("keyword", keyword.trim().to_lowercase()))
            .bind(("limit", limit as u64))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DictItemRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
