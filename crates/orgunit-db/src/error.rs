//! Database-specific error types and conversions.

use orgunit_core::error::{ErrorCode, OrgUnitError};

/// Unique index over `(tenant_id, org_code)` on `org_unit`.
pub const ORG_CODE_INDEX: &str = "idx_org_unit_tenant_code";
/// Unique indexes over `(tenant_id, request_code)`.
pub const EVENT_REQUEST_INDEX: &str = "idx_event_tenant_request";
pub const CORRECTION_REQUEST_INDEX: &str = "idx_correction_tenant_request";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique index {index} violated: {message}")]
    UniqueViolation { index: &'static str, message: String },
}

impl DbError {
    /// Classify a statement error, recognising violations of the unique
    /// indexes callers depend on.
    pub fn from_statement(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        let index = [ORG_CODE_INDEX, EVENT_REQUEST_INDEX, CORRECTION_REQUEST_INDEX]
            .into_iter()
            .find(|index| message.contains(*index));
        match index {
            Some(index) => DbError::UniqueViolation { index, message },
            None => DbError::Query(message),
        }
    }
}

impl From<DbError> for OrgUnitError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { index, message } if index == ORG_CODE_INDEX => {
                OrgUnitError::conflict(ErrorCode::OrgCodeConflict, message)
            }
            DbError::UniqueViolation { message, .. } => {
                OrgUnitError::conflict(ErrorCode::OrgRequestIdConflict, message)
            }
            other => OrgUnitError::Database(other.to_string()),
        }
    }
}
