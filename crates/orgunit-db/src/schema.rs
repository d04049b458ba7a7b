//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings, effective
//! dates as `YYYY-MM-DD` strings (which order lexically), and enums as
//! strings with ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "org_unit_events",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "tenant_field_metadata",
        sql: SCHEMA_V2,
    },
];

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Org units: identity plus the current tree position
-- =======================================================================
DEFINE TABLE org_unit SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE org_unit TYPE string;
DEFINE FIELD org_code ON TABLE org_unit TYPE string;
DEFINE FIELD parent_id ON TABLE org_unit TYPE option<string>;
DEFINE FIELD created_on ON TABLE org_unit TYPE string;
DEFINE FIELD rescinded ON TABLE org_unit TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE org_unit TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_org_unit_tenant_code ON TABLE org_unit \
    COLUMNS tenant_id, org_code UNIQUE;
DEFINE INDEX idx_org_unit_tenant_parent ON TABLE org_unit \
    COLUMNS tenant_id, parent_id;

-- =======================================================================
-- Org unit events (effective-dated)
-- =======================================================================
DEFINE TABLE org_unit_event SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE org_unit_event TYPE string;
DEFINE FIELD org_id ON TABLE org_unit_event TYPE string;
DEFINE FIELD event_type ON TABLE org_unit_event TYPE string \
    ASSERT $value IN ['CREATE', 'UPDATE', 'MOVE', 'RENAME', 'DISABLE', \
    'ENABLE', 'SET_BUSINESS_UNIT'];
DEFINE FIELD effective_date ON TABLE org_unit_event TYPE string;
DEFINE FIELD payload ON TABLE org_unit_event TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD request_code ON TABLE org_unit_event TYPE string;
DEFINE FIELD initiator_id ON TABLE org_unit_event TYPE option<string>;
DEFINE FIELD rescinded ON TABLE org_unit_event TYPE bool DEFAULT false;
DEFINE FIELD transaction_time ON TABLE org_unit_event TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_event_tenant_request ON TABLE org_unit_event \
    COLUMNS tenant_id, request_code UNIQUE;
DEFINE INDEX idx_event_tenant_org_date ON TABLE org_unit_event \
    COLUMNS tenant_id, org_id, effective_date;

-- =======================================================================
-- Corrections, status corrections and rescinds applied to events
-- =======================================================================
DEFINE TABLE org_unit_correction SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE org_unit_correction TYPE string;
DEFINE FIELD org_id ON TABLE org_unit_correction TYPE string;
DEFINE FIELD target_event_uuid ON TABLE org_unit_correction \
    TYPE option<string>;
DEFINE FIELD kind ON TABLE org_unit_correction TYPE string \
    ASSERT $value IN ['PATCH', 'STATUS', 'RESCIND_EVENT', 'RESCIND_ORG'];
DEFINE FIELD patch ON TABLE org_unit_correction TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD reason ON TABLE org_unit_correction TYPE option<string>;
DEFINE FIELD request_code ON TABLE org_unit_correction TYPE string;
DEFINE FIELD initiator_id ON TABLE org_unit_correction \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE org_unit_correction TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_correction_tenant_request ON TABLE org_unit_correction \
    COLUMNS tenant_id, request_code UNIQUE;

-- =======================================================================
-- Persons (manager resolution)
-- =======================================================================
DEFINE TABLE person SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE person TYPE string;
DEFINE FIELD pernr ON TABLE person TYPE string;
DEFINE FIELD display_name ON TABLE person TYPE string;
DEFINE FIELD status ON TABLE person TYPE string \
    ASSERT $value IN ['active', 'inactive'];
DEFINE INDEX idx_person_tenant_pernr ON TABLE person \
    COLUMNS tenant_id, pernr UNIQUE;
";

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Extension field configs
-- =======================================================================
DEFINE TABLE tenant_field_config SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE tenant_field_config TYPE string;
DEFINE FIELD field_key ON TABLE tenant_field_config TYPE string;
DEFINE FIELD value_type ON TABLE tenant_field_config TYPE string \
    ASSERT $value IN ['text', 'int', 'bool', 'date', 'uuid', 'numeric'];
DEFINE FIELD data_source_type ON TABLE tenant_field_config TYPE string \
    ASSERT $value IN ['PLAIN', 'DICT', 'ENTITY'];
DEFINE FIELD data_source_config ON TABLE tenant_field_config \
    TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD enabled_on ON TABLE tenant_field_config TYPE string;
DEFINE FIELD disabled_on ON TABLE tenant_field_config TYPE option<string>;
DEFINE INDEX idx_field_config_tenant_key ON TABLE tenant_field_config \
    COLUMNS tenant_id, field_key, enabled_on UNIQUE;

-- =======================================================================
-- Write-time field policies
-- =======================================================================
DEFINE TABLE tenant_field_policy SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE tenant_field_policy TYPE string;
DEFINE FIELD field_key ON TABLE tenant_field_policy TYPE string;
DEFINE FIELD scope_type ON TABLE tenant_field_policy TYPE string \
    ASSERT $value IN ['GLOBAL', 'FORM'];
DEFINE FIELD scope_key ON TABLE tenant_field_policy TYPE string;
DEFINE FIELD maintainable ON TABLE tenant_field_policy TYPE bool \
    DEFAULT true;
DEFINE FIELD default_mode ON TABLE tenant_field_policy TYPE string \
    DEFAULT 'NONE';
DEFINE FIELD default_rule_expr ON TABLE tenant_field_policy \
    TYPE option<string>;
DEFINE FIELD enabled_on ON TABLE tenant_field_policy TYPE string;
DEFINE FIELD disabled_on ON TABLE tenant_field_policy TYPE option<string>;
DEFINE INDEX idx_field_policy_scope ON TABLE tenant_field_policy \
    COLUMNS tenant_id, field_key, scope_type, scope_key, enabled_on UNIQUE;

-- =======================================================================
-- SetID strategy field decisions
-- =======================================================================
DEFINE TABLE setid_strategy_field_decision SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE setid_strategy_field_decision TYPE string;
DEFINE FIELD capability_key ON TABLE setid_strategy_field_decision \
    TYPE string;
DEFINE FIELD field_key ON TABLE setid_strategy_field_decision TYPE string;
DEFINE FIELD required ON TABLE setid_strategy_field_decision TYPE bool;
DEFINE FIELD visible ON TABLE setid_strategy_field_decision TYPE bool;
DEFINE FIELD maintainable ON TABLE setid_strategy_field_decision \
    TYPE bool;
DEFINE FIELD default_rule_ref ON TABLE setid_strategy_field_decision \
    TYPE option<string>;
DEFINE FIELD default_value ON TABLE setid_strategy_field_decision \
    TYPE option<string>;
DEFINE FIELD allowed_value_codes ON TABLE setid_strategy_field_decision \
    TYPE array<string> DEFAULT [];
DEFINE FIELD enabled_on ON TABLE setid_strategy_field_decision \
    TYPE string;
DEFINE FIELD disabled_on ON TABLE setid_strategy_field_decision \
    TYPE option<string>;
DEFINE INDEX idx_setid_decision_key ON TABLE setid_strategy_field_decision \
    COLUMNS tenant_id, capability_key, field_key, enabled_on UNIQUE;

-- =======================================================================
-- Dictionary items
-- =======================================================================
DEFINE TABLE dict_item SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE dict_item TYPE string;
DEFINE FIELD dict_code ON TABLE dict_item TYPE string;
DEFINE FIELD code ON TABLE dict_item TYPE string;
DEFINE FIELD label ON TABLE dict_item TYPE string;
DEFINE FIELD enabled_on ON TABLE dict_item TYPE string;
DEFINE FIELD disabled_on ON TABLE dict_item TYPE option<string>;
DEFINE INDEX idx_dict_item_code ON TABLE dict_item \
    COLUMNS tenant_id, dict_code, code, enabled_on UNIQUE;
";

/// Apply every migration newer than the recorded schema version.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}
