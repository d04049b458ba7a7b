//! Tenant metadata tables read during writes: extension-field configs,
//! field policies, SetID field decisions and persons.

use chrono::NaiveDate;
use orgunit_core::models::field::{
    FieldDataSourceType, FieldDefaultMode, FieldPolicyScope, SetIdStrategyFieldDecision,
    TenantFieldConfig, TenantFieldPolicy,
};
use orgunit_core::models::person::{Person, PersonStatus};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::org_unit::SurrealOrgUnitStore;
use super::{ENABLED_AS_OF, date_key, parse_date, parse_optional_date, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct FieldConfigRow {
    field_key: String,
    value_type: String,
    data_source_type: String,
    data_source_config: serde_json::Value,
    enabled_on: String,
    disabled_on: Option<String>,
}

impl FieldConfigRow {
    fn try_into_config(self) -> Result<TenantFieldConfig, DbError> {
        Ok(TenantFieldConfig {
            data_source_type: self
                .data_source_type
                .parse::<FieldDataSourceType>()
                .map_err(|e| DbError::InvalidRow(e.to_string()))?,
            field_key: self.field_key,
            value_type: self.value_type,
            data_source_config: self.data_source_config,
            enabled_on: parse_date(&self.enabled_on)?,
            disabled_on: parse_optional_date(self.disabled_on.as_deref())?,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct FieldPolicyRow {
    field_key: String,
    maintainable: bool,
    default_mode: String,
    default_rule_expr: Option<String>,
    enabled_on: String,
    disabled_on: Option<String>,
}

impl FieldPolicyRow {
    fn try_into_policy(self, scope: FieldPolicyScope) -> Result<TenantFieldPolicy, DbError> {
        Ok(TenantFieldPolicy {
            default_mode: self
                .default_mode
                .parse::<FieldDefaultMode>()
                .map_err(|e| DbError::InvalidRow(e.to_string()))?,
            field_key: self.field_key,
            scope,
            maintainable: self.maintainable,
            default_rule_expr: self.default_rule_expr,
            enabled_on: parse_date(&self.enabled_on)?,
            disabled_on: parse_optional_date(self.disabled_on.as_deref())?,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct DecisionRow {
    capability_key: String,
    field_key: String,
    required: bool,
    visible: bool,
    maintainable: bool,
    default_rule_ref: Option<String>,
    default_value: Option<String>,
    allowed_value_codes: Vec<String>,
}

impl From<DecisionRow> for SetIdStrategyFieldDecision {
    fn from(row: DecisionRow) -> Self {
        Self {
            capability_key: row.capability_key,
            field_key: row.field_key,
            required: row.required,
            visible: row.visible,
            maintainable: row.maintainable,
            default_rule_ref: row.default_rule_ref,
            default_value: row.default_value,
            allowed_value_codes: row.allowed_value_codes,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct PersonRow {
    record_id: String,
    pernr: String,
    display_name: String,
    status: String,
}

fn parse_person_status(s: &str) -> Result<PersonStatus, DbError> {
    match s {
        "active" => Ok(PersonStatus::Active),
        "inactive" => Ok(PersonStatus::Inactive),
        other => Err(DbError::InvalidRow(format!("unknown person status: {other}"))),
    }
}

fn person_status_to_string(s: PersonStatus) -> &'static str {
    match s {
        PersonStatus::Active => "active",
        PersonStatus::Inactive => "inactive",
    }
}

fn default_mode_to_string(mode: FieldDefaultMode) -> &'static str {
    match mode {
        FieldDefaultMode::None => "NONE",
        FieldDefaultMode::Cel => "CEL",
    }
}

impl<C: Connection> SurrealOrgUnitStore<C> {
    pub(super) async fn enabled_field_configs(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Vec<TenantFieldConfig>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT * FROM tenant_field_config \
                 WHERE tenant_id = $tenant_id AND {ENABLED_AS_OF} \
                 ORDER BY field_key ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("as_of", date_key(as_of)))
            .await?;

        let rows: Vec<FieldConfigRow> = result.take(0)?;
        rows.into_iter()
            .map(FieldConfigRow::try_into_config)
            .collect()
    }

    /// The policy enabled as of `as_of` in exactly `scope`, no fallback.
    pub(super) async fn field_policy_in_scope(
        &self,
        tenant_id: Uuid,
        field_key: &str,
        scope: &FieldPolicyScope,
        as_of: NaiveDate,
    ) -> Result<Option<TenantFieldPolicy>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT * FROM tenant_field_policy \
                 WHERE tenant_id = $tenant_id AND field_key = $field_key \
                 AND scope_type = $scope_type AND scope_key = $scope_key \
                 AND {ENABLED_AS_OF} \
                 ORDER BY enabled_on DESC LIMIT 1"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("field_key", field_key.to_string()))
            .bind(("scope_type", scope.scope_type()))
            .bind(("scope_key", scope.scope_key().to_string()))
            .bind(("as_of", date_key(as_of)))
            .await?;

        let rows: Vec<FieldPolicyRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_policy(scope.clone()))
            .transpose()
    }

    pub(super) async fn setid_decision(
        &self,
        tenant_id: Uuid,
        capability_key: &str,
        field_key: &str,
        as_of: NaiveDate,
    ) -> Result<Option<SetIdStrategyFieldDecision>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT * FROM setid_strategy_field_decision \
                 WHERE tenant_id = $tenant_id AND capability_key = $capability_key \
                 AND field_key = $field_key AND {ENABLED_AS_OF} \
                 ORDER BY enabled_on DESC LIMIT 1"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("capability_key", capability_key.to_string()))
            .bind(("field_key", field_key.to_string()))
            .bind(("as_of", date_key(as_of)))
            .await?;

        let rows: Vec<DecisionRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    pub(super) async fn person_by_pernr(
        &self,
        tenant_id: Uuid,
        pernr: &str,
    ) -> Result<Option<Person>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM person \
                 WHERE tenant_id = $tenant_id AND pernr = $pernr",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("pernr", pernr.to_string()))
            .await?;

        let rows: Vec<PersonRow> = result.take(0)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(Person {
            uuid: parse_uuid(&row.record_id, "person")?,
            status: parse_person_status(&row.status)?,
            pernr: row.pernr,
            display_name: row.display_name,
        }))
    }

    /// Register an extension-field config for a tenant.
    pub async fn put_field_config(
        &self,
        tenant_id: Uuid,
        config: &TenantFieldConfig,
    ) -> Result<(), DbError> {
        self.db
            .query(
                "CREATE tenant_field_config SET \
                 tenant_id = $tenant_id, field_key = $field_key, \
                 value_type = $value_type, data_source_type = $data_source_type, \
                 data_source_config = $data_source_config, \
                 enabled_on = $enabled_on, disabled_on = $disabled_on",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("field_key", config.field_key.clone()))
            .bind(("value_type", config.value_type.clone()))
            .bind(("data_source_type", config.data_source_type.as_str()))
            .bind(("data_source_config", config.data_source_config.clone()))
            .bind(("enabled_on", date_key(config.enabled_on)))
            .bind(("disabled_on", config.disabled_on.map(date_key)))
            .await?
            .check()
            .map_err(DbError::from_statement)?;
        Ok(())
    }

    /// Register a write-time field policy.
    pub async fn put_field_policy(
        &self,
        tenant_id: Uuid,
        policy: &TenantFieldPolicy,
    ) -> Result<(), DbError> {
        self.db
            .query(
                "CREATE tenant_field_policy SET \
                 tenant_id = $tenant_id, field_key = $field_key, \
                 scope_type = $scope_type, scope_key = $scope_key, \
                 maintainable = $maintainable, default_mode = $default_mode, \
                 default_rule_expr = $default_rule_expr, \
                 enabled_on = $enabled_on, disabled_on = $disabled_on",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("field_key", policy.field_key.clone()))
            .bind(("scope_type", policy.scope.scope_type()))
            .bind(("scope_key", policy.scope.scope_key().to_string()))
            .bind(("maintainable", policy.maintainable))
            .bind(("default_mode", default_mode_to_string(policy.default_mode)))
            .bind(("default_rule_expr", policy.default_rule_expr.clone()))
            .bind(("enabled_on", date_key(policy.enabled_on)))
            .bind(("disabled_on", policy.disabled_on.map(date_key)))
            .await?
            .check()
            .map_err(DbError::from_statement)?;
        Ok(())
    }

    /// Register a SetID field decision effective from `enabled_on`.
    pub async fn put_setid_decision(
        &self,
        tenant_id: Uuid,
        decision: &SetIdStrategyFieldDecision,
        enabled_on: NaiveDate,
    ) -> Result<(), DbError> {
        self.db
            .query(
                "CREATE setid_strategy_field_decision SET \
                 tenant_id = $tenant_id, capability_key = $capability_key, \
                 field_key = $field_key, required = $required, visible = $visible, \
                 maintainable = $maintainable, default_rule_ref = $default_rule_ref, \
                 default_value = $default_value, \
                 allowed_value_codes = $allowed_value_codes, \
                 enabled_on = $enabled_on",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("capability_key", decision.capability_key.clone()))
            .bind(("field_key", decision.field_key.clone()))
            .bind(("required", decision.required))
            .bind(("visible", decision.visible))
            .bind(("maintainable", decision.maintainable))
            .bind(("default_rule_ref", decision.default_rule_ref.clone()))
            .bind(("default_value", decision.default_value.clone()))
            .bind(("allowed_value_codes", decision.allowed_value_codes.clone()))
            .bind(("enabled_on", date_key(enabled_on)))
            .await?
            .check()
            .map_err(DbError::from_statement)?;
        Ok(())
    }

    /// Register a person, keyed by normalized personnel number.
    pub async fn put_person(&self, tenant_id: Uuid, person: &Person) -> Result<(), DbError> {
        self.db
            .query(
                "CREATE type::record('person', $id) SET \
                 tenant_id = $tenant_id, pernr = $pernr, \
                 display_name = $display_name, status = $status",
            )
            .bind(("id", person.uuid.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("pernr", person.pernr.clone()))
            .bind(("display_name", person.display_name.clone()))
            .bind(("status", person_status_to_string(person.status)))
            .await?
            .check()
            .map_err(DbError::from_statement)?;
        Ok(())
    }
}
