//! Cross-reference resolution and payload building shared by the
//! write services.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use orgunit_core::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use orgunit_core::field_keys::{
    FIELD_EFFECTIVE_DATE, FIELD_EXT, FIELD_EXT_LABELS_SNAPSHOT, FIELD_IS_BUSINESS_UNIT,
    FIELD_MANAGER_PERNR, FIELD_NAME, FIELD_PARENT_ORG_CODE, FIELD_STATUS,
};
use orgunit_core::models::event::OrgUnitEvent;
use orgunit_core::models::field::{FieldDataSourceType, TenantFieldConfig};
use orgunit_core::models::org_state::OrgState;
use orgunit_core::models::patch::OrgUnitPatch;
use orgunit_core::models::person::PersonStatus;
use orgunit_core::policy::{TARGET_STATUS_ACTIVE, TARGET_STATUS_DISABLED};
use orgunit_core::repository::{DictResolver, OrgUnitStore};
use orgunit_core::validate::{normalize_org_code, normalize_pernr, parse_effective_date};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Load state for an existing org; unknown codes fail `ORG_CODE_NOT_FOUND`.
pub(crate) async fn require_org<S: OrgUnitStore>(
    store: &S,
    tenant_id: Uuid,
    org_code: &str,
    as_of: NaiveDate,
) -> OrgUnitResult<(Uuid, OrgState)> {
    let state = store.load_org_state(tenant_id, org_code, as_of).await?;
    match state.org_id {
        Some(org_id) => Ok((org_id, state)),
        None => Err(OrgUnitError::conflict(
            ErrorCode::OrgCodeNotFound,
            format!("org code not found: {org_code}"),
        )),
    }
}

/// The live event at `effective_date`.
pub(crate) async fn require_target_event<S: OrgUnitStore>(
    store: &S,
    tenant_id: Uuid,
    org_id: Uuid,
    effective_date: NaiveDate,
) -> OrgUnitResult<OrgUnitEvent> {
    let event = store
        .find_event_by_effective_date(tenant_id, org_id, effective_date)
        .await?
        .ok_or_else(|| {
            OrgUnitError::conflict(
                ErrorCode::OrgEventNotFound,
                format!("no event on {effective_date}"),
            )
        })?;
    if event.rescinded {
        return Err(OrgUnitError::conflict(
            ErrorCode::OrgEventRescinded,
            format!("event {} was rescinded", event.event_uuid),
        ));
    }
    Ok(event)
}

pub(crate) fn ext_field_keys(configs: &[TenantFieldConfig]) -> Vec<String> {
    configs.iter().map(|c| c.field_key.clone()).collect()
}

/// Echo of the fields actually supplied in `patch`.
pub(crate) fn supplied_fields(patch: &OrgUnitPatch) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(date) = &patch.effective_date {
        fields.insert(FIELD_EFFECTIVE_DATE.into(), Value::from(date.trim()));
    }
    if let Some(name) = &patch.name {
        fields.insert(FIELD_NAME.into(), Value::from(name.trim()));
    }
    if let Some(parent) = &patch.parent_org_code {
        fields.insert(FIELD_PARENT_ORG_CODE.into(), Value::from(parent.trim()));
    }
    if let Some(flag) = patch.is_business_unit {
        fields.insert(FIELD_IS_BUSINESS_UNIT.into(), Value::from(flag));
    }
    if let Some(pernr) = &patch.manager_pernr {
        fields.insert(FIELD_MANAGER_PERNR.into(), Value::from(pernr.trim()));
    }
    if let Some(status) = &patch.status {
        fields.insert(FIELD_STATUS.into(), Value::from(status.trim()));
    }
    if !patch.ext.is_empty() {
        let ext: Map<String, Value> = patch
            .ext
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.insert(FIELD_EXT.into(), Value::Object(ext));
    }
    fields
}

/// Builds event payloads from a patch, resolving parent, manager and
/// dictionary references as of one date.
pub(crate) struct PayloadBuilder<'a, S, D> {
    pub store: &'a S,
    pub dict: &'a D,
    pub tenant_id: Uuid,
    pub as_of: NaiveDate,
}

impl<S: OrgUnitStore, D: DictResolver> PayloadBuilder<'_, S, D> {
    /// `payload_keys` maps each allowed logical field to its payload key.
    pub(crate) async fn build(
        &self,
        patch: &OrgUnitPatch,
        payload_keys: &BTreeMap<String, String>,
        configs: &[TenantFieldConfig],
    ) -> OrgUnitResult<Map<String, Value>> {
        let mut payload = Map::new();

        if let Some(raw) = &patch.effective_date {
            let date = parse_effective_date(raw)?;
            let key = payload_key(payload_keys, FIELD_EFFECTIVE_DATE)?;
            payload.insert(key, Value::from(date.to_string()));
        }
        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(OrgUnitError::bad_request(
                    ErrorCode::OrgInvalidArgument,
                    "name must not be blank",
                ));
            }
            payload.insert(payload_key(payload_keys, FIELD_NAME)?, Value::from(name));
        }
        if let Some(parent) = &patch.parent_org_code {
            let key = payload_key(payload_keys, FIELD_PARENT_ORG_CODE)?;
            let value = match self.resolve_parent(parent).await? {
                Some(id) => Value::from(id.to_string()),
                None => Value::Null,
            };
            payload.insert(key, value);
        }
        if let Some(flag) = patch.is_business_unit {
            payload.insert(
                payload_key(payload_keys, FIELD_IS_BUSINESS_UNIT)?,
                Value::from(flag),
            );
        }
        if let Some(raw) = &patch.manager_pernr {
            let key = payload_key(payload_keys, FIELD_MANAGER_PERNR)?;
            self.insert_manager(&mut payload, key, raw).await?;
        }
        if let Some(status) = &patch.status {
            let status = status.trim().to_lowercase();
            if status != TARGET_STATUS_ACTIVE && status != TARGET_STATUS_DISABLED {
                return Err(OrgUnitError::bad_request(
                    ErrorCode::OrgInvalidArgument,
                    format!("unsupported status: {status}"),
                ));
            }
            payload.insert(payload_key(payload_keys, FIELD_STATUS)?, Value::from(status));
        }
        if !patch.ext.is_empty() {
            let (ext, labels) = self.build_ext(patch, configs).await?;
            payload.insert(FIELD_EXT.into(), Value::Object(ext));
            if !labels.is_empty() {
                payload.insert(FIELD_EXT_LABELS_SNAPSHOT.into(), Value::Object(labels));
            }
        }
        Ok(payload)
    }

    /// Blank clears the parent; otherwise the parent must exist as of
    /// the write date.
    async fn resolve_parent(&self, raw: &str) -> OrgUnitResult<Option<Uuid>> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let code = normalize_org_code(raw)?;
        let state = self
            .store
            .load_org_state(self.tenant_id, &code, self.as_of)
            .await?;
        match state.org_id {
            Some(id) if state.exists_as_of => Ok(Some(id)),
            _ => Err(OrgUnitError::bad_request(
                ErrorCode::ParentNotFoundAsOf,
                format!("parent {code} not found as of {}", self.as_of),
            )),
        }
    }

    async fn insert_manager(
        &self,
        payload: &mut Map<String, Value>,
        key: String,
        raw: &str,
    ) -> OrgUnitResult<()> {
        if raw.trim().is_empty() {
            payload.insert(key, Value::Null);
            payload.insert("manager_uuid".into(), Value::Null);
            return Ok(());
        }
        let pernr = normalize_pernr(raw)?;
        let person = self
            .store
            .find_person_by_pernr(self.tenant_id, &pernr, self.as_of)
            .await?
            .ok_or_else(|| {
                OrgUnitError::bad_request(
                    ErrorCode::ManagerPernrNotFound,
                    format!("manager pernr not found: {pernr}"),
                )
            })?;
        if person.status != PersonStatus::Active {
            return Err(OrgUnitError::bad_request(
                ErrorCode::ManagerPernrInactive,
                format!("manager pernr inactive: {pernr}"),
            ));
        }
        payload.insert(key, Value::from(pernr));
        payload.insert("manager_uuid".into(), Value::from(person.uuid.to_string()));
        payload.insert("manager_name".into(), Value::from(person.display_name));
        Ok(())
    }

    /// Extension values plus a label snapshot for DICT fields.
    async fn build_ext(
        &self,
        patch: &OrgUnitPatch,
        configs: &[TenantFieldConfig],
    ) -> OrgUnitResult<(Map<String, Value>, Map<String, Value>)> {
        let mut ext = Map::new();
        let mut labels = Map::new();
        for (key, value) in &patch.ext {
            let config = configs
                .iter()
                .find(|c| c.field_key == *key)
                .ok_or_else(|| {
                    OrgUnitError::bad_request(
                        ErrorCode::PatchFieldNotAllowed,
                        format!("extension field not enabled: {key}"),
                    )
                })?;
            if config.data_source_type == FieldDataSourceType::Dict && !value.is_null() {
                let code = value.as_str().map(str::trim).ok_or_else(|| {
                    OrgUnitError::bad_request(
                        ErrorCode::OrgInvalidArgument,
                        format!("dictionary field {key} expects a string code"),
                    )
                })?;
                let dict_code = config.dict_code().ok_or_else(|| {
                    OrgUnitError::bad_request(
                        ErrorCode::OrgInvalidArgument,
                        format!("dictionary field {key} has no dict_code"),
                    )
                })?;
                let label = self
                    .dict
                    .resolve_value_label(self.tenant_id, self.as_of, dict_code, code)
                    .await?
                    .ok_or_else(|| {
                        OrgUnitError::bad_request(
                            ErrorCode::OrgInvalidArgument,
                            format!("{code:?} is not in dictionary {dict_code}"),
                        )
                    })?;
                ext.insert(key.clone(), Value::from(code));
                labels.insert(key.clone(), Value::from(label));
            } else {
                ext.insert(key.clone(), value.clone());
            }
        }
        Ok((ext, labels))
    }
}

fn payload_key(keys: &BTreeMap<String, String>, field: &str) -> OrgUnitResult<String> {
    keys.get(field).cloned().ok_or_else(|| {
        OrgUnitError::bad_request(
            ErrorCode::PatchFieldNotAllowed,
            format!("field not allowed: {field}"),
        )
    })
}
