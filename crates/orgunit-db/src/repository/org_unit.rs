//! SurrealDB implementation of [`OrgUnitStore`].
//!
//! Events live in `org_unit_event`. Corrections, status corrections and
//! rescinds are applied to their target event in place and recorded in
//! `org_unit_correction` under the caller's request code, in the same
//! transaction. `org_unit` keeps the identity and current parent of each
//! org so tree facts can be answered without replaying events.

use chrono::{DateTime, NaiveDate, Utc};
use orgunit_core::autocode::AutoCodeSpec;
use orgunit_core::error::OrgUnitResult;
use orgunit_core::models::event::{
    GeneratedCreate, OrgUnitEvent, OrgUnitEventType, RequestCodeHit, RequestCodeSource,
    SubmitCorrection, SubmitGeneratedCreate, SubmitOrgUnitEvent, SubmitRescindEvent,
    SubmitRescindOrg, SubmitStatusCorrection,
};
use orgunit_core::models::field::{
    FieldPolicyScope, SetIdStrategyFieldDecision, TenantFieldConfig, TenantFieldPolicy,
};
use orgunit_core::models::org_state::OrgState;
use orgunit_core::models::person::Person;
use orgunit_core::repository::OrgUnitStore;
use serde_json::Value;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::autocode::{AllocationLocks, StoreConfig};
use super::{CountRow, date_key, parse_date, parse_uuid, total};
use crate::error::{DbError, EVENT_REQUEST_INDEX, ORG_CODE_INDEX};

const EVENT_FIELDS: &str = "meta::id(id) AS record_id, org_id, event_type, effective_date, \
                            payload, request_code, rescinded, transaction_time";

#[derive(Debug, SurrealValue)]
struct EventRow {
    record_id: String,
    org_id: String,
    event_type: String,
    effective_date: String,
    payload: serde_json::Value,
    request_code: String,
    rescinded: bool,
    transaction_time: DateTime<Utc>,
}

impl EventRow {
    fn try_into_event(self) -> Result<OrgUnitEvent, DbError> {
        let event_type = self
            .event_type
            .parse::<OrgUnitEventType>()
            .map_err(|e| DbError::InvalidRow(e.to_string()))?;
        Ok(OrgUnitEvent {
            event_uuid: parse_uuid(&self.record_id, "event")?,
            org_id: parse_uuid(&self.org_id, "org")?,
            event_type,
            effective_date: parse_date(&self.effective_date)?,
            payload: self.payload,
            request_code: Some(self.request_code),
            rescinded: self.rescinded,
            transaction_time: self.transaction_time,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct OrgRow {
    record_id: String,
    parent_id: Option<String>,
    created_on: String,
    rescinded: bool,
}

#[derive(Debug, SurrealValue)]
struct OrgIdRow {
    record_id: String,
}

#[derive(Debug, SurrealValue)]
struct OrgCodeRow {
    org_code: String,
}

#[derive(Debug, SurrealValue)]
struct CorrectionTargetRow {
    kind: String,
    target_event_uuid: Option<String>,
}

/// The `org_unit.parent_id` an event moves the org to, if it moves it.
fn parent_change(event_type: OrgUnitEventType, payload: &Value) -> Option<Option<String>> {
    let key = match event_type {
        OrgUnitEventType::Move => "new_parent_id",
        _ => "parent_id",
    };
    payload
        .get(key)
        .map(|value| value.as_str().map(str::to_string))
}

/// Merge `patch` into `payload`, returning the corrected effective date.
fn merge_patch(payload: &mut Value, patch: &Value) -> Result<Option<NaiveDate>, DbError> {
    let Value::Object(patch) = patch else {
        return Ok(None);
    };
    if !payload.is_object() {
        *payload = Value::Object(Default::default());
    }
    let mut effective_date = None;
    if let Value::Object(target) = payload {
        for (key, value) in patch {
            if key == "effective_date"
                && let Some(s) = value.as_str()
            {
                effective_date = Some(parse_date(s)?);
            }
            target.insert(key.clone(), value.clone());
        }
    }
    Ok(effective_date)
}

/// SurrealDB implementation of the org-unit store.
#[derive(Clone)]
pub struct SurrealOrgUnitStore<C: Connection> {
    pub(super) db: Surreal<C>,
    pub(super) config: StoreConfig,
    pub(super) allocation_locks: AllocationLocks,
}

impl<C: Connection> SurrealOrgUnitStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_config(db, StoreConfig::default())
    }

    pub fn with_config(db: Surreal<C>, config: StoreConfig) -> Self {
        Self {
            db,
            config,
            allocation_locks: AllocationLocks::default(),
        }
    }

    /// Request codes are unique per tenant across events and corrections.
    async fn ensure_request_code_free(
        &self,
        tenant_id: &str,
        request_code: &str,
    ) -> Result<(), DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM org_unit_event \
                 WHERE tenant_id = $tenant_id AND request_code = $request_code GROUP ALL; \
                 SELECT count() AS total FROM org_unit_correction \
                 WHERE tenant_id = $tenant_id AND request_code = $request_code GROUP ALL;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("request_code", request_code.to_string()))
            .await?;

        let events: Vec<CountRow> = result.take(0)?;
        let corrections: Vec<CountRow> = result.take(1)?;
        if total(&events) + total(&corrections) > 0 {
            return Err(DbError::UniqueViolation {
                index: EVENT_REQUEST_INDEX,
                message: format!("request code {request_code:?} already used"),
            });
        }
        Ok(())
    }

    async fn ensure_org_code_free(&self, tenant_id: &str, org_code: &str) -> Result<(), DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM org_unit \
                 WHERE tenant_id = $tenant_id AND org_code = $org_code GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("org_code", org_code.to_string()))
            .await?;

        let rows: Vec<CountRow> = result.take(0)?;
        if total(&rows) > 0 {
            return Err(DbError::UniqueViolation {
                index: ORG_CODE_INDEX,
                message: format!("org code {org_code:?} already exists"),
            });
        }
        Ok(())
    }

    async fn fetch_event(
        &self,
        tenant_id: Uuid,
        event_uuid: Uuid,
    ) -> Result<Option<OrgUnitEvent>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {EVENT_FIELDS} FROM type::record('org_unit_event', $id) \
                 WHERE tenant_id = $tenant_id"
            ))
            .bind(("id", event_uuid.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;

        let rows: Vec<EventRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(EventRow::try_into_event)
            .transpose()
    }

    async fn require_event(&self, tenant_id: Uuid, event_uuid: Uuid) -> Result<OrgUnitEvent, DbError> {
        self.fetch_event(tenant_id, event_uuid)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "org_unit_event".into(),
                id: event_uuid.to_string(),
            })
    }

    /// The target of a correction, checked to belong to `org_id`.
    async fn require_target(
        &self,
        tenant_id: Uuid,
        org_id: Uuid,
        event_uuid: Uuid,
    ) -> Result<OrgUnitEvent, DbError> {
        let event = self.require_event(tenant_id, event_uuid).await?;
        if event.org_id != org_id {
            return Err(DbError::NotFound {
                entity: "org_unit_event".into(),
                id: format!("{event_uuid} for org {org_id}"),
            });
        }
        Ok(event)
    }

    /// Insert one event, creating the org row for a CREATE.
    pub(super) async fn insert_event(
        &self,
        tenant_id: Uuid,
        input: SubmitOrgUnitEvent,
    ) -> Result<OrgUnitEvent, DbError> {
        let tenant = tenant_id.to_string();
        self.ensure_request_code_free(&tenant, &input.request_code)
            .await?;

        let (org_id, creates_org) = match input.org_id {
            Some(id) => (id, false),
            None => (Uuid::new_v4(), true),
        };
        if creates_org {
            self.ensure_org_code_free(&tenant, &input.org_code).await?;
        }
        let parent = parent_change(input.event_type, &input.payload);

        let mut sql = String::from("BEGIN TRANSACTION;\n");
        if creates_org {
            sql.push_str(
                "CREATE type::record('org_unit', $org_id) SET \
                 tenant_id = $tenant_id, org_code = $org_code, \
                 parent_id = $parent_id, created_on = $effective_date;\n",
            );
        } else if parent.is_some() {
            sql.push_str(
                "UPDATE type::record('org_unit', $org_id) SET parent_id = $parent_id \
                 WHERE tenant_id = $tenant_id;\n",
            );
        }
        sql.push_str(
            "CREATE type::record('org_unit_event', $event_id) SET \
             tenant_id = $tenant_id, org_id = $org_id, event_type = $event_type, \
             effective_date = $effective_date, payload = $payload, \
             request_code = $request_code, initiator_id = $initiator_id;\n\
             COMMIT TRANSACTION;",
        );

        self.db
            .query(sql)
            .bind(("tenant_id", tenant))
            .bind(("org_id", org_id.to_string()))
            .bind(("org_code", input.org_code))
            .bind(("parent_id", parent.flatten()))
            .bind(("event_id", input.event_uuid.to_string()))
            .bind(("event_type", input.event_type.as_str().to_string()))
            .bind(("effective_date", date_key(input.effective_date)))
            .bind(("payload", input.payload))
            .bind(("request_code", input.request_code))
            .bind(("initiator_id", input.initiator_id.map(|id| id.to_string())))
            .await?
            .check()
            .map_err(DbError::from_statement)?;

        self.require_event(tenant_id, input.event_uuid).await
    }

    /// Record a correction row and apply `apply_sql` to the target event
    /// in one transaction. `$parent_id` is always bound for `apply_sql`.
    async fn record_correction(
        &self,
        tenant_id: Uuid,
        record: CorrectionRecord,
        apply_sql: &str,
        binds: Vec<(&'static str, Value)>,
    ) -> Result<(), DbError> {
        let sql = format!(
            "BEGIN TRANSACTION;\n\
             CREATE org_unit_correction SET \
             tenant_id = $tenant_id, org_id = $org_id, \
             target_event_uuid = $target_event_uuid, kind = $kind, patch = $patch, \
             reason = $reason, request_code = $request_code, \
             initiator_id = $initiator_id;\n\
             {apply_sql}\n\
             COMMIT TRANSACTION;"
        );

        let mut query = self
            .db
            .query(sql)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("org_id", record.org_id.to_string()))
            .bind((
                "target_event_uuid",
                record.target_event_uuid.map(|id| id.to_string()),
            ))
            .bind(("kind", record.kind))
            .bind(("patch", record.patch))
            .bind(("reason", record.reason))
            .bind(("request_code", record.request_code))
            .bind(("initiator_id", record.initiator_id.map(|id| id.to_string())))
            .bind(("parent_id", record.parent_id));
        for bind in binds {
            query = query.bind(bind);
        }
        query.await?.check().map_err(DbError::from_statement)?;
        Ok(())
    }
}

/// One `org_unit_correction` row.
struct CorrectionRecord {
    org_id: Uuid,
    target_event_uuid: Option<Uuid>,
    kind: &'static str,
    patch: Value,
    reason: Option<String>,
    request_code: String,
    initiator_id: Option<Uuid>,
    /// New `org_unit.parent_id`, when the correction moves the org.
    parent_id: Option<String>,
}

impl<C: Connection> OrgUnitStore for SurrealOrgUnitStore<C> {
    async fn submit_event(
        &self,
        tenant_id: Uuid,
        input: SubmitOrgUnitEvent,
    ) -> OrgUnitResult<OrgUnitEvent> {
        Ok(self.insert_event(tenant_id, input).await?)
    }

    async fn submit_correction(
        &self,
        tenant_id: Uuid,
        input: SubmitCorrection,
    ) -> OrgUnitResult<OrgUnitEvent> {
        self.ensure_request_code_free(&tenant_id.to_string(), &input.request_code)
            .await?;
        let target = self
            .require_target(tenant_id, input.org_id, input.target_event_uuid)
            .await?;

        let mut payload = target.payload.clone();
        let effective_date = merge_patch(&mut payload, &input.patch)?
            .unwrap_or(target.effective_date);

        let mut apply_sql = String::from(
            "UPDATE type::record('org_unit_event', $event_id) SET \
             payload = $payload, effective_date = $effective_date;",
        );
        let binds = vec![
            ("event_id", Value::String(target.event_uuid.to_string())),
            ("payload", payload),
            ("effective_date", Value::String(date_key(effective_date))),
        ];
        if target.event_type == OrgUnitEventType::Create && effective_date != target.effective_date
        {
            apply_sql.push_str(
                "\nUPDATE type::record('org_unit', $org_id) SET created_on = $effective_date;",
            );
        }
        let parent = parent_change(target.event_type, &input.patch);
        if parent.is_some() {
            apply_sql.push_str(
                "\nUPDATE type::record('org_unit', $org_id) SET parent_id = $parent_id;",
            );
        }

        self.record_correction(
            tenant_id,
            CorrectionRecord {
                org_id: input.org_id,
                target_event_uuid: Some(input.target_event_uuid),
                kind: "PATCH",
                patch: input.patch,
                reason: None,
                request_code: input.request_code,
                initiator_id: input.initiator_id,
                parent_id: parent.flatten(),
            },
            &apply_sql,
            binds,
        )
        .await?;

        Ok(self.require_event(tenant_id, input.target_event_uuid).await?)
    }

    async fn submit_status_correction(
        &self,
        tenant_id: Uuid,
        input: SubmitStatusCorrection,
    ) -> OrgUnitResult<OrgUnitEvent> {
        self.ensure_request_code_free(&tenant_id.to_string(), &input.request_code)
            .await?;
        let target = self
            .require_target(tenant_id, input.org_id, input.target_event_uuid)
            .await?;

        let event_type = if input.target_status == "active" {
            OrgUnitEventType::Enable
        } else {
            OrgUnitEventType::Disable
        };

        self.record_correction(
            tenant_id,
            CorrectionRecord {
                org_id: input.org_id,
                target_event_uuid: Some(target.event_uuid),
                kind: "STATUS",
                patch: serde_json::json!({ "target_status": input.target_status }),
                reason: None,
                request_code: input.request_code,
                initiator_id: input.initiator_id,
                parent_id: None,
            },
            "UPDATE type::record('org_unit_event', $event_id) SET event_type = $event_type;",
            vec![
                ("event_id", Value::String(target.event_uuid.to_string())),
                ("event_type", Value::String(event_type.as_str().to_string())),
            ],
        )
        .await?;

        Ok(self.require_event(tenant_id, target.event_uuid).await?)
    }

    async fn submit_rescind_event(
        &self,
        tenant_id: Uuid,
        input: SubmitRescindEvent,
    ) -> OrgUnitResult<OrgUnitEvent> {
        self.ensure_request_code_free(&tenant_id.to_string(), &input.request_code)
            .await?;
        let target = self
            .require_target(tenant_id, input.org_id, input.target_event_uuid)
            .await?;

        let mut apply_sql =
            String::from("UPDATE type::record('org_unit_event', $event_id) SET rescinded = true;");
        if target.event_type == OrgUnitEventType::Create {
            apply_sql
                .push_str("\nUPDATE type::record('org_unit', $org_id) SET rescinded = true;");
        }

        self.record_correction(
            tenant_id,
            CorrectionRecord {
                org_id: input.org_id,
                target_event_uuid: Some(target.event_uuid),
                kind: "RESCIND_EVENT",
                patch: Value::Object(Default::default()),
                reason: Some(input.reason),
                request_code: input.request_code,
                initiator_id: input.initiator_id,
                parent_id: None,
            },
            &apply_sql,
            vec![("event_id", Value::String(target.event_uuid.to_string()))],
        )
        .await?;

        Ok(self.require_event(tenant_id, target.event_uuid).await?)
    }

    async fn submit_rescind_org(
        &self,
        tenant_id: Uuid,
        input: SubmitRescindOrg,
    ) -> OrgUnitResult<u64> {
        let tenant = tenant_id.to_string();
        self.ensure_request_code_free(&tenant, &input.request_code)
            .await?;

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM org_unit_event \
                 WHERE tenant_id = $tenant_id AND org_id = $org_id \
                 AND rescinded = false GROUP ALL",
            )
            .bind(("tenant_id", tenant))
            .bind(("org_id", input.org_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let live_events = total(&rows);

        self.record_correction(
            tenant_id,
            CorrectionRecord {
                org_id: input.org_id,
                target_event_uuid: None,
                kind: "RESCIND_ORG",
                patch: Value::Object(Default::default()),
                reason: Some(input.reason),
                request_code: input.request_code,
                initiator_id: input.initiator_id,
                parent_id: None,
            },
            "UPDATE org_unit_event SET rescinded = true \
             WHERE tenant_id = $tenant_id AND org_id = $org_id AND rescinded = false;\n\
             UPDATE type::record('org_unit', $org_id) SET rescinded = true;",
            Vec::new(),
        )
        .await?;

        Ok(live_events)
    }

    async fn submit_create_with_generated_code(
        &self,
        tenant_id: Uuid,
        spec: &AutoCodeSpec,
        input: SubmitGeneratedCreate,
    ) -> OrgUnitResult<GeneratedCreate> {
        self.allocate_and_create(tenant_id, spec, input).await
    }

    async fn find_event_by_uuid(
        &self,
        tenant_id: Uuid,
        event_uuid: Uuid,
    ) -> OrgUnitResult<Option<OrgUnitEvent>> {
        Ok(self.fetch_event(tenant_id, event_uuid).await?)
    }

    async fn find_event_by_effective_date(
        &self,
        tenant_id: Uuid,
        org_id: Uuid,
        effective_date: NaiveDate,
    ) -> OrgUnitResult<Option<OrgUnitEvent>> {
        // A live event wins over a rescinded one on the same day.
        let mut result = self
            .db
            .query(format!(
                "SELECT {EVENT_FIELDS} FROM org_unit_event \
                 WHERE tenant_id = $tenant_id AND org_id = $org_id \
                 AND effective_date = $effective_date \
                 ORDER BY rescinded ASC, transaction_time DESC LIMIT 1"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("org_id", org_id.to_string()))
            .bind(("effective_date", date_key(effective_date)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<EventRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(EventRow::try_into_event)
            .transpose()?)
    }

    async fn find_event_by_request_code(
        &self,
        tenant_id: Uuid,
        request_code: &str,
    ) -> OrgUnitResult<Option<RequestCodeHit>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {EVENT_FIELDS} FROM org_unit_event \
                 WHERE tenant_id = $tenant_id AND request_code = $request_code LIMIT 1; \
                 SELECT kind, target_event_uuid FROM org_unit_correction \
                 WHERE tenant_id = $tenant_id AND request_code = $request_code LIMIT 1;"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("request_code", request_code.to_string()))
            .await
            .map_err(DbError::from)?;

        let events: Vec<EventRow> = result.take(0).map_err(DbError::from)?;
        if let Some(row) = events.into_iter().next() {
            return Ok(Some(RequestCodeHit {
                event: row.try_into_event()?,
                source: RequestCodeSource::Event,
            }));
        }

        let corrections: Vec<CorrectionTargetRow> = result.take(1).map_err(DbError::from)?;
        let Some((kind, target)) = corrections
            .into_iter()
            .next()
            .and_then(|row| Some((row.kind, row.target_event_uuid?)))
        else {
            return Ok(None);
        };
        let source = if kind == "PATCH" {
            RequestCodeSource::PayloadCorrection
        } else {
            RequestCodeSource::OtherCorrection
        };
        let target = parse_uuid(&target, "event")?;
        Ok(self
            .fetch_event(tenant_id, target)
            .await?
            .map(|event| RequestCodeHit { event, source }))
    }

    async fn list_enabled_field_configs(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
    ) -> OrgUnitResult<Vec<TenantFieldConfig>> {
        Ok(self.enabled_field_configs(tenant_id, as_of).await?)
    }

    async fn resolve_org_id(&self, tenant_id: Uuid, org_code: &str) -> OrgUnitResult<Option<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM org_unit \
                 WHERE tenant_id = $tenant_id AND org_code = $org_code",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("org_code", org_code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrgIdRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| parse_uuid(&row.record_id, "org"))
            .transpose()?)
    }

    async fn resolve_org_code(&self, tenant_id: Uuid, org_id: Uuid) -> OrgUnitResult<Option<String>> {
        let mut result = self
            .db
            .query(
                "SELECT org_code FROM type::record('org_unit', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", org_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrgCodeRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| row.org_code))
    }

    async fn load_org_state(
        &self,
        tenant_id: Uuid,
        org_code: &str,
        as_of: NaiveDate,
    ) -> OrgUnitResult<OrgState> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM org_unit \
                 WHERE tenant_id = $tenant_id AND parent_id = NONE \
                 AND rescinded = false GROUP ALL; \
                 SELECT meta::id(id) AS record_id, parent_id, created_on, rescinded \
                 FROM org_unit WHERE tenant_id = $tenant_id AND org_code = $org_code; \
                 SELECT count() AS total FROM org_unit \
                 WHERE tenant_id = $tenant_id AND parent_id != NONE \
                 AND parent_id IN (SELECT VALUE meta::id(id) FROM org_unit \
                 WHERE tenant_id = $tenant_id AND org_code = $org_code) \
                 AND rescinded = false GROUP ALL;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("org_code", org_code.to_string()))
            .await
            .map_err(DbError::from)?;

        let roots: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let orgs: Vec<OrgRow> = result.take(1).map_err(DbError::from)?;
        let children: Vec<CountRow> = result.take(2).map_err(DbError::from)?;

        let mut state = OrgState {
            tree_initialized: total(&roots) > 0,
            ..OrgState::default()
        };
        if let Some(org) = orgs.into_iter().next() {
            let created_on = parse_date(&org.created_on)?;
            state.org_id = Some(parse_uuid(&org.record_id, "org")?);
            state.exists_as_of = !org.rescinded && created_on <= as_of;
            state.is_root = org.parent_id.is_none();
            state.has_children = total(&children) > 0;
        }
        Ok(state)
    }

    async fn resolve_field_policy(
        &self,
        tenant_id: Uuid,
        field_key: &str,
        scope: &FieldPolicyScope,
        as_of: NaiveDate,
    ) -> OrgUnitResult<Option<TenantFieldPolicy>> {
        if let Some(policy) = self
            .field_policy_in_scope(tenant_id, field_key, scope, as_of)
            .await?
        {
            return Ok(Some(policy));
        }
        if *scope == FieldPolicyScope::Global {
            return Ok(None);
        }
        Ok(self
            .field_policy_in_scope(tenant_id, field_key, &FieldPolicyScope::Global, as_of)
            .await?)
    }

    async fn resolve_setid_strategy_field_decision(
        &self,
        tenant_id: Uuid,
        capability_key: &str,
        field_key: &str,
        as_of: NaiveDate,
    ) -> OrgUnitResult<Option<SetIdStrategyFieldDecision>> {
        Ok(self
            .setid_decision(tenant_id, capability_key, field_key, as_of)
            .await?)
    }

    async fn find_person_by_pernr(
        &self,
        tenant_id: Uuid,
        pernr: &str,
        _as_of: NaiveDate,
    ) -> OrgUnitResult<Option<Person>> {
        Ok(self.person_by_pernr(tenant_id, pernr).await?)
    }
}
