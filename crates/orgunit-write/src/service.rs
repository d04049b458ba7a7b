//! Unified write service: one entry point for create, add-version,
//! insert-version and correct.

use std::sync::Arc;

use chrono::NaiveDate;
use orgunit_core::autocode::CelProgramCache;
use orgunit_core::capabilities::{
    WriteCapabilities, WriteCapabilitiesFacts, WriteIntent, resolve_write_capabilities,
};
use orgunit_core::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use orgunit_core::field_keys::{FIELD_EFFECTIVE_DATE, FIELD_ORG_CODE};
use orgunit_core::models::event::{
    OrgUnitEvent, OrgUnitEventType, SubmitCorrection, SubmitGeneratedCreate, SubmitOrgUnitEvent,
};
use orgunit_core::models::org_state::OrgState;
use orgunit_core::models::patch::OrgUnitPatch;
use orgunit_core::policy::{
    MutationPolicyFacts, MutationPolicyKey, resolve_mutation_policy, validate_patch,
};
use orgunit_core::repository::{DictResolver, OrgUnitStore};
use orgunit_core::validate::{normalize_org_code, parse_effective_date, require_request_code};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::config::WriteConfig;
use crate::defaults::apply_create_policy_defaults;
use crate::idempotency::resolve_idempotent_write;
use crate::resolve::{
    PayloadBuilder, ext_field_keys, require_org, require_target_event, supplied_fields,
};

/// Input for one unified write.
#[derive(Debug, Clone)]
pub struct WriteOrgUnitRequest {
    pub intent: WriteIntent,
    /// Required for every intent except a create whose code is generated.
    pub org_code: Option<String>,
    /// `YYYY-MM-DD`. For `Correct` this is the target event's date.
    pub effective_date: String,
    pub request_code: String,
    pub patch: OrgUnitPatch,
    /// FORM scope for create-time field policies; defaults to
    /// [`WriteConfig::default_policy_scope_key`].
    pub policy_scope_key: Option<String>,
    pub can_admin: bool,
    pub initiator_id: Option<Uuid>,
}

/// Outcome of a unified write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOrgUnitResult {
    pub org_code: String,
    pub effective_date: NaiveDate,
    pub event_type: OrgUnitEventType,
    pub event_uuid: Uuid,
    /// Only the fields supplied in the request patch.
    pub fields: Map<String, Value>,
}

/// Unified write orchestrator.
///
/// Generic over the store and dictionary implementations so the write
/// layer has no dependency on the database crate.
pub struct OrgUnitWriteService<S: OrgUnitStore, D: DictResolver> {
    store: S,
    dict: D,
    cel_cache: Arc<CelProgramCache>,
    config: WriteConfig,
}

impl<S: OrgUnitStore, D: DictResolver> OrgUnitWriteService<S, D> {
    pub fn new(store: S, dict: D, cel_cache: Arc<CelProgramCache>, config: WriteConfig) -> Self {
        Self {
            store,
            dict,
            cel_cache,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn write(
        &self,
        tenant_id: Uuid,
        request: WriteOrgUnitRequest,
    ) -> OrgUnitResult<WriteOrgUnitResult> {
        let intent = request.intent;

        // 1. Request code, date and org code.
        let request_code = require_request_code(&request.request_code)?;
        let effective_date = parse_effective_date(&request.effective_date)?;
        let explicit_code = request
            .org_code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(normalize_org_code)
            .transpose()?;

        // 2. Replay a prior write under the same request code.
        if let Some(replayed) = resolve_idempotent_write(
            &self.store,
            tenant_id,
            intent,
            explicit_code.as_deref(),
            &request_code,
            &request.patch,
        )
        .await?
        {
            return Ok(replayed);
        }

        // 3. Org facts.
        let (org_id, state) = match (intent, explicit_code.as_deref()) {
            (WriteIntent::CreateOrg, code) => {
                let state = self
                    .store
                    .load_org_state(tenant_id, code.unwrap_or_default(), effective_date)
                    .await?;
                (None, state)
            }
            (_, Some(code)) => {
                let (org_id, state) =
                    require_org(&self.store, tenant_id, code, effective_date).await?;
                (Some(org_id), state)
            }
            (_, None) => {
                return Err(OrgUnitError::bad_request(
                    ErrorCode::OrgCodeInvalid,
                    "org_code is required",
                ));
            }
        };

        // 4. Extension fields enabled as of the write date.
        let configs = self
            .store
            .list_enabled_field_configs(tenant_id, effective_date)
            .await?;
        let ext_keys = ext_field_keys(&configs);

        let caps = resolve_write_capabilities(
            intent,
            &WriteCapabilitiesFacts {
                can_admin: request.can_admin,
                tree_initialized: state.tree_initialized,
                org_already_exists: state.org_id.is_some(),
                creating_root: is_blank(request.patch.parent_org_code.as_deref()),
                target_exists_as_of: state.exists_as_of,
                enabled_ext_field_keys: ext_keys.clone(),
            },
        );
        caps.ensure_enabled()?;
        check_supplied_fields(intent, &caps, &request.patch)?;

        let payloads = PayloadBuilder {
            store: &self.store,
            dict: &self.dict,
            tenant_id,
            as_of: effective_date,
        };

        let event = match intent {
            WriteIntent::CreateOrg => {
                if is_blank(request.patch.name.as_deref()) {
                    return Err(OrgUnitError::bad_request(
                        ErrorCode::OrgInvalidArgument,
                        "name is required to create an org",
                    ));
                }

                // 5. Field policy defaults for org_code.
                let scope_key = request
                    .policy_scope_key
                    .as_deref()
                    .filter(|k| !k.trim().is_empty())
                    .unwrap_or(&self.config.default_policy_scope_key);
                let spec = apply_create_policy_defaults(
                    &self.store,
                    &self.cel_cache,
                    tenant_id,
                    scope_key,
                    explicit_code.as_deref(),
                    effective_date,
                )
                .await?;

                // 6. Payload.
                let mut payload = payloads
                    .build(&request.patch, &caps.field_payload_keys, &configs)
                    .await?;

                // 7. Submit.
                if let Some(spec) = spec {
                    let created = self
                        .store
                        .submit_create_with_generated_code(
                            tenant_id,
                            &spec,
                            SubmitGeneratedCreate {
                                event_uuid: Uuid::new_v4(),
                                effective_date,
                                payload: Value::Object(payload),
                                request_code: request_code.clone(),
                                initiator_id: request.initiator_id,
                            },
                        )
                        .await?;
                    return Ok(self.finish(
                        tenant_id,
                        intent,
                        &request_code,
                        created.org_code,
                        created.event,
                        &request.patch,
                    ));
                }

                let org_code = explicit_code.clone().ok_or_else(|| {
                    OrgUnitError::bad_request(ErrorCode::OrgCodeInvalid, "org_code is required")
                })?;
                payload.insert(FIELD_ORG_CODE.into(), Value::from(org_code.clone()));
                self.store
                    .submit_event(
                        tenant_id,
                        SubmitOrgUnitEvent {
                            event_uuid: Uuid::new_v4(),
                            org_id: None,
                            org_code,
                            event_type: OrgUnitEventType::Create,
                            effective_date,
                            payload: Value::Object(payload),
                            request_code: request_code.clone(),
                            initiator_id: request.initiator_id,
                        },
                    )
                    .await?
            }
            WriteIntent::AddVersion | WriteIntent::InsertVersion => {
                require_patch(&request.patch)?;
                let payload = payloads
                    .build(&request.patch, &caps.field_payload_keys, &configs)
                    .await?;
                self.store
                    .submit_event(
                        tenant_id,
                        SubmitOrgUnitEvent {
                            event_uuid: Uuid::new_v4(),
                            org_id,
                            org_code: explicit_code.clone().unwrap_or_default(),
                            event_type: OrgUnitEventType::Update,
                            effective_date,
                            payload: Value::Object(payload),
                            request_code: request_code.clone(),
                            initiator_id: request.initiator_id,
                        },
                    )
                    .await?
            }
            WriteIntent::Correct => {
                require_patch(&request.patch)?;
                let org_id = org_id.ok_or_else(|| {
                    OrgUnitError::Internal("correct resolved no org id".into())
                })?;
                let target =
                    require_target_event(&self.store, tenant_id, org_id, effective_date).await?;
                let decision = resolve_mutation_policy(
                    MutationPolicyKey::CorrectEvent {
                        target: target.event_type,
                    },
                    &correction_facts(request.can_admin, &state, ext_keys),
                )?;
                decision.ensure_enabled()?;
                validate_patch(effective_date, &decision, &request.patch)?;

                let payload = payloads
                    .build(&request.patch, &decision.field_payload_keys, &configs)
                    .await?;
                self.store
                    .submit_correction(
                        tenant_id,
                        SubmitCorrection {
                            org_id,
                            target_event_uuid: target.event_uuid,
                            target_effective_date: effective_date,
                            patch: Value::Object(payload),
                            request_code: request_code.clone(),
                            initiator_id: request.initiator_id,
                        },
                    )
                    .await?
            }
        };

        let org_code = explicit_code.unwrap_or_default();
        Ok(self.finish(
            tenant_id,
            intent,
            &request_code,
            org_code,
            event,
            &request.patch,
        ))
    }

    fn finish(
        &self,
        tenant_id: Uuid,
        intent: WriteIntent,
        request_code: &str,
        org_code: String,
        event: OrgUnitEvent,
        patch: &OrgUnitPatch,
    ) -> WriteOrgUnitResult {
        info!(
            tenant_id = %tenant_id,
            org_code = %org_code,
            intent = %intent,
            request_code,
            event_uuid = %event.event_uuid,
            effective_date = %event.effective_date,
            "Org unit write applied"
        );
        // 8. Echo only what the caller supplied.
        WriteOrgUnitResult {
            org_code,
            effective_date: event.effective_date,
            event_type: event.event_type,
            event_uuid: event.event_uuid,
            fields: supplied_fields(patch),
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn require_patch(patch: &OrgUnitPatch) -> OrgUnitResult<()> {
    if patch.is_empty() {
        return Err(OrgUnitError::bad_request(
            ErrorCode::PatchRequired,
            "patch must contain at least one field",
        ));
    }
    Ok(())
}

/// Every supplied field must be one the capabilities allow. A new
/// effective date is only meaningful for corrections, whose field set
/// the mutation policy checks separately.
fn check_supplied_fields(
    intent: WriteIntent,
    caps: &WriteCapabilities,
    patch: &OrgUnitPatch,
) -> OrgUnitResult<()> {
    let core = patch.present_core_fields().into_iter().filter(|f| {
        !(intent == WriteIntent::Correct && *f == FIELD_EFFECTIVE_DATE)
    });
    for field in core.chain(patch.ext.keys().map(String::as_str)) {
        if field.trim() != field || !caps.allows(field) {
            return Err(OrgUnitError::bad_request(
                ErrorCode::PatchFieldNotAllowed,
                format!("field not allowed for {intent}: {field:?}"),
            ));
        }
    }
    Ok(())
}

fn correction_facts(can_admin: bool, state: &OrgState, ext_keys: Vec<String>) -> MutationPolicyFacts {
    MutationPolicyFacts {
        can_admin,
        tree_initialized: state.tree_initialized,
        target_exists_as_of: state.exists_as_of,
        is_root: state.is_root,
        enabled_ext_field_keys: ext_keys,
        ..Default::default()
    }
}
