//! Typed org-unit mutations driven by the mutation policy table.
//!
//! Each operation resolves org facts, evaluates the policy for its
//! action, and fails with the primary deny reason before any mutating
//! store call.

use chrono::NaiveDate;
use orgunit_core::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use orgunit_core::field_keys::FIELD_ORG_CODE;
use orgunit_core::models::event::{
    OrgUnitEvent, OrgUnitEventType, SubmitCorrection, SubmitOrgUnitEvent, SubmitRescindEvent,
    SubmitRescindOrg, SubmitStatusCorrection,
};
use orgunit_core::models::field::SetIdStrategyFieldDecision;
use orgunit_core::models::patch::OrgUnitPatch;
use orgunit_core::policy::{
    MutationPolicyDecision, MutationPolicyFacts, MutationPolicyKey, resolve_mutation_policy,
    validate_patch,
};
use orgunit_core::repository::{DictResolver, OrgUnitStore};
use orgunit_core::validate::{normalize_org_code, parse_effective_date, require_request_code};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::resolve::{PayloadBuilder, ext_field_keys, require_org, require_target_event};

/// Create an org with an explicit code.
#[derive(Debug, Clone)]
pub struct CreateOrgInput {
    pub org_code: String,
    pub effective_date: String,
    pub request_code: String,
    pub patch: OrgUnitPatch,
    pub can_admin: bool,
    pub initiator_id: Option<Uuid>,
}

/// Emit a typed event (rename, move, disable, enable, set business unit).
#[derive(Debug, Clone)]
pub struct UpdateEventInput {
    pub org_code: String,
    pub event_type: OrgUnitEventType,
    pub effective_date: String,
    pub request_code: String,
    pub patch: OrgUnitPatch,
    pub can_admin: bool,
    pub initiator_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CorrectEventInput {
    pub org_code: String,
    pub target_effective_date: String,
    pub request_code: String,
    pub patch: OrgUnitPatch,
    pub can_admin: bool,
    pub initiator_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CorrectStatusInput {
    pub org_code: String,
    pub target_effective_date: String,
    pub target_status: String,
    pub request_code: String,
    pub can_admin: bool,
    pub initiator_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RescindEventInput {
    pub org_code: String,
    pub target_effective_date: String,
    pub reason: String,
    pub request_code: String,
    pub can_admin: bool,
    pub initiator_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RescindOrgInput {
    pub org_code: String,
    /// Date the org's children are checked at.
    pub as_of: String,
    pub reason: String,
    pub request_code: String,
    pub can_admin: bool,
    pub initiator_id: Option<Uuid>,
}

/// Policy-driven typed write service.
pub struct OrgUnitMutationService<S: OrgUnitStore, D: DictResolver> {
    store: S,
    dict: D,
}

impl<S: OrgUnitStore, D: DictResolver> OrgUnitMutationService<S, D> {
    pub fn new(store: S, dict: D) -> Self {
        Self { store, dict }
    }

    pub async fn create_org(
        &self,
        tenant_id: Uuid,
        input: CreateOrgInput,
    ) -> OrgUnitResult<OrgUnitEvent> {
        let request_code = require_request_code(&input.request_code)?;
        let date = parse_effective_date(&input.effective_date)?;
        let org_code = normalize_org_code(&input.org_code)?;

        let state = self.store.load_org_state(tenant_id, &org_code, date).await?;
        let configs = self.store.list_enabled_field_configs(tenant_id, date).await?;
        let decision = resolve_mutation_policy(
            MutationPolicyKey::Create,
            &MutationPolicyFacts {
                can_admin: input.can_admin,
                tree_initialized: state.tree_initialized,
                org_already_exists: state.org_id.is_some(),
                creating_root: input
                    .patch
                    .parent_org_code
                    .as_deref()
                    .is_none_or(|p| p.trim().is_empty()),
                enabled_ext_field_keys: ext_field_keys(&configs),
                ..Default::default()
            },
        )?;
        decision.ensure_enabled()?;
        validate_patch(date, &decision, &input.patch)?;
        if input.patch.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            return Err(OrgUnitError::bad_request(
                ErrorCode::OrgInvalidArgument,
                "name is required to create an org",
            ));
        }

        let mut payload = self
            .payloads(tenant_id, date)
            .build(&input.patch, &decision.field_payload_keys, &configs)
            .await?;
        payload.insert(FIELD_ORG_CODE.into(), Value::from(org_code.clone()));

        let event = self
            .store
            .submit_event(
                tenant_id,
                SubmitOrgUnitEvent {
                    event_uuid: Uuid::new_v4(),
                    org_id: None,
                    org_code: org_code.clone(),
                    event_type: OrgUnitEventType::Create,
                    effective_date: date,
                    payload: Value::Object(payload),
                    request_code,
                    initiator_id: input.initiator_id,
                },
            )
            .await?;
        info!(tenant_id = %tenant_id, org_code = %org_code, "Org created");
        Ok(event)
    }

    /// Emit a typed event. CREATE and UPDATE are not event updates.
    pub async fn update_event(
        &self,
        tenant_id: Uuid,
        input: UpdateEventInput,
    ) -> OrgUnitResult<OrgUnitEvent> {
        let request_code = require_request_code(&input.request_code)?;
        let date = parse_effective_date(&input.effective_date)?;
        let org_code = normalize_org_code(&input.org_code)?;
        let (org_id, state) = require_org(&self.store, tenant_id, &org_code, date).await?;

        let decision = resolve_mutation_policy(
            MutationPolicyKey::EventUpdate {
                emitted: input.event_type,
            },
            &MutationPolicyFacts {
                can_admin: input.can_admin,
                tree_initialized: state.tree_initialized,
                target_exists_as_of: state.exists_as_of,
                is_root: state.is_root,
                ..Default::default()
            },
        )?;
        decision.ensure_enabled()?;
        validate_patch(date, &decision, &input.patch)?;
        require_event_fields(input.event_type, &input.patch)?;

        let payload = self
            .payloads(tenant_id, date)
            .build(&input.patch, &decision.field_payload_keys, &[])
            .await?;
        let event = self
            .store
            .submit_event(
                tenant_id,
                SubmitOrgUnitEvent {
                    event_uuid: Uuid::new_v4(),
                    org_id: Some(org_id),
                    org_code: org_code.clone(),
                    event_type: input.event_type,
                    effective_date: date,
                    payload: Value::Object(payload),
                    request_code,
                    initiator_id: input.initiator_id,
                },
            )
            .await?;
        info!(
            tenant_id = %tenant_id,
            org_code = %org_code,
            event_type = %input.event_type,
            "Org event submitted"
        );
        Ok(event)
    }

    /// Replace the payload of the live event at the target date.
    pub async fn correct_event(
        &self,
        tenant_id: Uuid,
        input: CorrectEventInput,
    ) -> OrgUnitResult<OrgUnitEvent> {
        let request_code = require_request_code(&input.request_code)?;
        let date = parse_effective_date(&input.target_effective_date)?;
        let org_code = normalize_org_code(&input.org_code)?;
        let (org_id, state) = require_org(&self.store, tenant_id, &org_code, date).await?;
        let target = require_target_event(&self.store, tenant_id, org_id, date).await?;
        let configs = self.store.list_enabled_field_configs(tenant_id, date).await?;

        let decision = resolve_mutation_policy(
            MutationPolicyKey::CorrectEvent {
                target: target.event_type,
            },
            &MutationPolicyFacts {
                can_admin: input.can_admin,
                tree_initialized: state.tree_initialized,
                target_exists_as_of: state.exists_as_of,
                is_root: state.is_root,
                enabled_ext_field_keys: ext_field_keys(&configs),
                ..Default::default()
            },
        )?;
        decision.ensure_enabled()?;
        if input.patch.is_empty() {
            return Err(OrgUnitError::bad_request(
                ErrorCode::PatchRequired,
                "patch must contain at least one field",
            ));
        }
        validate_patch(date, &decision, &input.patch)?;

        let payload = self
            .payloads(tenant_id, date)
            .build(&input.patch, &decision.field_payload_keys, &configs)
            .await?;
        let event = self
            .store
            .submit_correction(
                tenant_id,
                SubmitCorrection {
                    org_id,
                    target_event_uuid: target.event_uuid,
                    target_effective_date: date,
                    patch: Value::Object(payload),
                    request_code,
                    initiator_id: input.initiator_id,
                },
            )
            .await?;
        info!(
            tenant_id = %tenant_id,
            org_code = %org_code,
            target = %target.event_type,
            "Org event corrected"
        );
        Ok(event)
    }

    /// Flip the status carried by an ENABLE or DISABLE event.
    pub async fn correct_status(
        &self,
        tenant_id: Uuid,
        input: CorrectStatusInput,
    ) -> OrgUnitResult<OrgUnitEvent> {
        let request_code = require_request_code(&input.request_code)?;
        let date = parse_effective_date(&input.target_effective_date)?;
        let org_code = normalize_org_code(&input.org_code)?;
        let (org_id, _) = require_org(&self.store, tenant_id, &org_code, date).await?;
        let target = require_target_event(&self.store, tenant_id, org_id, date).await?;

        let decision = resolve_mutation_policy(
            MutationPolicyKey::CorrectStatus {
                target: target.event_type,
            },
            &admin_facts(input.can_admin),
        )?;
        decision.ensure_enabled()?;
        let target_status = input.target_status.trim().to_lowercase();
        if !decision.allowed_target_statuses.contains(&target_status) {
            return Err(OrgUnitError::bad_request(
                ErrorCode::OrgInvalidArgument,
                format!("unsupported target status: {target_status}"),
            ));
        }

        self.store
            .submit_status_correction(
                tenant_id,
                SubmitStatusCorrection {
                    org_id,
                    target_event_uuid: target.event_uuid,
                    target_effective_date: date,
                    target_status,
                    request_code,
                    initiator_id: input.initiator_id,
                },
            )
            .await
    }

    pub async fn rescind_event(
        &self,
        tenant_id: Uuid,
        input: RescindEventInput,
    ) -> OrgUnitResult<OrgUnitEvent> {
        let request_code = require_request_code(&input.request_code)?;
        let date = parse_effective_date(&input.target_effective_date)?;
        let org_code = normalize_org_code(&input.org_code)?;
        let (org_id, _) = require_org(&self.store, tenant_id, &org_code, date).await?;
        let target = require_target_event(&self.store, tenant_id, org_id, date).await?;

        let decision = resolve_mutation_policy(
            MutationPolicyKey::RescindEvent,
            &admin_facts(input.can_admin),
        )?;
        decision.ensure_enabled()?;
        let reason = require_reason(&input.reason)?;

        let event = self
            .store
            .submit_rescind_event(
                tenant_id,
                SubmitRescindEvent {
                    org_id,
                    target_event_uuid: target.event_uuid,
                    target_effective_date: date,
                    reason,
                    request_code,
                    initiator_id: input.initiator_id,
                },
            )
            .await?;
        info!(tenant_id = %tenant_id, org_code = %org_code, "Org event rescinded");
        Ok(event)
    }

    /// Rescind every event of an org. Orgs with children cannot be
    /// rescinded.
    pub async fn rescind_org(&self, tenant_id: Uuid, input: RescindOrgInput) -> OrgUnitResult<u64> {
        let request_code = require_request_code(&input.request_code)?;
        let as_of = parse_effective_date(&input.as_of)?;
        let org_code = normalize_org_code(&input.org_code)?;
        let (org_id, state) = require_org(&self.store, tenant_id, &org_code, as_of).await?;

        let mut facts = admin_facts(input.can_admin);
        if state.has_children {
            facts
                .rescind_org_deny_reasons
                .push(ErrorCode::OrgHasChildrenCannotDelete);
        }
        let decision = resolve_mutation_policy(MutationPolicyKey::RescindOrg, &facts)?;
        decision.ensure_enabled()?;
        let reason = require_reason(&input.reason)?;

        let rescinded = self
            .store
            .submit_rescind_org(
                tenant_id,
                SubmitRescindOrg {
                    org_id,
                    reason,
                    request_code,
                    initiator_id: input.initiator_id,
                },
            )
            .await?;
        info!(
            tenant_id = %tenant_id,
            org_code = %org_code,
            rescinded,
            "Org rescinded"
        );
        Ok(rescinded)
    }

    /// Read-only SetID projection of a field under a capability.
    pub async fn field_decision(
        &self,
        tenant_id: Uuid,
        capability_key: &str,
        field_key: &str,
        as_of: NaiveDate,
    ) -> OrgUnitResult<Option<SetIdStrategyFieldDecision>> {
        self.store
            .resolve_setid_strategy_field_decision(tenant_id, capability_key, field_key, as_of)
            .await
    }

    /// Evaluate a policy without acting on it, e.g. to render which
    /// fields a form may show.
    pub fn evaluate(
        &self,
        key: MutationPolicyKey,
        facts: &MutationPolicyFacts,
    ) -> OrgUnitResult<MutationPolicyDecision> {
        resolve_mutation_policy(key, facts)
    }

    fn payloads(&self, tenant_id: Uuid, as_of: NaiveDate) -> PayloadBuilder<'_, S, D> {
        PayloadBuilder {
            store: &self.store,
            dict: &self.dict,
            tenant_id,
            as_of,
        }
    }
}

fn admin_facts(can_admin: bool) -> MutationPolicyFacts {
    MutationPolicyFacts {
        can_admin,
        ..Default::default()
    }
}

fn require_reason(raw: &str) -> OrgUnitResult<String> {
    let reason = raw.trim();
    if reason.is_empty() {
        return Err(OrgUnitError::bad_request(
            ErrorCode::OrgInvalidArgument,
            "reason is required",
        ));
    }
    Ok(reason.to_string())
}

/// The field an event type exists to change must be present.
fn require_event_fields(event_type: OrgUnitEventType, patch: &OrgUnitPatch) -> OrgUnitResult<()> {
    let missing = match event_type {
        OrgUnitEventType::Rename => patch.name.is_none(),
        OrgUnitEventType::Move => patch.parent_org_code.is_none(),
        OrgUnitEventType::SetBusinessUnit => patch.is_business_unit.is_none(),
        _ => false,
    };
    if missing {
        return Err(OrgUnitError::bad_request(
            ErrorCode::PatchRequired,
            format!("{event_type} requires its field"),
        ));
    }
    Ok(())
}
