//! Mutation policy resolver.
//!
//! Decides, per action and per snapshot of current-state facts, whether
//! an org-unit mutation is enabled, which fields it may carry, how each
//! field maps onto the event payload, and why it is denied. Pure: no
//! I/O, no clock.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::deny_reason::dedup_and_sort_deny_reasons;
use crate::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use crate::field_keys::{
    FIELD_EFFECTIVE_DATE, FIELD_IS_BUSINESS_UNIT, FIELD_MANAGER_PERNR, FIELD_NAME,
    FIELD_ORG_CODE, FIELD_PARENT_ORG_CODE, FIELD_REASON, FIELD_TARGET_STATUS, ext_payload_key,
    merge_field_keys, normalize_ext_field_keys,
};
use crate::models::event::OrgUnitEventType;
use crate::models::patch::OrgUnitPatch;
use crate::validate::parse_effective_date;

pub const TARGET_STATUS_ACTIVE: &str = "active";
pub const TARGET_STATUS_DISABLED: &str = "disabled";

const CREATE_CORE_FIELDS: &[&str] = &[
    FIELD_EFFECTIVE_DATE,
    FIELD_IS_BUSINESS_UNIT,
    FIELD_MANAGER_PERNR,
    FIELD_NAME,
    FIELD_ORG_CODE,
    FIELD_PARENT_ORG_CODE,
];

const ATTRIBUTE_CORE_FIELDS: &[&str] = &[
    FIELD_EFFECTIVE_DATE,
    FIELD_IS_BUSINESS_UNIT,
    FIELD_MANAGER_PERNR,
    FIELD_NAME,
    FIELD_PARENT_ORG_CODE,
];

/// Identifies the action being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPolicyKey {
    Create,
    /// A typed event-update write (rename, move, disable, enable,
    /// set business unit).
    EventUpdate { emitted: OrgUnitEventType },
    /// Correction of an event whose original type is `target`.
    CorrectEvent { target: OrgUnitEventType },
    CorrectStatus { target: OrgUnitEventType },
    RescindEvent,
    RescindOrg,
}

impl MutationPolicyKey {
    pub fn action_kind(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::EventUpdate { .. } => "event_update",
            Self::CorrectEvent { .. } => "correct_event",
            Self::CorrectStatus { .. } => "correct_status",
            Self::RescindEvent => "rescind_event",
            Self::RescindOrg => "rescind_org",
        }
    }
}

/// Flat snapshot of facts about current state.
#[derive(Debug, Clone, Default)]
pub struct MutationPolicyFacts {
    pub can_admin: bool,
    pub tree_initialized: bool,
    pub org_already_exists: bool,
    /// The create request carries no parent.
    pub creating_root: bool,
    pub target_exists_as_of: bool,
    pub is_root: bool,
    pub enabled_ext_field_keys: Vec<String>,
    /// Pre-computed dependency/child checks for rescinding an org.
    pub rescind_org_deny_reasons: Vec<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationPolicyDecision {
    pub enabled: bool,
    /// Sorted. Empty whenever `enabled` is false.
    pub allowed_fields: Vec<String>,
    /// Logical field name to payload key.
    pub field_payload_keys: BTreeMap<String, String>,
    pub allowed_target_statuses: Vec<String>,
    /// Deduplicated, priority-ordered.
    pub deny_reasons: Vec<ErrorCode>,
}

impl MutationPolicyDecision {
    pub fn allows(&self, field: &str) -> bool {
        self.allowed_fields.iter().any(|f| f == field)
    }

    pub fn payload_key(&self, field: &str) -> Option<&str> {
        self.field_payload_keys.get(field).map(String::as_str)
    }

    pub fn primary_deny_reason(&self) -> Option<ErrorCode> {
        self.deny_reasons.first().copied()
    }

    /// Fail with the primary deny reason when the action is disabled.
    pub fn ensure_enabled(&self) -> OrgUnitResult<()> {
        match self.primary_deny_reason() {
            Some(code) if !self.enabled => Err(OrgUnitError::conflict(
                code,
                format!("action denied: {code}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Resolve the policy decision for `key` under `facts`.
pub fn resolve_mutation_policy(
    key: MutationPolicyKey,
    facts: &MutationPolicyFacts,
) -> OrgUnitResult<MutationPolicyDecision> {
    let mut deny = Vec::new();
    if !facts.can_admin {
        deny.push(ErrorCode::Forbidden);
    }

    let (fields, payload_event, statuses): (Vec<String>, OrgUnitEventType, &[&str]) = match key {
        MutationPolicyKey::Create => {
            if facts.org_already_exists {
                deny.push(ErrorCode::OrgAlreadyExists);
            }
            if facts.creating_root && facts.tree_initialized {
                deny.push(ErrorCode::OrgRootAlreadyExists);
            }
            if !facts.creating_root && !facts.tree_initialized {
                deny.push(ErrorCode::OrgTreeNotInitialized);
            }
            let fields = merge_field_keys(CREATE_CORE_FIELDS, &facts.enabled_ext_field_keys);
            (fields, OrgUnitEventType::Create, &[])
        }
        MutationPolicyKey::EventUpdate { emitted } => {
            let core = event_update_core_fields(emitted).ok_or_else(|| {
                OrgUnitError::InvalidPolicyKey(format!(
                    "event_update does not emit {emitted}"
                ))
            })?;
            if !facts.tree_initialized {
                deny.push(ErrorCode::OrgTreeNotInitialized);
            }
            if !facts.target_exists_as_of {
                deny.push(ErrorCode::OrgNotFoundAsOf);
            }
            if emitted == OrgUnitEventType::Move && facts.is_root {
                deny.push(ErrorCode::OrgRootCannotBeMoved);
            }
            (merge_field_keys(core, &[]), emitted, &[])
        }
        MutationPolicyKey::CorrectEvent { target } => {
            let core = correct_event_core_fields(target);
            let fields = if carries_ext_fields(target) {
                merge_field_keys(core, &facts.enabled_ext_field_keys)
            } else {
                merge_field_keys(core, &[])
            };
            (fields, target, &[])
        }
        MutationPolicyKey::CorrectStatus { target } => {
            if !matches!(
                target,
                OrgUnitEventType::Enable | OrgUnitEventType::Disable
            ) {
                deny.push(ErrorCode::OrgStatusCorrectionUnsupportedTarget);
            }
            (
                vec![FIELD_TARGET_STATUS.to_string()],
                target,
                &[TARGET_STATUS_ACTIVE, TARGET_STATUS_DISABLED],
            )
        }
        MutationPolicyKey::RescindEvent => {
            (vec![FIELD_REASON.to_string()], OrgUnitEventType::Update, &[])
        }
        MutationPolicyKey::RescindOrg => {
            deny.extend(facts.rescind_org_deny_reasons.iter().copied());
            (vec![FIELD_REASON.to_string()], OrgUnitEventType::Update, &[])
        }
    };

    let deny_reasons = dedup_and_sort_deny_reasons(deny);
    if !deny_reasons.is_empty() {
        return Ok(MutationPolicyDecision {
            enabled: false,
            deny_reasons,
            ..Default::default()
        });
    }

    let field_payload_keys = fields
        .iter()
        .map(|f| (f.clone(), payload_key_for(payload_event, f)))
        .collect();
    Ok(MutationPolicyDecision {
        enabled: true,
        allowed_fields: fields,
        field_payload_keys,
        allowed_target_statuses: statuses.iter().map(|s| (*s).to_string()).collect(),
        deny_reasons,
    })
}

fn event_update_core_fields(emitted: OrgUnitEventType) -> Option<&'static [&'static str]> {
    match emitted {
        OrgUnitEventType::Rename => Some(&[FIELD_EFFECTIVE_DATE, FIELD_NAME]),
        OrgUnitEventType::Move => Some(&[FIELD_EFFECTIVE_DATE, FIELD_PARENT_ORG_CODE]),
        OrgUnitEventType::Disable | OrgUnitEventType::Enable => Some(&[FIELD_EFFECTIVE_DATE]),
        OrgUnitEventType::SetBusinessUnit => {
            Some(&[FIELD_EFFECTIVE_DATE, FIELD_IS_BUSINESS_UNIT])
        }
        OrgUnitEventType::Create | OrgUnitEventType::Update => None,
    }
}

/// A correction may only touch fields the original event carried.
fn correct_event_core_fields(target: OrgUnitEventType) -> &'static [&'static str] {
    match target {
        OrgUnitEventType::Create | OrgUnitEventType::Update => ATTRIBUTE_CORE_FIELDS,
        OrgUnitEventType::Rename => &[FIELD_EFFECTIVE_DATE, FIELD_NAME],
        OrgUnitEventType::Move => &[FIELD_EFFECTIVE_DATE, FIELD_PARENT_ORG_CODE],
        OrgUnitEventType::Disable | OrgUnitEventType::Enable => &[FIELD_EFFECTIVE_DATE],
        OrgUnitEventType::SetBusinessUnit => &[FIELD_EFFECTIVE_DATE, FIELD_IS_BUSINESS_UNIT],
    }
}

fn carries_ext_fields(event_type: OrgUnitEventType) -> bool {
    matches!(
        event_type,
        OrgUnitEventType::Create | OrgUnitEventType::Update
    )
}

/// Payload key of a logical field on an event of `event_type`.
fn payload_key_for(event_type: OrgUnitEventType, field: &str) -> String {
    match (event_type, field) {
        (OrgUnitEventType::Rename, FIELD_NAME) => "new_name".to_string(),
        (OrgUnitEventType::Move, FIELD_PARENT_ORG_CODE) => "new_parent_id".to_string(),
        (_, FIELD_PARENT_ORG_CODE) => "parent_id".to_string(),
        (
            _,
            FIELD_EFFECTIVE_DATE | FIELD_NAME | FIELD_ORG_CODE | FIELD_IS_BUSINESS_UNIT
            | FIELD_MANAGER_PERNR | FIELD_TARGET_STATUS | FIELD_REASON,
        ) => field.to_string(),
        (_, ext) => ext_payload_key(ext),
    }
}

/// Check a correction patch against a policy decision.
///
/// Every present field must be allowed; a malformed `effective_date`
/// fails before the allowed-field check; blank extension keys always
/// fail; changing the effective date excludes every other field.
pub fn validate_patch(
    target_date: NaiveDate,
    decision: &MutationPolicyDecision,
    patch: &OrgUnitPatch,
) -> OrgUnitResult<()> {
    let new_date = patch
        .effective_date
        .as_deref()
        .map(parse_effective_date)
        .transpose()?;

    for field in patch.present_core_fields() {
        if !decision.allows(field) {
            return Err(field_not_allowed(field));
        }
    }
    for key in patch.ext.keys() {
        if key.trim().is_empty() {
            return Err(OrgUnitError::bad_request(
                ErrorCode::PatchFieldNotAllowed,
                "extension field key must not be blank",
            ));
        }
        let normalized = normalize_ext_field_keys([key.as_str()]);
        if normalized.first() != Some(key) || !decision.allows(key) {
            return Err(field_not_allowed(key));
        }
    }

    if new_date.is_some_and(|d| d != target_date) && patch.has_non_date_fields() {
        return Err(OrgUnitError::bad_request(
            ErrorCode::PatchFieldNotAllowed,
            "effective_date cannot change together with other fields",
        ));
    }
    Ok(())
}

fn field_not_allowed(field: &str) -> OrgUnitError {
    OrgUnitError::bad_request(
        ErrorCode::PatchFieldNotAllowed,
        format!("field not allowed: {field}"),
    )
}
