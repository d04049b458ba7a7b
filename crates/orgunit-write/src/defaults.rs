//! Create-time field policy defaults for `org_code`.

use chrono::NaiveDate;
use orgunit_core::autocode::{AutoCodeSpec, CelProgramCache, compile_auto_code_rule};
use orgunit_core::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use orgunit_core::field_keys::FIELD_ORG_CODE;
use orgunit_core::models::field::{FieldDefaultMode, FieldPolicyScope, TenantFieldPolicy};
use orgunit_core::repository::OrgUnitStore;
use tracing::debug;
use uuid::Uuid;

/// Resolve the `org_code` policy under the FORM scope `scope_key` (the
/// store falls back to GLOBAL) and decide whether the store must
/// generate the code.
///
/// Returns `Some(spec)` only when the policy is in CEL mode and the
/// caller supplied no code.
pub async fn apply_create_policy_defaults<S: OrgUnitStore>(
    store: &S,
    cache: &CelProgramCache,
    tenant_id: Uuid,
    scope_key: &str,
    explicit_org_code: Option<&str>,
    as_of: NaiveDate,
) -> OrgUnitResult<Option<AutoCodeSpec>> {
    let scope = FieldPolicyScope::Form(scope_key.to_string());
    let policy = store
        .resolve_field_policy(tenant_id, FIELD_ORG_CODE, &scope, as_of)
        .await?;
    debug!(
        tenant_id = %tenant_id,
        scope = %scope,
        found = policy.is_some(),
        "Resolved org_code field policy"
    );
    org_code_default(policy.as_ref(), explicit_org_code.is_some(), cache)
}

/// Decision table for a resolved (or absent) `org_code` policy.
pub fn org_code_default(
    policy: Option<&TenantFieldPolicy>,
    has_explicit_code: bool,
    cache: &CelProgramCache,
) -> OrgUnitResult<Option<AutoCodeSpec>> {
    // No policy behaves as maintainable with no default.
    let Some(policy) = policy else {
        return Ok(None);
    };

    if !policy.maintainable && has_explicit_code {
        return Err(OrgUnitError::bad_request(
            ErrorCode::FieldNotMaintainable,
            "org_code is not maintainable",
        ));
    }

    match policy.default_mode {
        FieldDefaultMode::None => {
            if !policy.maintainable && policy.default_rule().is_none() {
                return Err(OrgUnitError::bad_request(
                    ErrorCode::DefaultRuleRequired,
                    "org_code is not maintainable and has no default rule",
                ));
            }
            Ok(None)
        }
        FieldDefaultMode::Cel => {
            let rule = policy.default_rule().ok_or_else(|| {
                OrgUnitError::bad_request(
                    ErrorCode::DefaultRuleRequired,
                    "CEL default mode requires a default rule",
                )
            })?;
            let spec = compile_auto_code_rule(cache, rule)?;
            Ok((!has_explicit_code).then_some(spec))
        }
    }
}
