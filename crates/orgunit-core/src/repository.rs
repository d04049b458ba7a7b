//! Store and dictionary abstractions consumed by the write services.
//!
//! All operations are async and take the tenant explicitly. The store
//! owns event sourcing, row-level isolation and replay; this crate only
//! submits events and reads what it needs to decide.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::autocode::AutoCodeSpec;
use crate::error::OrgUnitResult;
use crate::models::{
    dict::DictOption,
    event::{
        GeneratedCreate, OrgUnitEvent, RequestCodeHit, SubmitCorrection, SubmitGeneratedCreate,
        SubmitOrgUnitEvent, SubmitRescindEvent, SubmitRescindOrg, SubmitStatusCorrection,
    },
    field::{FieldPolicyScope, SetIdStrategyFieldDecision, TenantFieldConfig, TenantFieldPolicy},
    org_state::OrgState,
    person::Person,
};

pub trait OrgUnitStore: Send + Sync {
    /// Submit a new event. Unique-code and request-code conflicts map to
    /// `ORG_CODE_CONFLICT` and `ORG_REQUEST_ID_CONFLICT`.
    fn submit_event(
        &self,
        tenant_id: Uuid,
        input: SubmitOrgUnitEvent,
    ) -> impl Future<Output = OrgUnitResult<OrgUnitEvent>> + Send;

    /// Replace the payload of an existing event. Returns the corrected event.
    fn submit_correction(
        &self,
        tenant_id: Uuid,
        input: SubmitCorrection,
    ) -> impl Future<Output = OrgUnitResult<OrgUnitEvent>> + Send;

    fn submit_status_correction(
        &self,
        tenant_id: Uuid,
        input: SubmitStatusCorrection,
    ) -> impl Future<Output = OrgUnitResult<OrgUnitEvent>> + Send;

    fn submit_rescind_event(
        &self,
        tenant_id: Uuid,
        input: SubmitRescindEvent,
    ) -> impl Future<Output = OrgUnitResult<OrgUnitEvent>> + Send;

    /// Rescind every event of an org. Returns the number rescinded.
    fn submit_rescind_org(
        &self,
        tenant_id: Uuid,
        input: SubmitRescindOrg,
    ) -> impl Future<Output = OrgUnitResult<u64>> + Send;

    /// Allocate the first free code for `spec` under a per-tenant,
    /// per-prefix lock and submit the CREATE carrying it.
    fn submit_create_with_generated_code(
        &self,
        tenant_id: Uuid,
        spec: &AutoCodeSpec,
        input: SubmitGeneratedCreate,
    ) -> impl Future<Output = OrgUnitResult<GeneratedCreate>> + Send;

    fn find_event_by_uuid(
        &self,
        tenant_id: Uuid,
        event_uuid: Uuid,
    ) -> impl Future<Output = OrgUnitResult<Option<OrgUnitEvent>>> + Send;

    fn find_event_by_effective_date(
        &self,
        tenant_id: Uuid,
        org_id: Uuid,
        effective_date: NaiveDate,
    ) -> impl Future<Output = OrgUnitResult<Option<OrgUnitEvent>>> + Send;

    /// The event written under `request_code`, or the event a correction
    /// under it targeted, tagged with where the code was found.
    fn find_event_by_request_code(
        &self,
        tenant_id: Uuid,
        request_code: &str,
    ) -> impl Future<Output = OrgUnitResult<Option<RequestCodeHit>>> + Send;

    /// Extension-field configs enabled as of `as_of`.
    fn list_enabled_field_configs(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
    ) -> impl Future<Output = OrgUnitResult<Vec<TenantFieldConfig>>> + Send;

    fn resolve_org_id(
        &self,
        tenant_id: Uuid,
        org_code: &str,
    ) -> impl Future<Output = OrgUnitResult<Option<Uuid>>> + Send;

    fn resolve_org_code(
        &self,
        tenant_id: Uuid,
        org_id: Uuid,
    ) -> impl Future<Output = OrgUnitResult<Option<String>>> + Send;

    /// Facts about `org_code` as of `as_of`, in one round-trip. An empty
    /// code reports only `tree_initialized`.
    fn load_org_state(
        &self,
        tenant_id: Uuid,
        org_code: &str,
        as_of: NaiveDate,
    ) -> impl Future<Output = OrgUnitResult<OrgState>> + Send;

    /// The policy for `field_key` under `scope`, falling back to the
    /// GLOBAL scope when no scoped policy is enabled as of `as_of`.
    fn resolve_field_policy(
        &self,
        tenant_id: Uuid,
        field_key: &str,
        scope: &FieldPolicyScope,
        as_of: NaiveDate,
    ) -> impl Future<Output = OrgUnitResult<Option<TenantFieldPolicy>>> + Send;

    fn resolve_setid_strategy_field_decision(
        &self,
        tenant_id: Uuid,
        capability_key: &str,
        field_key: &str,
        as_of: NaiveDate,
    ) -> impl Future<Output = OrgUnitResult<Option<SetIdStrategyFieldDecision>>> + Send;

    fn find_person_by_pernr(
        &self,
        tenant_id: Uuid,
        pernr: &str,
        as_of: NaiveDate,
    ) -> impl Future<Output = OrgUnitResult<Option<Person>>> + Send;
}

/// Resolves dictionary codes to display labels.
pub trait DictResolver: Send + Sync {
    /// `Ok(None)` when the code is not in the dictionary as of `as_of`.
    fn resolve_value_label(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
        dict_code: &str,
        code: &str,
    ) -> impl Future<Output = OrgUnitResult<Option<String>>> + Send;

    /// Options whose code or label contains `keyword`, at most `limit`.
    fn list_options(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
        dict_code: &str,
        keyword: &str,
        limit: usize,
    ) -> impl Future<Output = OrgUnitResult<Vec<DictOption>>> + Send;
}
