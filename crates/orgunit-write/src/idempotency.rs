//! Request-code idempotency for the unified write path.

use orgunit_core::capabilities::WriteIntent;
use orgunit_core::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use orgunit_core::models::event::{OrgUnitEvent, RequestCodeHit, RequestCodeSource};
use orgunit_core::models::patch::OrgUnitPatch;
use orgunit_core::repository::OrgUnitStore;
use tracing::info;
use uuid::Uuid;

use crate::resolve::supplied_fields;
use crate::service::WriteOrgUnitResult;

/// Look up a prior write submitted under `request_code`.
///
/// `Ok(None)` means the request is new. A hit replays only when it was
/// written by the same intent against the same org: an event of the
/// intent's type, or for `Correct` a payload correction. Anything else
/// is a reused request code and fails with `ORG_REQUEST_ID_CONFLICT`.
/// `org_code` is the normalized code from the request, if it named one.
pub async fn resolve_idempotent_write<S: OrgUnitStore>(
    store: &S,
    tenant_id: Uuid,
    intent: WriteIntent,
    org_code: Option<&str>,
    request_code: &str,
    patch: &OrgUnitPatch,
) -> OrgUnitResult<Option<WriteOrgUnitResult>> {
    let Some(RequestCodeHit { event, source }) = store
        .find_event_by_request_code(tenant_id, request_code)
        .await?
    else {
        return Ok(None);
    };

    let same_intent = match (intent.expected_event_type(), source) {
        (Some(expected), RequestCodeSource::Event) => event.event_type == expected,
        (None, RequestCodeSource::PayloadCorrection) => true,
        _ => false,
    };
    if !same_intent {
        return Err(request_id_conflict(
            request_code,
            format!("a {} {}", event.event_type, source_label(source)),
        ));
    }

    let replayed_code = replay_org_code(store, tenant_id, &event).await?;
    if let Some(requested) = org_code
        && requested != replayed_code
    {
        return Err(request_id_conflict(request_code, format!("org {replayed_code}")));
    }

    info!(
        tenant_id = %tenant_id,
        request_code,
        intent = %intent,
        event_uuid = %event.event_uuid,
        "Replaying idempotent write"
    );
    Ok(Some(WriteOrgUnitResult {
        org_code: replayed_code,
        effective_date: event.effective_date,
        event_type: event.event_type,
        event_uuid: event.event_uuid,
        fields: supplied_fields(patch),
    }))
}

fn request_id_conflict(request_code: &str, used_for: String) -> OrgUnitError {
    OrgUnitError::conflict(
        ErrorCode::OrgRequestIdConflict,
        format!("request code {request_code} was used for {used_for}"),
    )
}

fn source_label(source: RequestCodeSource) -> &'static str {
    match source {
        RequestCodeSource::Event => "event",
        RequestCodeSource::PayloadCorrection => "correction",
        RequestCodeSource::OtherCorrection => "status correction or rescind",
    }
}

async fn replay_org_code<S: OrgUnitStore>(
    store: &S,
    tenant_id: Uuid,
    event: &OrgUnitEvent,
) -> OrgUnitResult<String> {
    if let Some(code) = event.payload_org_code() {
        return Ok(code.to_string());
    }
    store
        .resolve_org_code(tenant_id, event.org_id)
        .await?
        .ok_or_else(|| {
            OrgUnitError::conflict(
                ErrorCode::OrgCodeNotFound,
                format!("no org code for org {}", event.org_id),
            )
        })
}
