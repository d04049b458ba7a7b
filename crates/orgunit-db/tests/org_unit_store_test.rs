//! Integration tests for the SurrealDB org-unit store using in-memory
//! SurrealDB.

use chrono::NaiveDate;
use orgunit_core::autocode::AutoCodeSpec;
use orgunit_core::error::ErrorCode;
use orgunit_core::models::event::{
    OrgUnitEvent, OrgUnitEventType, RequestCodeSource, SubmitCorrection, SubmitGeneratedCreate,
    SubmitOrgUnitEvent, SubmitRescindEvent, SubmitRescindOrg, SubmitStatusCorrection,
};
use orgunit_core::models::field::{
    FieldDataSourceType, FieldDefaultMode, FieldPolicyScope, SetIdStrategyFieldDecision,
    TenantFieldConfig, TenantFieldPolicy,
};
use orgunit_core::models::person::{Person, PersonStatus};
use orgunit_core::repository::OrgUnitStore;
use orgunit_db::SurrealOrgUnitStore;
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> (SurrealOrgUnitStore<Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orgunit_db::run_migrations(&db).await.unwrap();
    (SurrealOrgUnitStore::new(db), Uuid::new_v4())
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn create_org(
    store: &SurrealOrgUnitStore<Db>,
    tenant_id: Uuid,
    org_code: &str,
    parent_id: Option<Uuid>,
    effective_date: &str,
) -> OrgUnitEvent {
    store
        .submit_event(
            tenant_id,
            SubmitOrgUnitEvent {
                event_uuid: Uuid::new_v4(),
                org_id: None,
                org_code: org_code.into(),
                event_type: OrgUnitEventType::Create,
                effective_date: date(effective_date),
                payload: json!({
                    "org_code": org_code,
                    "name": format!("{org_code} name"),
                    "parent_id": parent_id.map(|id| id.to_string()),
                }),
                request_code: Uuid::new_v4().to_string(),
                initiator_id: None,
            },
        )
        .await
        .unwrap()
}

async fn add_event(
    store: &SurrealOrgUnitStore<Db>,
    tenant_id: Uuid,
    org_id: Uuid,
    event_type: OrgUnitEventType,
    effective_date: &str,
    payload: serde_json::Value,
) -> OrgUnitEvent {
    store
        .submit_event(
            tenant_id,
            SubmitOrgUnitEvent {
                event_uuid: Uuid::new_v4(),
                org_id: Some(org_id),
                org_code: String::new(),
                event_type,
                effective_date: date(effective_date),
                payload,
                request_code: Uuid::new_v4().to_string(),
                initiator_id: None,
            },
        )
        .await
        .unwrap()
}

fn generated(request_code: &str) -> SubmitGeneratedCreate {
    SubmitGeneratedCreate {
        event_uuid: Uuid::new_v4(),
        effective_date: date("2026-01-01"),
        payload: json!({ "name": "Generated", "parent_id": null }),
        request_code: request_code.into(),
        initiator_id: None,
    }
}

// -----------------------------------------------------------------------
// Events
// -----------------------------------------------------------------------

#[tokio::test]
async fn submit_and_find_event() {
    let (store, tenant_id) = setup().await;
    let created = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;

    assert_eq!(created.event_type, OrgUnitEventType::Create);
    assert_eq!(created.effective_date, date("2026-01-01"));
    assert_eq!(created.payload_org_code(), Some("ROOT"));
    assert!(!created.rescinded);

    let by_uuid = store
        .find_event_by_uuid(tenant_id, created.event_uuid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_uuid.org_id, created.org_id);

    let by_date = store
        .find_event_by_effective_date(tenant_id, created.org_id, date("2026-01-01"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_date.event_uuid, created.event_uuid);

    let request_code = created.request_code.clone().unwrap();
    let by_request = store
        .find_event_by_request_code(tenant_id, &request_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_request.event.event_uuid, created.event_uuid);
    assert_eq!(by_request.source, RequestCodeSource::Event);

    assert_eq!(
        store.resolve_org_id(tenant_id, "ROOT").await.unwrap(),
        Some(created.org_id)
    );
    assert_eq!(
        store
            .resolve_org_code(tenant_id, created.org_id)
            .await
            .unwrap()
            .as_deref(),
        Some("ROOT")
    );
}

#[tokio::test]
async fn events_are_tenant_scoped() {
    let (store, tenant_id) = setup().await;
    let created = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;
    let other = Uuid::new_v4();

    assert!(
        store
            .find_event_by_uuid(other, created.event_uuid)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(store.resolve_org_id(other, "ROOT").await.unwrap(), None);

    // The same code is free in another tenant.
    create_org(&store, other, "ROOT", None, "2026-01-01").await;
}

#[tokio::test]
async fn duplicate_org_code_conflicts() {
    let (store, tenant_id) = setup().await;
    create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;

    let err = store
        .submit_event(
            tenant_id,
            SubmitOrgUnitEvent {
                event_uuid: Uuid::new_v4(),
                org_id: None,
                org_code: "ROOT".into(),
                event_type: OrgUnitEventType::Create,
                effective_date: date("2026-02-01"),
                payload: json!({ "org_code": "ROOT" }),
                request_code: "req-dup-code".into(),
                initiator_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::OrgCodeConflict));
}

#[tokio::test]
async fn reused_request_code_conflicts() {
    let (store, tenant_id) = setup().await;
    let root = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;

    let err = store
        .submit_event(
            tenant_id,
            SubmitOrgUnitEvent {
                event_uuid: Uuid::new_v4(),
                org_id: Some(root.org_id),
                org_code: "ROOT".into(),
                event_type: OrgUnitEventType::Rename,
                effective_date: date("2026-02-01"),
                payload: json!({ "new_name": "Renamed" }),
                request_code: root.request_code.clone().unwrap(),
                initiator_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::OrgRequestIdConflict));
}

// -----------------------------------------------------------------------
// Org state
// -----------------------------------------------------------------------

#[tokio::test]
async fn load_org_state_reports_tree_facts() {
    let (store, tenant_id) = setup().await;

    let empty = store
        .load_org_state(tenant_id, "", date("2026-01-01"))
        .await
        .unwrap();
    assert!(!empty.tree_initialized);
    assert_eq!(empty.org_id, None);

    let root = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;
    create_org(&store, tenant_id, "SALES", Some(root.org_id), "2026-02-01").await;

    let state = store
        .load_org_state(tenant_id, "ROOT", date("2026-01-15"))
        .await
        .unwrap();
    assert!(state.tree_initialized);
    assert_eq!(state.org_id, Some(root.org_id));
    assert!(state.exists_as_of);
    assert!(state.is_root);
    assert!(state.has_children);

    let before = store
        .load_org_state(tenant_id, "SALES", date("2026-01-15"))
        .await
        .unwrap();
    assert!(before.org_id.is_some());
    assert!(!before.exists_as_of);
    assert!(!before.is_root);
    assert!(!before.has_children);

    let unknown = store
        .load_org_state(tenant_id, "NOPE", date("2026-01-15"))
        .await
        .unwrap();
    assert!(unknown.tree_initialized);
    assert_eq!(unknown.org_id, None);
    assert!(!unknown.exists_as_of);
}

#[tokio::test]
async fn move_updates_current_parent() {
    let (store, tenant_id) = setup().await;
    let root = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;
    let sales = create_org(&store, tenant_id, "SALES", Some(root.org_id), "2026-01-01").await;
    let ops = create_org(&store, tenant_id, "OPS", Some(root.org_id), "2026-01-01").await;

    add_event(
        &store,
        tenant_id,
        ops.org_id,
        OrgUnitEventType::Move,
        "2026-03-01",
        json!({ "new_parent_id": sales.org_id.to_string() }),
    )
    .await;

    let sales_state = store
        .load_org_state(tenant_id, "SALES", date("2026-03-01"))
        .await
        .unwrap();
    assert!(sales_state.has_children);
}

// -----------------------------------------------------------------------
// Corrections and rescinds
// -----------------------------------------------------------------------

#[tokio::test]
async fn correction_merges_patch_and_replays_by_request_code() {
    let (store, tenant_id) = setup().await;
    let root = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;
    let renamed = add_event(
        &store,
        tenant_id,
        root.org_id,
        OrgUnitEventType::Rename,
        "2026-03-01",
        json!({ "new_name": "Head Office" }),
    )
    .await;

    let corrected = store
        .submit_correction(
            tenant_id,
            SubmitCorrection {
                org_id: root.org_id,
                target_event_uuid: renamed.event_uuid,
                target_effective_date: date("2026-03-01"),
                patch: json!({ "new_name": "Headquarters", "effective_date": "2026-03-05" }),
                request_code: "req-correct".into(),
                initiator_id: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(corrected.event_uuid, renamed.event_uuid);
    assert_eq!(corrected.payload["new_name"], json!("Headquarters"));
    assert_eq!(corrected.effective_date, date("2026-03-05"));

    let replay = store
        .find_event_by_request_code(tenant_id, "req-correct")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replay.event.event_uuid, renamed.event_uuid);
    assert_eq!(replay.source, RequestCodeSource::PayloadCorrection);

    // The correction's request code is now taken.
    let err = store
        .submit_correction(
            tenant_id,
            SubmitCorrection {
                org_id: root.org_id,
                target_event_uuid: renamed.event_uuid,
                target_effective_date: date("2026-03-05"),
                patch: json!({ "new_name": "Again" }),
                request_code: "req-correct".into(),
                initiator_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::OrgRequestIdConflict));
}

#[tokio::test]
async fn status_correction_flips_event_type() {
    let (store, tenant_id) = setup().await;
    let root = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;
    let disabled = add_event(
        &store,
        tenant_id,
        root.org_id,
        OrgUnitEventType::Disable,
        "2026-03-01",
        json!({}),
    )
    .await;

    let corrected = store
        .submit_status_correction(
            tenant_id,
            SubmitStatusCorrection {
                org_id: root.org_id,
                target_event_uuid: disabled.event_uuid,
                target_effective_date: date("2026-03-01"),
                target_status: "active".into(),
                request_code: "req-status".into(),
                initiator_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(corrected.event_type, OrgUnitEventType::Enable);

    let hit = store
        .find_event_by_request_code(tenant_id, "req-status")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.event.event_uuid, disabled.event_uuid);
    assert_eq!(hit.source, RequestCodeSource::OtherCorrection);
}

#[tokio::test]
async fn rescind_event_prefers_live_event_on_same_day() {
    let (store, tenant_id) = setup().await;
    let root = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;
    let renamed = add_event(
        &store,
        tenant_id,
        root.org_id,
        OrgUnitEventType::Rename,
        "2026-03-01",
        json!({ "new_name": "Wrong" }),
    )
    .await;

    let rescinded = store
        .submit_rescind_event(
            tenant_id,
            SubmitRescindEvent {
                org_id: root.org_id,
                target_event_uuid: renamed.event_uuid,
                target_effective_date: date("2026-03-01"),
                reason: "typo".into(),
                request_code: "req-rescind".into(),
                initiator_id: None,
            },
        )
        .await
        .unwrap();
    assert!(rescinded.rescinded);

    let found = store
        .find_event_by_effective_date(tenant_id, root.org_id, date("2026-03-01"))
        .await
        .unwrap()
        .unwrap();
    assert!(found.rescinded);

    let live = add_event(
        &store,
        tenant_id,
        root.org_id,
        OrgUnitEventType::Rename,
        "2026-03-01",
        json!({ "new_name": "Right" }),
    )
    .await;
    let found = store
        .find_event_by_effective_date(tenant_id, root.org_id, date("2026-03-01"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.event_uuid, live.event_uuid);
}

#[tokio::test]
async fn rescind_org_counts_live_events() {
    let (store, tenant_id) = setup().await;
    let root = create_org(&store, tenant_id, "ROOT", None, "2026-01-01").await;
    let ops = create_org(&store, tenant_id, "OPS", Some(root.org_id), "2026-01-01").await;
    add_event(
        &store,
        tenant_id,
        ops.org_id,
        OrgUnitEventType::Rename,
        "2026-02-01",
        json!({ "new_name": "Operations" }),
    )
    .await;

    let count = store
        .submit_rescind_org(
            tenant_id,
            SubmitRescindOrg {
                org_id: ops.org_id,
                reason: "duplicate".into(),
                request_code: "req-rescind-org".into(),
                initiator_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(count, 2);

    let state = store
        .load_org_state(tenant_id, "OPS", date("2026-03-01"))
        .await
        .unwrap();
    assert!(!state.exists_as_of);

    let root_state = store
        .load_org_state(tenant_id, "ROOT", date("2026-03-01"))
        .await
        .unwrap();
    assert!(!root_state.has_children);
}

// -----------------------------------------------------------------------
// Generated codes
// -----------------------------------------------------------------------

#[tokio::test]
async fn generated_create_fills_the_lowest_gap() {
    let (store, tenant_id) = setup().await;
    let spec = AutoCodeSpec {
        prefix: "O".into(),
        width: 3,
    };
    create_org(&store, tenant_id, "O001", None, "2026-01-01").await;
    create_org(&store, tenant_id, "O003", None, "2026-01-01").await;
    // Codes that are not prefix plus three digits are ignored.
    create_org(&store, tenant_id, "OX99", None, "2026-01-01").await;

    let created = store
        .submit_create_with_generated_code(tenant_id, &spec, generated("req-gen-1"))
        .await
        .unwrap();
    assert_eq!(created.org_code, "O002");
    assert_eq!(created.event.payload_org_code(), Some("O002"));

    let next = store
        .submit_create_with_generated_code(tenant_id, &spec, generated("req-gen-2"))
        .await
        .unwrap();
    assert_eq!(next.org_code, "O004");
}

#[tokio::test]
async fn generated_create_reports_exhaustion() {
    let (store, tenant_id) = setup().await;
    let spec = AutoCodeSpec {
        prefix: "Z".into(),
        width: 1,
    };
    for n in 1..=9 {
        create_org(&store, tenant_id, &format!("Z{n}"), None, "2026-01-01").await;
    }

    let err = store
        .submit_create_with_generated_code(tenant_id, &spec, generated("req-gen"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::OrgCodeExhausted));
}

#[tokio::test]
async fn concurrent_generated_creates_get_distinct_codes() {
    let (store, tenant_id) = setup().await;
    let spec = AutoCodeSpec {
        prefix: "C".into(),
        width: 4,
    };

    let mut handles = Vec::new();
    for n in 0..8 {
        let store = store.clone();
        let spec = spec.clone();
        handles.push(tokio::spawn(async move {
            store
                .submit_create_with_generated_code(tenant_id, &spec, generated(&format!("req-{n}")))
                .await
                .unwrap()
                .org_code
        }));
    }

    let mut codes = Vec::new();
    for handle in handles {
        codes.push(handle.await.unwrap());
    }
    codes.sort();
    let expected: Vec<String> = (1..=8).map(|n| format!("C{n:04}")).collect();
    assert_eq!(codes, expected);
}

// -----------------------------------------------------------------------
// Tenant metadata
// -----------------------------------------------------------------------

#[tokio::test]
async fn field_configs_respect_enabled_window() {
    let (store, tenant_id) = setup().await;
    store
        .put_field_config(
            tenant_id,
            &TenantFieldConfig {
                field_key: "org_type".into(),
                value_type: "text".into(),
                data_source_type: FieldDataSourceType::Dict,
                data_source_config: json!({ "dict_code": "org_type" }),
                enabled_on: date("2026-01-01"),
                disabled_on: Some(date("2026-06-01")),
            },
        )
        .await
        .unwrap();

    let configs = store
        .list_enabled_field_configs(tenant_id, date("2026-03-01"))
        .await
        .unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].dict_code(), Some("org_type"));
    assert_eq!(configs[0].data_source_type, FieldDataSourceType::Dict);

    for as_of in ["2025-12-31", "2026-06-01"] {
        let configs = store
            .list_enabled_field_configs(tenant_id, date(as_of))
            .await
            .unwrap();
        assert!(configs.is_empty(), "config should be disabled on {as_of}");
    }
}

#[tokio::test]
async fn field_policy_falls_back_to_global() {
    let (store, tenant_id) = setup().await;
    let policy = |scope: FieldPolicyScope, rule: &str| TenantFieldPolicy {
        field_key: "org_code".into(),
        scope,
        maintainable: false,
        default_mode: FieldDefaultMode::Cel,
        default_rule_expr: Some(rule.into()),
        enabled_on: date("2026-01-01"),
        disabled_on: None,
    };
    store
        .put_field_policy(tenant_id, &policy(FieldPolicyScope::Global, "next_org_code(\"O\", 6)"))
        .await
        .unwrap();
    store
        .put_field_policy(
            tenant_id,
            &policy(
                FieldPolicyScope::Form("orgunit_create_dialog".into()),
                "next_org_code(\"F\", 4)",
            ),
        )
        .await
        .unwrap();

    let form = store
        .resolve_field_policy(
            tenant_id,
            "org_code",
            &FieldPolicyScope::Form("orgunit_create_dialog".into()),
            date("2026-02-01"),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(form.default_rule(), Some("next_org_code(\"F\", 4)"));
    assert_eq!(form.scope, FieldPolicyScope::Form("orgunit_create_dialog".into()));

    let fallback = store
        .resolve_field_policy(
            tenant_id,
            "org_code",
            &FieldPolicyScope::Form("other_form".into()),
            date("2026-02-01"),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fallback.scope, FieldPolicyScope::Global);
    assert_eq!(fallback.default_mode, FieldDefaultMode::Cel);

    let before = store
        .resolve_field_policy(
            tenant_id,
            "org_code",
            &FieldPolicyScope::Global,
            date("2025-12-31"),
        )
        .await
        .unwrap();
    assert!(before.is_none());
}

#[tokio::test]
async fn setid_decision_and_person_lookups() {
    let (store, tenant_id) = setup().await;
    let decision = SetIdStrategyFieldDecision {
        capability_key: "orgunit.create".into(),
        field_key: "org_type".into(),
        required: true,
        visible: true,
        maintainable: false,
        default_rule_ref: None,
        default_value: Some("DEPT".into()),
        allowed_value_codes: vec!["DEPT".into(), "TEAM".into()],
    };
    store
        .put_setid_decision(tenant_id, &decision, date("2026-01-01"))
        .await
        .unwrap();

    let found = store
        .resolve_setid_strategy_field_decision(
            tenant_id,
            "orgunit.create",
            "org_type",
            date("2026-02-01"),
        )
        .await
        .unwrap();
    assert_eq!(found, Some(decision));

    let person = Person {
        uuid: Uuid::new_v4(),
        pernr: "1001".into(),
        display_name: "Ada Lovelace".into(),
        status: PersonStatus::Inactive,
    };
    store.put_person(tenant_id, &person).await.unwrap();

    let found = store
        .find_person_by_pernr(tenant_id, "1001", date("2026-02-01"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.uuid, person.uuid);
    assert_eq!(found.status, PersonStatus::Inactive);
    assert!(
        store
            .find_person_by_pernr(tenant_id, "9999", date("2026-02-01"))
            .await
            .unwrap()
            .is_none()
    );
}
