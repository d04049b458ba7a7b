//! In-memory store and dictionary for driving the write services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use orgunit_core::autocode::{AutoCodeSpec, first_free_code};
use orgunit_core::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use orgunit_core::models::dict::DictOption;
use orgunit_core::models::event::{
    GeneratedCreate, OrgUnitEvent, OrgUnitEventType, RequestCodeHit, RequestCodeSource,
    SubmitCorrection, SubmitGeneratedCreate, SubmitOrgUnitEvent, SubmitRescindEvent,
    SubmitRescindOrg, SubmitStatusCorrection,
};
use orgunit_core::models::field::{
    FieldDataSourceType, FieldDefaultMode, FieldPolicyScope, SetIdStrategyFieldDecision,
    TenantFieldConfig, TenantFieldPolicy,
};
use orgunit_core::models::org_state::OrgState;
use orgunit_core::models::person::{Person, PersonStatus};
use orgunit_core::repository::{DictResolver, OrgUnitStore};
use serde_json::Value;
use uuid::Uuid;

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

#[derive(Debug, Clone)]
struct OrgRow {
    tenant_id: Uuid,
    id: Uuid,
    code: String,
    parent_id: Option<Uuid>,
    created_on: NaiveDate,
    rescinded: bool,
}

#[derive(Debug, Clone)]
struct CorrectionRow {
    tenant_id: Uuid,
    request_code: String,
    target_event_uuid: Uuid,
    source: RequestCodeSource,
}

#[derive(Default)]
struct State {
    orgs: Vec<OrgRow>,
    events: Vec<(Uuid, OrgUnitEvent)>,
    corrections: Vec<CorrectionRow>,
    /// Returned by the next `submit_event` instead of writing.
    submit_failure: Option<OrgUnitError>,
    configs: Vec<(Uuid, TenantFieldConfig)>,
    policies: Vec<(Uuid, TenantFieldPolicy)>,
    decisions: Vec<(Uuid, SetIdStrategyFieldDecision)>,
    persons: Vec<(Uuid, Person)>,
}

/// Shared in-memory store. Clones share state.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<State>>,
    mutations: Arc<AtomicUsize>,
}

impl FakeStore {
    /// Number of mutating calls made so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn event_count(&self, tenant_id: Uuid) -> usize {
        let state = self.state.lock().unwrap();
        state.events.iter().filter(|(t, _)| *t == tenant_id).count()
    }

    pub fn event(&self, event_uuid: Uuid) -> OrgUnitEvent {
        let state = self.state.lock().unwrap();
        state
            .events
            .iter()
            .find(|(_, e)| e.event_uuid == event_uuid)
            .map(|(_, e)| e.clone())
            .unwrap()
    }

    /// Seed an org and its CREATE event directly.
    pub fn seed_org(
        &self,
        tenant_id: Uuid,
        code: &str,
        parent: Option<&str>,
        created_on: &str,
    ) -> Uuid {
        let mut state = self.state.lock().unwrap();
        let parent_id = parent.map(|p| {
            state
                .orgs
                .iter()
                .find(|o| o.tenant_id == tenant_id && o.code == p)
                .unwrap()
                .id
        });
        let id = Uuid::new_v4();
        state.orgs.push(OrgRow {
            tenant_id,
            id,
            code: code.into(),
            parent_id,
            created_on: date(created_on),
            rescinded: false,
        });
        state.events.push((
            tenant_id,
            OrgUnitEvent {
                event_uuid: Uuid::new_v4(),
                org_id: id,
                event_type: OrgUnitEventType::Create,
                effective_date: date(created_on),
                payload: serde_json::json!({ "org_code": code, "name": code }),
                request_code: None,
                rescinded: false,
                transaction_time: Utc::now(),
            },
        ));
        id
    }

    /// Seed a non-CREATE event on an existing org.
    pub fn seed_event(
        &self,
        tenant_id: Uuid,
        org_id: Uuid,
        event_type: OrgUnitEventType,
        on: &str,
        payload: Value,
    ) -> Uuid {
        let event_uuid = Uuid::new_v4();
        self.state.lock().unwrap().events.push((
            tenant_id,
            OrgUnitEvent {
                event_uuid,
                org_id,
                event_type,
                effective_date: date(on),
                payload,
                request_code: None,
                rescinded: false,
                transaction_time: Utc::now(),
            },
        ));
        event_uuid
    }

    pub fn add_field_config(&self, tenant_id: Uuid, field_key: &str, dict_code: Option<&str>) {
        let (data_source_type, data_source_config) = match dict_code {
            Some(code) => (
                FieldDataSourceType::Dict,
                serde_json::json!({ "dict_code": code }),
            ),
            None => (FieldDataSourceType::Plain, serde_json::json!({})),
        };
        self.state.lock().unwrap().configs.push((
            tenant_id,
            TenantFieldConfig {
                field_key: field_key.into(),
                value_type: "text".into(),
                data_source_type,
                data_source_config,
                enabled_on: date("2000-01-01"),
                disabled_on: None,
            },
        ));
    }

    pub fn add_org_code_policy(
        &self,
        tenant_id: Uuid,
        scope: FieldPolicyScope,
        maintainable: bool,
        default_mode: FieldDefaultMode,
        rule: Option<&str>,
    ) {
        self.state.lock().unwrap().policies.push((
            tenant_id,
            TenantFieldPolicy {
                field_key: "org_code".into(),
                scope,
                maintainable,
                default_mode,
                default_rule_expr: rule.map(str::to_string),
                enabled_on: date("2000-01-01"),
                disabled_on: None,
            },
        ));
    }

    pub fn add_person(&self, tenant_id: Uuid, pernr: &str, name: &str, status: PersonStatus) -> Uuid {
        let uuid = Uuid::new_v4();
        self.state.lock().unwrap().persons.push((
            tenant_id,
            Person {
                uuid,
                pernr: pernr.into(),
                display_name: name.into(),
                status,
            },
        ));
        uuid
    }

    pub fn add_decision(&self, tenant_id: Uuid, decision: SetIdStrategyFieldDecision) {
        self.state.lock().unwrap().decisions.push((tenant_id, decision));
    }

    /// Make the next `submit_event` fail with `err`.
    pub fn fail_next_submit(&self, err: OrgUnitError) {
        self.state.lock().unwrap().submit_failure = Some(err);
    }

    fn bump(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn insert_event(&self, tenant_id: Uuid, input: SubmitOrgUnitEvent) -> OrgUnitResult<OrgUnitEvent> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.submit_failure.take() {
            return Err(err);
        }
        if request_code_taken(&state, tenant_id, &input.request_code) {
            return Err(OrgUnitError::conflict(
                ErrorCode::OrgRequestIdConflict,
                "duplicate request code",
            ));
        }
        let org_id = match input.org_id {
            Some(id) => id,
            None => {
                if state
                    .orgs
                    .iter()
                    .any(|o| o.tenant_id == tenant_id && o.code == input.org_code)
                {
                    return Err(OrgUnitError::conflict(
                        ErrorCode::OrgCodeConflict,
                        "duplicate org code",
                    ));
                }
                let parent_id = input
                    .payload
                    .get("parent_id")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok());
                let id = Uuid::new_v4();
                state.orgs.push(OrgRow {
                    tenant_id,
                    id,
                    code: input.org_code.clone(),
                    parent_id,
                    created_on: input.effective_date,
                    rescinded: false,
                });
                id
            }
        };
        let event = OrgUnitEvent {
            event_uuid: input.event_uuid,
            org_id,
            event_type: input.event_type,
            effective_date: input.effective_date,
            payload: input.payload,
            request_code: Some(input.request_code),
            rescinded: false,
            transaction_time: Utc::now(),
        };
        state.events.push((tenant_id, event.clone()));
        Ok(event)
    }

    /// Apply `f` to the target event and record the correction under
    /// `request_code`.
    fn update_event<F>(
        &self,
        tenant_id: Uuid,
        event_uuid: Uuid,
        request_code: &str,
        source: RequestCodeSource,
        f: F,
    ) -> OrgUnitResult<OrgUnitEvent>
    where
        F: FnOnce(&mut OrgUnitEvent),
    {
        let mut state = self.state.lock().unwrap();
        if request_code_taken(&state, tenant_id, request_code) {
            return Err(OrgUnitError::conflict(
                ErrorCode::OrgRequestIdConflict,
                "duplicate request code",
            ));
        }
        let (_, event) = state
            .events
            .iter_mut()
            .find(|(t, e)| *t == tenant_id && e.event_uuid == event_uuid)
            .ok_or_else(|| OrgUnitError::conflict(ErrorCode::OrgEventNotFound, "no event"))?;
        f(event);
        let event = event.clone();
        state.corrections.push(CorrectionRow {
            tenant_id,
            request_code: request_code.to_string(),
            target_event_uuid: event_uuid,
            source,
        });
        Ok(event)
    }
}

fn request_code_taken(state: &State, tenant_id: Uuid, request_code: &str) -> bool {
    state
        .events
        .iter()
        .any(|(t, e)| *t == tenant_id && e.request_code.as_deref() == Some(request_code))
        || state
            .corrections
            .iter()
            .any(|c| c.tenant_id == tenant_id && c.request_code == request_code)
}

impl OrgUnitStore for FakeStore {
    async fn submit_event(
        &self,
        tenant_id: Uuid,
        input: SubmitOrgUnitEvent,
    ) -> OrgUnitResult<OrgUnitEvent> {
        self.bump();
        self.insert_event(tenant_id, input)
    }

    async fn submit_correction(
        &self,
        tenant_id: Uuid,
        input: SubmitCorrection,
    ) -> OrgUnitResult<OrgUnitEvent> {
        self.bump();
        let source = RequestCodeSource::PayloadCorrection;
        self.update_event(tenant_id, input.target_event_uuid, &input.request_code, source, |event| {
            if let (Value::Object(payload), Value::Object(patch)) = (&mut event.payload, input.patch) {
                for (k, v) in patch {
                    if k == "effective_date"
                        && let Some(d) = v.as_str().and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                    {
                        event.effective_date = d;
                    }
                    payload.insert(k, v);
                }
            }
        })
    }

    async fn submit_status_correction(
        &self,
        tenant_id: Uuid,
        input: SubmitStatusCorrection,
    ) -> OrgUnitResult<OrgUnitEvent> {
        self.bump();
        let source = RequestCodeSource::OtherCorrection;
        self.update_event(tenant_id, input.target_event_uuid, &input.request_code, source, |event| {
            event.event_type = if input.target_status == "active" {
                OrgUnitEventType::Enable
            } else {
                OrgUnitEventType::Disable
            };
        })
    }

    async fn submit_rescind_event(
        &self,
        tenant_id: Uuid,
        input: SubmitRescindEvent,
    ) -> OrgUnitResult<OrgUnitEvent> {
        self.bump();
        let source = RequestCodeSource::OtherCorrection;
        self.update_event(tenant_id, input.target_event_uuid, &input.request_code, source, |event| {
            event.rescinded = true;
        })
    }

    async fn submit_rescind_org(
        &self,
        tenant_id: Uuid,
        input: SubmitRescindOrg,
    ) -> OrgUnitResult<u64> {
        self.bump();
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        for (t, event) in state.events.iter_mut() {
            if *t == tenant_id && event.org_id == input.org_id && !event.rescinded {
                event.rescinded = true;
                count += 1;
            }
        }
        for org in state.orgs.iter_mut() {
            if org.tenant_id == tenant_id && org.id == input.org_id {
                org.rescinded = true;
            }
        }
        Ok(count)
    }

    async fn submit_create_with_generated_code(
        &self,
        tenant_id: Uuid,
        spec: &AutoCodeSpec,
        input: SubmitGeneratedCreate,
    ) -> OrgUnitResult<GeneratedCreate> {
        let existing: Vec<String> = {
            let state = self.state.lock().unwrap();
            state
                .orgs
                .iter()
                .filter(|o| o.tenant_id == tenant_id && o.code.starts_with(&spec.prefix))
                .map(|o| o.code.clone())
                .collect()
        };
        let org_code = first_free_code(spec, &existing)?;
        let mut payload = input.payload;
        if let Value::Object(map) = &mut payload {
            map.insert("org_code".into(), Value::from(org_code.clone()));
        }
        self.bump();
        let event = self.insert_event(
            tenant_id,
            SubmitOrgUnitEvent {
                event_uuid: input.event_uuid,
                org_id: None,
                org_code: org_code.clone(),
                event_type: OrgUnitEventType::Create,
                effective_date: input.effective_date,
                payload,
                request_code: input.request_code,
                initiator_id: input.initiator_id,
            },
        )?;
        Ok(GeneratedCreate { org_code, event })
    }

    async fn find_event_by_uuid(
        &self,
        tenant_id: Uuid,
        event_uuid: Uuid,
    ) -> OrgUnitResult<Option<OrgUnitEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .find(|(t, e)| *t == tenant_id && e.event_uuid == event_uuid)
            .map(|(_, e)| e.clone()))
    }

    async fn find_event_by_effective_date(
        &self,
        tenant_id: Uuid,
        org_id: Uuid,
        effective_date: NaiveDate,
    ) -> OrgUnitResult<Option<OrgUnitEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|(t, e)| {
                *t == tenant_id && e.org_id == org_id && e.effective_date == effective_date
            })
            .max_by_key(|(_, e)| !e.rescinded)
            .map(|(_, e)| e.clone()))
    }

    async fn find_event_by_request_code(
        &self,
        tenant_id: Uuid,
        request_code: &str,
    ) -> OrgUnitResult<Option<RequestCodeHit>> {
        let state = self.state.lock().unwrap();
        let event_with_uuid = |uuid: Uuid| {
            state
                .events
                .iter()
                .find(|(t, e)| *t == tenant_id && e.event_uuid == uuid)
                .map(|(_, e)| e.clone())
        };
        if let Some((_, event)) = state
            .events
            .iter()
            .find(|(t, e)| *t == tenant_id && e.request_code.as_deref() == Some(request_code))
        {
            return Ok(Some(RequestCodeHit {
                event: event.clone(),
                source: RequestCodeSource::Event,
            }));
        }
        Ok(state
            .corrections
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.request_code == request_code)
            .and_then(|c| {
                event_with_uuid(c.target_event_uuid).map(|event| RequestCodeHit {
                    event,
                    source: c.source,
                })
            }))
    }

    async fn list_enabled_field_configs(
        &self,
        tenant_id: Uuid,
        as_of: NaiveDate,
    ) -> OrgUnitResult<Vec<TenantFieldConfig>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .configs
            .iter()
            .filter(|(t, c)| *t == tenant_id && c.is_enabled_as_of(as_of))
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn resolve_org_id(&self, tenant_id: Uuid, org_code: &str) -> OrgUnitResult<Option<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orgs
            .iter()
            .find(|o| o.tenant_id == tenant_id && o.code == org_code)
            .map(|o| o.id))
    }

    async fn resolve_org_code(&self, tenant_id: Uuid, org_id: Uuid) -> OrgUnitResult<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orgs
            .iter()
            .find(|o| o.tenant_id == tenant_id && o.id == org_id)
            .map(|o| o.code.clone()))
    }

    async fn load_org_state(
        &self,
        tenant_id: Uuid,
        org_code: &str,
        as_of: NaiveDate,
    ) -> OrgUnitResult<OrgState> {
        let state = self.state.lock().unwrap();
        let live = |o: &&OrgRow| o.tenant_id == tenant_id && !o.rescinded;
        let tree_initialized = state
            .orgs
            .iter()
            .filter(live)
            .any(|o| o.parent_id.is_none());
        let Some(org) = state
            .orgs
            .iter()
            .find(|o| o.tenant_id == tenant_id && o.code == org_code)
        else {
            return Ok(OrgState {
                tree_initialized,
                ..Default::default()
            });
        };
        Ok(OrgState {
            org_id: Some(org.id),
            exists_as_of: !org.rescinded && org.created_on <= as_of,
            is_root: org.parent_id.is_none(),
            has_children: state
                .orgs
                .iter()
                .filter(live)
                .any(|o| o.parent_id == Some(org.id)),
            tree_initialized,
        })
    }

    async fn resolve_field_policy(
        &self,
        tenant_id: Uuid,
        field_key: &str,
        scope: &FieldPolicyScope,
        as_of: NaiveDate,
    ) -> OrgUnitResult<Option<TenantFieldPolicy>> {
        let state = self.state.lock().unwrap();
        let enabled = |p: &TenantFieldPolicy| {
            p.field_key == field_key
                && p.enabled_on <= as_of
                && p.disabled_on.is_none_or(|d| as_of < d)
        };
        let find = |scope: &FieldPolicyScope| {
            state
                .policies
                .iter()
                .find(|(t, p)| *t == tenant_id && p.scope == *scope && enabled(p))
                .map(|(_, p)| p.clone())
        };
        Ok(find(scope).or_else(|| find(&FieldPolicyScope::Global)))
    }

    async fn resolve_setid_strategy_field_decision(
        &self,
        tenant_id: Uuid,
        capability_key: &str,
        field_key: &str,
        _as_of: NaiveDate,
    ) -> OrgUnitResult<Option<SetIdStrategyFieldDecision>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .decisions
            .iter()
            .find(|(t, d)| {
                *t == tenant_id && d.capability_key == capability_key && d.field_key == field_key
            })
            .map(|(_, d)| d.clone()))
    }

    async fn find_person_by_pernr(
        &self,
        tenant_id: Uuid,
        pernr: &str,
        _as_of: NaiveDate,
    ) -> OrgUnitResult<Option<Person>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .persons
            .iter()
            .find(|(t, p)| *t == tenant_id && p.pernr == pernr)
            .map(|(_, p)| p.clone()))
    }
}

/// Dictionary keyed by `(dict_code, code)`.
#[derive(Clone, Default)]
pub struct FakeDict {
    labels: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl FakeDict {
    pub fn with(entries: &[(&str, &str, &str)]) -> Self {
        let dict = Self::default();
        {
            let mut labels = dict.labels.lock().unwrap();
            for (dict_code, code, label) in entries {
                labels.insert((dict_code.to_string(), code.to_string()), label.to_string());
            }
        }
        dict
    }
}

impl DictResolver for FakeDict {
    async fn resolve_value_label(
        &self,
        _tenant_id: Uuid,
        _as_of: NaiveDate,
        dict_code: &str,
        code: &str,
    ) -> OrgUnitResult<Option<String>> {
        let labels = self.labels.lock().unwrap();
        Ok(labels
            .get(&(dict_code.to_string(), code.to_string()))
            .cloned())
    }

    async fn list_options(
        &self,
        _tenant_id: Uuid,
        _as_of: NaiveDate,
        dict_code: &str,
        keyword: &str,
        limit: usize,
    ) -> OrgUnitResult<Vec<DictOption>> {
        let labels = self.labels.lock().unwrap();
        let mut options: Vec<DictOption> = labels
            .iter()
            .filter(|((d, c), l)| d == dict_code && (c.contains(keyword) || l.contains(keyword)))
            .map(|((_, c), l)| DictOption {
                code: c.clone(),
                label: l.clone(),
            })
            .collect();
        options.sort_by(|a, b| a.code.cmp(&b.code));
        options.truncate(limit);
        Ok(options)
    }
}
