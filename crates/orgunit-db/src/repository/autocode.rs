//! Auto-code allocation for CREATE events without an explicit code.
//!
//! Allocation for one `(tenant, prefix)` pair is serialized in-process by
//! an async mutex, so concurrent creates in one server never pick the same
//! gap. Another writer on the same database can still race us; that
//! surfaces as an `ORG_CODE_CONFLICT` on insert, and we retry with the
//! losing code marked as used.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use orgunit_core::autocode::{AutoCodeSpec, first_free_code};
use orgunit_core::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use orgunit_core::models::event::{
    GeneratedCreate, OrgUnitEventType, SubmitGeneratedCreate, SubmitOrgUnitEvent,
};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use tracing::{info, warn};
use uuid::Uuid;

use super::org_unit::SurrealOrgUnitStore;
use crate::error::{DbError, ORG_CODE_INDEX};

/// Tuning for the SurrealDB store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Inserts attempted per generated create before giving up with
    /// `ORG_CODE_CONFLICT`.
    pub max_code_allocation_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_code_allocation_attempts: 16,
        }
    }
}

type LockKey = (Uuid, String);

/// One async mutex per `(tenant, prefix)`, created on first use.
///
/// An entry only the map still references is idle and is pruned on the
/// next lookup, so the map holds the pairs with allocations in flight.
#[derive(Clone, Default)]
pub(super) struct AllocationLocks {
    locks: Arc<Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AllocationLocks {
    fn lock_for(&self, tenant_id: Uuid, prefix: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry((tenant_id, prefix.to_string()))
            .or_default()
            .clone()
    }
}

#[derive(Debug, SurrealValue)]
struct CodeRow {
    org_code: String,
}

impl<C: Connection> SurrealOrgUnitStore<C> {
    async fn codes_with_prefix(&self, tenant_id: Uuid, prefix: &str) -> Result<Vec<String>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT org_code FROM org_unit \
                 WHERE tenant_id = $tenant_id \
                 AND string::starts_with(org_code, $prefix)",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("prefix", prefix.to_string()))
            .await?;

        let rows: Vec<CodeRow> = result.take(0)?;
        Ok(rows.into_iter().map(|row| row.org_code).collect())
    }

    /// Pick the first free code for `spec` and insert the CREATE carrying
    /// it, retrying on code conflicts.
    pub(super) async fn allocate_and_create(
        &self,
        tenant_id: Uuid,
        spec: &AutoCodeSpec,
        input: SubmitGeneratedCreate,
    ) -> OrgUnitResult<GeneratedCreate> {
        let lock = self.allocation_locks.lock_for(tenant_id, &spec.prefix);
        let _guard = lock.lock().await;

        // 1. Snapshot the codes already taken under this prefix
        let mut used = self.codes_with_prefix(tenant_id, &spec.prefix).await?;

        for attempt in 1..=self.config.max_code_allocation_attempts {
            // 2. Take the lowest gap (fails with ORG_CODE_EXHAUSTED)
            let org_code = first_free_code(spec, &used)?;

            // 3. Insert the CREATE with the code stamped into its payload
            let mut payload = input.payload.clone();
            if let Some(object) = payload.as_object_mut() {
                object.insert("org_code".into(), org_code.clone().into());
            }
            let submit = SubmitOrgUnitEvent {
                event_uuid: input.event_uuid,
                org_id: None,
                org_code: org_code.clone(),
                event_type: OrgUnitEventType::Create,
                effective_date: input.effective_date,
                payload,
                request_code: input.request_code.clone(),
                initiator_id: input.initiator_id,
            };

            match self.insert_event(tenant_id, submit).await {
                Ok(event) => {
                    info!(
                        %tenant_id,
                        prefix = %spec.prefix,
                        width = spec.width,
                        %org_code,
                        "Allocated org code"
                    );
                    return Ok(GeneratedCreate { org_code, event });
                }
                Err(DbError::UniqueViolation { index, .. }) if index == ORG_CODE_INDEX => {
                    warn!(
                        %tenant_id,
                        %org_code,
                        attempt,
                        "Generated org code taken concurrently, retrying"
                    );
                    used.push(org_code);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(OrgUnitError::conflict(
            ErrorCode::OrgCodeConflict,
            format!(
                "could not allocate a code for prefix {:?} after {} attempts",
                spec.prefix, self.config.max_code_allocation_attempts
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_are_shared_per_tenant_and_prefix() {
        let locks = AllocationLocks::default();
        let tenant = Uuid::new_v4();

        let a = locks.lock_for(tenant, "O");
        let b = locks.lock_for(tenant, "O");
        let c = locks.lock_for(tenant, "D");
        let d = locks.lock_for(Uuid::new_v4(), "O");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
    }

    #[test]
    fn idle_locks_are_pruned() {
        let locks = AllocationLocks::default();
        let tenant = Uuid::new_v4();

        let held = locks.lock_for(tenant, "O");
        let idle = locks.lock_for(tenant, "D");
        drop(idle);

        let _other = locks.lock_for(Uuid::new_v4(), "O");
        let map = locks.locks.lock().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&(tenant, "O".to_string())));
        assert!(!map.contains_key(&(tenant, "D".to_string())));
        drop(map);
        drop(held);
    }

    #[test]
    fn default_config_allows_retries() {
        assert!(StoreConfig::default().max_code_allocation_attempts > 1);
    }
}
