//! Org-unit write server: connects to SurrealDB, applies migrations and
//! wires the write services.

use std::sync::Arc;

use orgunit_core::autocode::CelProgramCache;
use orgunit_db::{DbConfig, DbManager, StoreConfig, SurrealDictResolver, SurrealOrgUnitStore};
use orgunit_write::{OrgUnitMutationService, OrgUnitWriteService, WriteConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("orgunit=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting org-unit server...");

    let db_config = DbConfig::from_env();
    let manager = match DbManager::connect(&db_config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };
    let db = manager.client().clone();

    if let Err(e) = orgunit_db::run_migrations(&db).await {
        tracing::error!(error = %e, "Schema migration failed");
        std::process::exit(1);
    }

    let store = SurrealOrgUnitStore::with_config(db.clone(), StoreConfig::default());
    let dict = SurrealDictResolver::new(db);
    let write_config = WriteConfig::from_env();
    tracing::info!(
        default_policy_scope_key = %write_config.default_policy_scope_key,
        "Write services configured"
    );

    // No transport is mounted here; an embedding transport layer takes
    // these services and owns request routing.
    let _writes = OrgUnitWriteService::new(
        store.clone(),
        dict.clone(),
        Arc::new(CelProgramCache::new()),
        write_config,
    );
    let _mutations = OrgUnitMutationService::new(store, dict);

    tracing::info!("Org-unit server ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    tracing::info!("Org-unit server stopped.");
}
