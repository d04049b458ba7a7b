//! Org-unit database layer: SurrealDB connection management, schema
//! migrations, and the [`OrgUnitStore`](orgunit_core::repository::OrgUnitStore)
//! and [`DictResolver`](orgunit_core::repository::DictResolver)
//! implementations the write services run against.

mod connection;
mod error;
mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{StoreConfig, SurrealDictResolver, SurrealOrgUnitStore};
pub use schema::run_migrations;
