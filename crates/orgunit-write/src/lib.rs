//! Org-unit write services.
//!
//! [`OrgUnitWriteService`] is the unified write path (create, add
//! version, insert version, correct) with request-code idempotency and
//! create-time auto-code defaults. [`OrgUnitMutationService`] carries
//! the typed event updates, corrections and rescinds. Both are generic
//! over the store and dictionary traits in `orgunit-core`.

pub mod config;
pub mod defaults;
pub mod idempotency;
pub mod mutation;
mod resolve;
pub mod service;

pub use config::WriteConfig;
pub use mutation::OrgUnitMutationService;
pub use service::{OrgUnitWriteService, WriteOrgUnitRequest, WriteOrgUnitResult};
