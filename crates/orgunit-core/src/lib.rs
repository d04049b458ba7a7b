//! Org-unit mutation core: policy resolution, write capabilities, auto-code
//! rules, and the store contracts the write services consume.
//!
//! This crate performs no I/O. Everything here is either a pure
//! function over typed inputs or a trait the adapters implement.

pub mod autocode;
pub mod capabilities;
pub mod deny_reason;
pub mod error;
pub mod field_keys;
pub mod models;
pub mod policy;
pub mod repository;
pub mod validate;

pub use error::{ErrorCode, OrgUnitError, OrgUnitResult};
