//! Domain models for the org-unit mutation core.
//!
//! Store-persisted records (events, tenant field configs and policies)
//! and the transient values built and discarded within one request.

pub mod dict;
pub mod event;
pub mod field;
pub mod org_state;
pub mod patch;
pub mod person;
