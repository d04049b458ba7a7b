//! Person model, as seen by manager resolution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PersonStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub uuid: Uuid,
    /// Normalized personnel number.
    pub pernr: String,
    pub display_name: String,
    pub status: PersonStatus,
}
