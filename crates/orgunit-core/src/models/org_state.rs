//! Snapshot of org facts used to build policy inputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgState {
    /// Resolved id; `None` when the code has never been created.
    pub org_id: Option<Uuid>,
    /// The org exists (and is not rescinded) as of the requested date.
    pub exists_as_of: bool,
    pub is_root: bool,
    pub has_children: bool,
    /// A root org exists for the tenant.
    pub tree_initialized: bool,
}
