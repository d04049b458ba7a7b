//! Dictionary option model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DictOption {
    pub code: String,
    pub label: String,
}
