//! Sparse patches supplied by write callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_keys::{
    FIELD_EFFECTIVE_DATE, FIELD_IS_BUSINESS_UNIT, FIELD_MANAGER_PERNR, FIELD_NAME,
    FIELD_PARENT_ORG_CODE, FIELD_STATUS,
};

/// A sparse set of field changes.
///
/// Used both for corrections of submitted events and for the unified
/// write path. `None` means "not supplied"; `Some("")` on a string
/// field clears it where the field allows clearing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgUnitPatch {
    /// New effective date for a correction. Exclusive with every other field.
    pub effective_date: Option<String>,
    pub name: Option<String>,
    pub parent_org_code: Option<String>,
    pub is_business_unit: Option<bool>,
    pub manager_pernr: Option<String>,
    pub status: Option<String>,
    /// Extension-field values keyed by field key.
    #[serde(default)]
    pub ext: BTreeMap<String, serde_json::Value>,
}

impl OrgUnitPatch {
    pub fn is_empty(&self) -> bool {
        self.present_core_fields().is_empty() && self.ext.is_empty()
    }

    /// Core field keys present in the patch, in a fixed order.
    pub fn present_core_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.effective_date.is_some() {
            fields.push(FIELD_EFFECTIVE_DATE);
        }
        if self.name.is_some() {
            fields.push(FIELD_NAME);
        }
        if self.parent_org_code.is_some() {
            fields.push(FIELD_PARENT_ORG_CODE);
        }
        if self.is_business_unit.is_some() {
            fields.push(FIELD_IS_BUSINESS_UNIT);
        }
        if self.manager_pernr.is_some() {
            fields.push(FIELD_MANAGER_PERNR);
        }
        if self.status.is_some() {
            fields.push(FIELD_STATUS);
        }
        fields
    }

    /// True when a field other than `effective_date` is present.
    pub fn has_non_date_fields(&self) -> bool {
        self.present_core_fields()
            .iter()
            .any(|f| *f != FIELD_EFFECTIVE_DATE)
            || !self.ext.is_empty()
    }
}

/// Patch type for corrections of already-submitted events.
pub type OrgUnitCorrectionPatch = OrgUnitPatch;
