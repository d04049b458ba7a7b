//! Write capabilities for the unified write path.
//!
//! A second policy table alongside [`crate::policy`]. Every intent is a
//! generic "apply fields" operation, so the field set is fixed and
//! `parent_org_code` always lands on `parent_id`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::deny_reason::dedup_and_sort_deny_reasons;
use crate::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use crate::field_keys::{
    FIELD_IS_BUSINESS_UNIT, FIELD_MANAGER_PERNR, FIELD_NAME, FIELD_PARENT_ORG_CODE, FIELD_STATUS,
    ext_payload_key, merge_field_keys,
};
use crate::models::event::OrgUnitEventType;

const WRITE_CORE_FIELDS: &[&str] = &[
    FIELD_IS_BUSINESS_UNIT,
    FIELD_MANAGER_PERNR,
    FIELD_NAME,
    FIELD_PARENT_ORG_CODE,
    FIELD_STATUS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteIntent {
    CreateOrg,
    AddVersion,
    InsertVersion,
    Correct,
}

impl WriteIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateOrg => "create_org",
            Self::AddVersion => "add_version",
            Self::InsertVersion => "insert_version",
            Self::Correct => "correct",
        }
    }

    /// Event type a write under this intent produces. Corrections keep
    /// the type of whatever event they target.
    pub fn expected_event_type(self) -> Option<OrgUnitEventType> {
        match self {
            Self::CreateOrg => Some(OrgUnitEventType::Create),
            Self::AddVersion | Self::InsertVersion => Some(OrgUnitEventType::Update),
            Self::Correct => None,
        }
    }
}

impl fmt::Display for WriteIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteIntent {
    type Err = OrgUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "create_org" => Ok(Self::CreateOrg),
            "add_version" => Ok(Self::AddVersion),
            "insert_version" => Ok(Self::InsertVersion),
            "correct" => Ok(Self::Correct),
            other => Err(OrgUnitError::bad_request(
                ErrorCode::OrgIntentUnsupported,
                format!("unsupported write intent: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteCapabilitiesFacts {
    pub can_admin: bool,
    pub tree_initialized: bool,
    pub org_already_exists: bool,
    pub creating_root: bool,
    pub target_exists_as_of: bool,
    pub enabled_ext_field_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteCapabilities {
    pub enabled: bool,
    pub allowed_fields: Vec<String>,
    pub field_payload_keys: BTreeMap<String, String>,
    pub deny_reasons: Vec<ErrorCode>,
}

impl WriteCapabilities {
    pub fn allows(&self, field: &str) -> bool {
        self.allowed_fields.iter().any(|f| f == field)
    }

    pub fn payload_key(&self, field: &str) -> Option<&str> {
        self.field_payload_keys.get(field).map(String::as_str)
    }

    pub fn ensure_enabled(&self) -> OrgUnitResult<()> {
        match self.deny_reasons.first() {
            Some(code) if !self.enabled => Err(OrgUnitError::conflict(
                *code,
                format!("write denied: {code}"),
            )),
            _ => Ok(()),
        }
    }
}

pub fn resolve_write_capabilities(
    intent: WriteIntent,
    facts: &WriteCapabilitiesFacts,
) -> WriteCapabilities {
    let mut deny = Vec::new();
    if !facts.can_admin {
        deny.push(ErrorCode::Forbidden);
    }
    match intent {
        WriteIntent::CreateOrg => {
            if facts.org_already_exists {
                deny.push(ErrorCode::OrgAlreadyExists);
            }
            if facts.creating_root && facts.tree_initialized {
                deny.push(ErrorCode::OrgRootAlreadyExists);
            }
            if !facts.creating_root && !facts.tree_initialized {
                deny.push(ErrorCode::OrgTreeNotInitialized);
            }
        }
        WriteIntent::AddVersion | WriteIntent::InsertVersion => {
            if !facts.tree_initialized {
                deny.push(ErrorCode::OrgTreeNotInitialized);
            }
            if !facts.target_exists_as_of {
                deny.push(ErrorCode::OrgNotFoundAsOf);
            }
        }
        WriteIntent::Correct => {}
    }

    let deny_reasons = dedup_and_sort_deny_reasons(deny);
    if !deny_reasons.is_empty() {
        return WriteCapabilities {
            enabled: false,
            deny_reasons,
            ..Default::default()
        };
    }

    let allowed_fields = merge_field_keys(WRITE_CORE_FIELDS, &facts.enabled_ext_field_keys);
    let field_payload_keys = allowed_fields
        .iter()
        .map(|f| {
            let key = match f.as_str() {
                FIELD_PARENT_ORG_CODE => "parent_id".to_string(),
                core if WRITE_CORE_FIELDS.contains(&core) => core.to_string(),
                ext => ext_payload_key(ext),
            };
            (f.clone(), key)
        })
        .collect();
    WriteCapabilities {
        enabled: true,
        allowed_fields,
        field_payload_keys,
        deny_reasons,
    }
}
