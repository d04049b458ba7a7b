//! Tenant field metadata: extension-field configs, write-time field
//! policies, and SetID strategy field decisions.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, OrgUnitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataSourceType {
    Plain,
    Dict,
    Entity,
}

impl FieldDataSourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Dict => "DICT",
            Self::Entity => "ENTITY",
        }
    }
}

impl FromStr for FieldDataSourceType {
    type Err = OrgUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PLAIN" => Ok(Self::Plain),
            "DICT" => Ok(Self::Dict),
            "ENTITY" => Ok(Self::Entity),
            other => Err(OrgUnitError::Internal(format!(
                "unknown data source type: {other}"
            ))),
        }
    }
}

/// Per-tenant metadata for one extension field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantFieldConfig {
    pub field_key: String,
    /// `text`, `int`, `bool`, `date`, `uuid` or `numeric`.
    pub value_type: String,
    pub data_source_type: FieldDataSourceType,
    /// e.g. `{"dict_code": "org_type"}` for DICT fields.
    pub data_source_config: serde_json::Value,
    pub enabled_on: NaiveDate,
    pub disabled_on: Option<NaiveDate>,
}

impl TenantFieldConfig {
    /// Dictionary code for DICT fields.
    pub fn dict_code(&self) -> Option<&str> {
        self.data_source_config
            .get("dict_code")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_enabled_as_of(&self, as_of: NaiveDate) -> bool {
        self.enabled_on <= as_of && self.disabled_on.is_none_or(|d| as_of < d)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldPolicyScope {
    Global,
    Form(String),
}

impl FieldPolicyScope {
    pub fn scope_type(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Form(_) => "FORM",
        }
    }

    pub fn scope_key(&self) -> &str {
        match self {
            Self::Global => "global",
            Self::Form(key) => key,
        }
    }
}

impl fmt::Display for FieldPolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope_type(), self.scope_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDefaultMode {
    None,
    Cel,
}

impl FromStr for FieldDefaultMode {
    type Err = OrgUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NONE" | "" => Ok(Self::None),
            "CEL" => Ok(Self::Cel),
            other => Err(OrgUnitError::bad_request(
                ErrorCode::FieldDefaultModeInvalid,
                format!("unsupported default mode: {other}"),
            )),
        }
    }
}

/// Write-time constraint on one field under one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantFieldPolicy {
    pub field_key: String,
    pub scope: FieldPolicyScope,
    pub maintainable: bool,
    pub default_mode: FieldDefaultMode,
    pub default_rule_expr: Option<String>,
    pub enabled_on: NaiveDate,
    pub disabled_on: Option<NaiveDate>,
}

impl TenantFieldPolicy {
    /// The default rule, if one is set and non-blank.
    pub fn default_rule(&self) -> Option<&str> {
        self.default_rule_expr
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Read-time projection of a field under a named SetID capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetIdStrategyFieldDecision {
    pub capability_key: String,
    pub field_key: String,
    pub required: bool,
    pub visible: bool,
    pub maintainable: bool,
    pub default_rule_ref: Option<String>,
    pub default_value: Option<String>,
    pub allowed_value_codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn config_enabled_window_is_half_open() {
        let cfg = TenantFieldConfig {
            field_key: "org_type".into(),
            value_type: "text".into(),
            data_source_type: FieldDataSourceType::Dict,
            data_source_config: serde_json::json!({ "dict_code": "org_type" }),
            enabled_on: date(2026, 1, 1),
            disabled_on: Some(date(2026, 6, 1)),
        };
        assert!(!cfg.is_enabled_as_of(date(2025, 12, 31)));
        assert!(cfg.is_enabled_as_of(date(2026, 1, 1)));
        assert!(!cfg.is_enabled_as_of(date(2026, 6, 1)));
        assert_eq!(cfg.dict_code(), Some("org_type"));
    }

    #[test]
    fn default_mode_rejects_unknown() {
        assert_eq!("CEL".parse::<FieldDefaultMode>().unwrap(), FieldDefaultMode::Cel);
        let err = "SCRIPT".parse::<FieldDefaultMode>().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::FieldDefaultModeInvalid));
    }
}
