//! Error types for the org-unit mutation core.
//!
//! Callers depend on the stable string codes in [`ErrorCode`]; the
//! transport layer maps them to HTTP status without reading messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, user-visible error and deny-reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Forbidden,
    OrgTreeNotInitialized,
    OrgNotFoundAsOf,
    OrgRootCannotBeMoved,
    OrgAlreadyExists,
    OrgRootAlreadyExists,
    OrgEventNotFound,
    OrgEventRescinded,
    OrgHasChildrenCannotDelete,
    OrgHasDependenciesCannotDelete,
    OrgStatusCorrectionUnsupportedTarget,
    OrgCodeInvalid,
    OrgCodeNotFound,
    OrgCodeConflict,
    OrgCodeExhausted,
    EffectiveDateInvalid,
    PatchFieldNotAllowed,
    PatchRequired,
    ParentNotFoundAsOf,
    ManagerPernrInvalid,
    ManagerPernrNotFound,
    ManagerPernrInactive,
    OrgRequestIdConflict,
    OrgRequestCodeRequired,
    OrgIntentUnsupported,
    OrgInvalidArgument,
    FieldNotMaintainable,
    DefaultRuleRequired,
    FieldPolicyExprInvalid,
    DefaultRuleEvalFailed,
    FieldDefaultModeInvalid,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::OrgTreeNotInitialized => "ORG_TREE_NOT_INITIALIZED",
            Self::OrgNotFoundAsOf => "ORG_NOT_FOUND_AS_OF",
            Self::OrgRootCannotBeMoved => "ORG_ROOT_CANNOT_BE_MOVED",
            Self::OrgAlreadyExists => "ORG_ALREADY_EXISTS",
            Self::OrgRootAlreadyExists => "ORG_ROOT_ALREADY_EXISTS",
            Self::OrgEventNotFound => "ORG_EVENT_NOT_FOUND",
            Self::OrgEventRescinded => "ORG_EVENT_RESCINDED",
            Self::OrgHasChildrenCannotDelete => "ORG_HAS_CHILDREN_CANNOT_DELETE",
            Self::OrgHasDependenciesCannotDelete => "ORG_HAS_DEPENDENCIES_CANNOT_DELETE",
            Self::OrgStatusCorrectionUnsupportedTarget => {
                "ORG_STATUS_CORRECTION_UNSUPPORTED_TARGET"
            }
            Self::OrgCodeInvalid => "ORG_CODE_INVALID",
            Self::OrgCodeNotFound => "ORG_CODE_NOT_FOUND",
            Self::OrgCodeConflict => "ORG_CODE_CONFLICT",
            Self::OrgCodeExhausted => "ORG_CODE_EXHAUSTED",
            Self::EffectiveDateInvalid => "EFFECTIVE_DATE_INVALID",
            Self::PatchFieldNotAllowed => "PATCH_FIELD_NOT_ALLOWED",
            Self::PatchRequired => "PATCH_REQUIRED",
            Self::ParentNotFoundAsOf => "PARENT_NOT_FOUND_AS_OF",
            Self::ManagerPernrInvalid => "MANAGER_PERNR_INVALID",
            Self::ManagerPernrNotFound => "MANAGER_PERNR_NOT_FOUND",
            Self::ManagerPernrInactive => "MANAGER_PERNR_INACTIVE",
            Self::OrgRequestIdConflict => "ORG_REQUEST_ID_CONFLICT",
            Self::OrgRequestCodeRequired => "ORG_REQUEST_CODE_REQUIRED",
            Self::OrgIntentUnsupported => "ORG_INTENT_UNSUPPORTED",
            Self::OrgInvalidArgument => "ORG_INVALID_ARGUMENT",
            Self::FieldNotMaintainable => "FIELD_NOT_MAINTAINABLE",
            Self::DefaultRuleRequired => "DEFAULT_RULE_REQUIRED",
            Self::FieldPolicyExprInvalid => "FIELD_POLICY_EXPR_INVALID",
            Self::DefaultRuleEvalFailed => "DEFAULT_RULE_EVAL_FAILED",
            Self::FieldDefaultModeInvalid => "FIELD_DEFAULT_MODE_INVALID",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum OrgUnitError {
    /// Caller/input error. Never retried.
    #[error("{code}: {message}")]
    BadRequest { code: ErrorCode, message: String },

    /// Business-state conflict (not found, already exists, exhausted, ...).
    #[error("{code}: {message}")]
    Conflict { code: ErrorCode, message: String },

    /// A policy key outside the supported combinations. Programmer error.
    #[error("Invalid policy key: {0}")]
    InvalidPolicyKey(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrgUnitError {
    pub fn bad_request(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// The stable code, if this error carries one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::BadRequest { code, .. } | Self::Conflict { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }

    /// Infrastructure failures the caller may retry at the transport layer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Cancelled)
    }
}

pub type OrgUnitResult<T> = Result<T, OrgUnitError>;
