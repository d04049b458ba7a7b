//! Org-unit event model.
//!
//! Events are immutable facts. Corrections and rescissions supersede
//! them in the store; nothing in this core mutates an event.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorCode, OrgUnitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgUnitEventType {
    Create,
    Update,
    Move,
    Rename,
    Disable,
    Enable,
    SetBusinessUnit,
}

impl OrgUnitEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Move => "MOVE",
            Self::Rename => "RENAME",
            Self::Disable => "DISABLE",
            Self::Enable => "ENABLE",
            Self::SetBusinessUnit => "SET_BUSINESS_UNIT",
        }
    }
}

impl fmt::Display for OrgUnitEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgUnitEventType {
    type Err = OrgUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "MOVE" => Ok(Self::Move),
            "RENAME" => Ok(Self::Rename),
            "DISABLE" => Ok(Self::Disable),
            "ENABLE" => Ok(Self::Enable),
            "SET_BUSINESS_UNIT" => Ok(Self::SetBusinessUnit),
            other => Err(OrgUnitError::bad_request(
                ErrorCode::OrgInvalidArgument,
                format!("unknown event type: {other}"),
            )),
        }
    }
}

/// A submitted org-unit event as the store reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgUnitEvent {
    pub event_uuid: Uuid,
    pub org_id: Uuid,
    pub event_type: OrgUnitEventType,
    pub effective_date: NaiveDate,
    pub payload: serde_json::Value,
    /// Client request code the event was submitted under.
    pub request_code: Option<String>,
    /// Set once the event has been rescinded.
    pub rescinded: bool,
    pub transaction_time: DateTime<Utc>,
}

impl OrgUnitEvent {
    /// The org code embedded in the payload, if any.
    pub fn payload_org_code(&self) -> Option<&str> {
        self.payload
            .get("org_code")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Where a request code was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCodeSource {
    /// The request submitted the event itself.
    Event,
    /// The request patched the event's payload.
    PayloadCorrection,
    /// The request corrected the event's status or rescinded it.
    OtherCorrection,
}

/// A prior write found under a request code. For corrections `event` is
/// the target event.
#[derive(Debug, Clone)]
pub struct RequestCodeHit {
    pub event: OrgUnitEvent,
    pub source: RequestCodeSource,
}

/// Input for submitting a new event.
#[derive(Debug, Clone)]
pub struct SubmitOrgUnitEvent {
    pub event_uuid: Uuid,
    /// `None` only for CREATE.
    pub org_id: Option<Uuid>,
    pub org_code: String,
    pub event_type: OrgUnitEventType,
    pub effective_date: NaiveDate,
    pub payload: serde_json::Value,
    pub request_code: String,
    pub initiator_id: Option<Uuid>,
}

/// Input for a CREATE whose org code the store allocates.
#[derive(Debug, Clone)]
pub struct SubmitGeneratedCreate {
    pub event_uuid: Uuid,
    pub effective_date: NaiveDate,
    pub payload: serde_json::Value,
    pub request_code: String,
    pub initiator_id: Option<Uuid>,
}

/// Result of a CREATE with a generated code.
#[derive(Debug, Clone)]
pub struct GeneratedCreate {
    pub org_code: String,
    pub event: OrgUnitEvent,
}

/// Replaces the payload of an existing event.
#[derive(Debug, Clone)]
pub struct SubmitCorrection {
    pub org_id: Uuid,
    pub target_event_uuid: Uuid,
    pub target_effective_date: NaiveDate,
    pub patch: serde_json::Value,
    pub request_code: String,
    pub initiator_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SubmitStatusCorrection {
    pub org_id: Uuid,
    pub target_event_uuid: Uuid,
    pub target_effective_date: NaiveDate,
    pub target_status: String,
    pub request_code: String,
    pub initiator_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SubmitRescindEvent {
    pub org_id: Uuid,
    pub target_event_uuid: Uuid,
    pub target_effective_date: NaiveDate,
    pub reason: String,
    pub request_code: String,
    pub initiator_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SubmitRescindOrg {
    pub org_id: Uuid,
    pub reason: String,
    pub request_code: String,
    pub initiator_id: Option<Uuid>,
}
