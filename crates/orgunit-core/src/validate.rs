//! Input normalization shared by every write path.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{ErrorCode, OrgUnitError, OrgUnitResult};

const MAX_ORG_CODE_LEN: usize = 64;
const MAX_PERNR_DIGITS: usize = 8;

/// Sentinel personnel number for an all-zero input.
pub const PERNR_ZERO: &str = "0";

static ORG_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]*$").expect("invalid org code pattern"));

/// Parse a `YYYY-MM-DD` effective date.
pub fn parse_effective_date(raw: &str) -> OrgUnitResult<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        OrgUnitError::bad_request(
            ErrorCode::EffectiveDateInvalid,
            format!("invalid effective date: {trimmed:?}"),
        )
    })
}

/// Trim and upper-case an org code, rejecting anything outside
/// `[A-Z0-9][A-Z0-9_-]*` or longer than 64 characters.
pub fn normalize_org_code(raw: &str) -> OrgUnitResult<String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() || code.len() > MAX_ORG_CODE_LEN || !ORG_CODE_PATTERN.is_match(&code) {
        return Err(OrgUnitError::bad_request(
            ErrorCode::OrgCodeInvalid,
            format!("invalid org code: {:?}", raw.trim()),
        ));
    }
    Ok(code)
}

/// Digits only, at most 8, leading zeros stripped; all zeros become `"0"`.
pub fn normalize_pernr(raw: &str) -> OrgUnitResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_PERNR_DIGITS
        || !trimmed.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(OrgUnitError::bad_request(
            ErrorCode::ManagerPernrInvalid,
            format!("invalid manager pernr: {trimmed:?}"),
        ));
    }
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() {
        Ok(PERNR_ZERO.to_string())
    } else {
        Ok(stripped.to_string())
    }
}

/// Request codes are opaque, but must not be blank.
pub fn require_request_code(raw: &str) -> OrgUnitResult<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(OrgUnitError::bad_request(
            ErrorCode::OrgRequestCodeRequired,
            "request code is required",
        ));
    }
    Ok(code.to_string())
}
