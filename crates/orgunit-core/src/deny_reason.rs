//! Deny-reason aggregation.
//!
//! Reasons are deduplicated and ordered by a fixed priority table, so
//! the same set of failures always reports the same primary reason.

use std::collections::BTreeSet;

use crate::error::ErrorCode;

/// Codes outside the table sort after every known reason.
const UNRANKED: u16 = u16::MAX;

fn deny_priority(code: ErrorCode) -> u16 {
    match code {
        ErrorCode::Forbidden => 0,
        ErrorCode::OrgTreeNotInitialized => 10,
        ErrorCode::OrgNotFoundAsOf => 20,
        ErrorCode::OrgRootCannotBeMoved => 30,
        ErrorCode::OrgAlreadyExists => 40,
        ErrorCode::OrgRootAlreadyExists => 50,
        ErrorCode::OrgEventNotFound => 60,
        ErrorCode::OrgEventRescinded => 70,
        ErrorCode::OrgHasChildrenCannotDelete => 80,
        ErrorCode::OrgHasDependenciesCannotDelete => 90,
        ErrorCode::OrgStatusCorrectionUnsupportedTarget => 100,
        _ => UNRANKED,
    }
}

/// Deduplicate and order deny reasons by priority, then by code string.
pub fn dedup_and_sort_deny_reasons<I>(reasons: I) -> Vec<ErrorCode>
where
    I: IntoIterator<Item = ErrorCode>,
{
    let mut out: Vec<ErrorCode> = reasons
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    out.sort_by(|a, b| {
        deny_priority(*a)
            .cmp(&deny_priority(*b))
            .then_with(|| a.as_str().cmp(b.as_str()))
    });
    out
}
