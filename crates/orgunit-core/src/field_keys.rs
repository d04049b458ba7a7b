//! Field key constants and extension-field key normalization.

use std::collections::BTreeSet;

pub const FIELD_ORG_CODE: &str = "org_code";
pub const FIELD_EFFECTIVE_DATE: &str = "effective_date";
pub const FIELD_NAME: &str = "name";
pub const FIELD_PARENT_ORG_CODE: &str = "parent_org_code";
pub const FIELD_IS_BUSINESS_UNIT: &str = "is_business_unit";
pub const FIELD_MANAGER_PERNR: &str = "manager_pernr";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_TARGET_STATUS: &str = "target_status";
pub const FIELD_REASON: &str = "reason";
pub const FIELD_EXT: &str = "ext";
pub const FIELD_EXT_LABELS_SNAPSHOT: &str = "ext_labels_snapshot";

/// Keys that can never be used as extension field keys.
pub const RESERVED_FIELD_KEYS: [&str; 8] = [
    FIELD_ORG_CODE,
    FIELD_EFFECTIVE_DATE,
    FIELD_NAME,
    FIELD_PARENT_ORG_CODE,
    FIELD_IS_BUSINESS_UNIT,
    FIELD_MANAGER_PERNR,
    FIELD_EXT,
    FIELD_EXT_LABELS_SNAPSHOT,
];

pub fn is_reserved_field_key(key: &str) -> bool {
    RESERVED_FIELD_KEYS.contains(&key)
}

/// Trim, drop blanks and reserved keys, dedupe, sort.
///
/// Case-sensitive. Idempotent.
pub fn normalize_ext_field_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty() && !is_reserved_field_key(k))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Merge a core field set with normalized extension keys, sorted.
pub fn merge_field_keys(core: &[&str], ext: &[String]) -> Vec<String> {
    core.iter()
        .map(|k| (*k).to_string())
        .chain(normalize_ext_field_keys(ext))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Payload key for an extension field.
pub fn ext_payload_key(field_key: &str) -> String {
    format!("{FIELD_EXT}.{field_key}")
}
