//! First-gap allocation over a prefixed, zero-padded code sequence.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, OrgUnitError, OrgUnitResult};

/// Widest sequence whose upper bound `10^width` still fits in `u64`.
pub const MAX_AUTO_CODE_WIDTH: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutoCodeSpec {
    pub prefix: String,
    pub width: u32,
}

impl AutoCodeSpec {
    /// Exclusive upper bound of the sequence.
    pub fn capacity(&self) -> u64 {
        10u64.checked_pow(self.width).unwrap_or(u64::MAX)
    }

    pub fn format(&self, n: u64) -> String {
        format!("{}{:0width$}", self.prefix, n, width = self.width as usize)
    }

    /// Numeric suffix of `code`, or `None` when the code is not exactly
    /// `prefix` followed by `width` digits.
    pub fn parse_suffix(&self, code: &str) -> Option<u64> {
        let digits = code.strip_prefix(&self.prefix)?;
        if digits.len() != self.width as usize || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Pick the smallest integer in `[1, 10^width)` not used by `existing`.
///
/// Codes that are not `prefix` followed by `width` digits are skipped.
pub fn first_free_code<I, S>(spec: &AutoCodeSpec, existing: I) -> OrgUnitResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let used: BTreeSet<u64> = existing
        .into_iter()
        .filter_map(|code| spec.parse_suffix(code.as_ref()))
        .collect();

    let mut candidate = 1u64;
    for n in used.range(1..) {
        if *n != candidate {
            break;
        }
        candidate += 1;
    }
    if candidate >= spec.capacity() {
        return Err(OrgUnitError::conflict(
            ErrorCode::OrgCodeExhausted,
            format!(
                "no free code for prefix {:?} with width {}",
                spec.prefix, spec.width
            ),
        ));
    }
    Ok(spec.format(candidate))
}
