//! Auto-code rules: `next_org_code("<prefix>", <width>)`.
//!
//! A tenant field policy in CEL mode carries a rule expression. The
//! expression is compiled against a restricted environment (the only
//! declared function is `next_org_code(string, int) -> string`), the
//! compiled program is cached by exact expression text, and the rule's
//! arguments are extracted by structural matching into an
//! [`AutoCodeSpec`] the store uses to allocate the next free code.

mod allocate;
mod cache;
mod cel;

pub use allocate::{AutoCodeSpec, MAX_AUTO_CODE_WIDTH, first_free_code};
pub use cache::CelProgramCache;
pub use cel::{CelCompileError, CelEnv, CelProgram, CelType, Expr, FunctionDecl};

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ErrorCode, OrgUnitError, OrgUnitResult};
use crate::validate::normalize_org_code;

pub const NEXT_ORG_CODE_FN: &str = "next_org_code";

static NEXT_ORG_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^next_org_code\(\s*"([^"\\]*)"\s*,\s*(-?[0-9]+)\s*\)$"#)
        .expect("invalid next_org_code pattern")
});

/// Extract `(prefix, width)` from a rule expression.
///
/// Blank expressions fail with `FIELD_POLICY_EXPR_INVALID`. Any other
/// shape, an empty or non-normalized prefix, or a width outside `1..=18`
/// fails with `DEFAULT_RULE_EVAL_FAILED`.
pub fn parse_auto_code_rule(expr: &str) -> OrgUnitResult<AutoCodeSpec> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(OrgUnitError::bad_request(
            ErrorCode::FieldPolicyExprInvalid,
            "default rule expression is blank",
        ));
    }
    let caps = NEXT_ORG_CODE_PATTERN
        .captures(expr)
        .ok_or_else(|| rule_eval_failed(format!("unsupported default rule: {expr}")))?;
    let prefix = caps.get(1).map_or("", |m| m.as_str());
    if prefix.trim().is_empty() {
        return Err(rule_eval_failed("next_org_code prefix must not be empty"));
    }
    let width: i64 = caps
        .get(2)
        .map_or("", |m| m.as_str())
        .parse()
        .map_err(|_| rule_eval_failed("next_org_code width is not an integer"))?;
    if width < 1 || width > i64::from(MAX_AUTO_CODE_WIDTH) {
        return Err(rule_eval_failed(format!(
            "next_org_code width out of range: {width}"
        )));
    }
    let spec = AutoCodeSpec {
        prefix: prefix.to_string(),
        width: width as u32,
    };
    // Generated codes must already be in normalized org-code form.
    let sample = spec.format(0);
    if normalize_org_code(&sample).ok().as_deref() != Some(sample.as_str()) {
        return Err(rule_eval_failed(format!(
            "next_org_code prefix does not form a valid org code: {prefix:?}"
        )));
    }
    Ok(spec)
}

/// Compile (through the cache) and then parse a rule expression.
pub fn compile_auto_code_rule(cache: &CelProgramCache, expr: &str) -> OrgUnitResult<AutoCodeSpec> {
    if expr.trim().is_empty() {
        return Err(OrgUnitError::bad_request(
            ErrorCode::FieldPolicyExprInvalid,
            "default rule expression is blank",
        ));
    }
    cache.get_or_compile(expr)?;
    parse_auto_code_rule(expr)
}

pub(crate) fn rule_eval_failed(message: impl Into<String>) -> OrgUnitError {
    OrgUnitError::bad_request(ErrorCode::DefaultRuleEvalFailed, message)
}
