//! Write-service configuration.

/// Scope key used to look up FORM field policies when a request does
/// not name one.
pub const DEFAULT_POLICY_SCOPE_KEY: &str = "orgunit_create_dialog";

/// Configuration for the write services.
#[derive(Debug, Clone)]
pub struct WriteConfig {
    /// FORM scope consulted for create-time field policies.
    pub default_policy_scope_key: String,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            default_policy_scope_key: DEFAULT_POLICY_SCOPE_KEY.into(),
        }
    }
}

impl WriteConfig {
    /// Defaults overridden by `ORGUNIT_DEFAULT_POLICY_SCOPE_KEY` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_policy_scope_key = lookup("ORGUNIT_DEFAULT_POLICY_SCOPE_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_POLICY_SCOPE_KEY.into());
        Self {
            default_policy_scope_key,
        }
    }
}
