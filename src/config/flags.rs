//! Feature flag resolution.
//!
//! A flag is resolved from three tiers, first hit wins:
//!
//! 1. a forced override (`LAGOON_FEATURE_FLAG_FORCE_<KEY>`), the operator escape hatch
//! 2. the first effective variable whose name *contains* `LAGOON_FEATURE_FLAG_<KEY>`
//! 3. a default override (`LAGOON_FEATURE_FLAG_DEFAULT_<KEY>`)
//!
//! Tier 2 is a substring match, not an exact match. Variables such as
//! `LAGOON_FEATURE_FLAG_INGRESS_CLASS_V2` therefore also answer `INGRESS_CLASS`.
//! Existing environments depend on this, so it stays.
//!
//! The override tables are captured once into [`FeatureFlags`] and passed
//! explicitly; resolution never touches the process environment.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::variables::VariableSet;

pub const FLAG_PREFIX: &str = "LAGOON_FEATURE_FLAG_";
pub const FORCE_PREFIX: &str = "LAGOON_FEATURE_FLAG_FORCE_";
pub const DEFAULT_PREFIX: &str = "LAGOON_FEATURE_FLAG_DEFAULT_";
pub const ADMIN_PREFIX: &str = "ADMIN_LAGOON_FEATURE_FLAG_";

/// Which tier produced a flag value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSource {
    Forced,
    Variable,
    Default,
    Unset,
}

/// Resolved value of one flag key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagResult {
    pub key: String,
    pub value: String,
    pub source: FlagSource,
}

impl FlagResult {
    fn new(key: &str, value: &str, source: FlagSource) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            source,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.value == "enabled"
    }
}

/// Process-level override tables, keyed without their prefix
#[derive(Debug, Clone, Default)]
pub struct FeatureFlags {
    forced: HashMap<String, String>,
    defaults: HashMap<String, String>,
    admin: HashMap<String, String>,
    raw: HashMap<String, String>,
}

impl FeatureFlags {
    /// Capture override tables from the process environment.
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Build override tables from `NAME=value` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut flags = Self::default();
        for (name, value) in pairs {
            let name = name.into();
            let value = value.into();
            if let Some(key) = name.strip_prefix(FORCE_PREFIX) {
                flags.forced.insert(key.to_string(), value.clone());
            } else if let Some(key) = name.strip_prefix(DEFAULT_PREFIX) {
                flags.defaults.insert(key.to_string(), value.clone());
            } else if let Some(key) = name.strip_prefix(ADMIN_PREFIX) {
                flags.admin.insert(key.to_string(), value.clone());
            }
            if name.starts_with(FLAG_PREFIX) {
                flags.raw.insert(name, value);
            }
        }
        flags
    }

    pub fn with_forced(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.forced.insert(key.into(), value.into());
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn with_admin(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.admin.insert(key.into(), value.into());
        self
    }

    /// Resolve `key` against the override tables and `variables`.
    pub fn resolve(&self, key: &str, variables: &VariableSet) -> FlagResult {
        if let Some(value) = self.forced.get(key) {
            debug!(flag = %key, "Using forced flag value from {}{}", FORCE_PREFIX, key);
            return FlagResult::new(key, value, FlagSource::Forced);
        }

        let needle = format!("{}{}", FLAG_PREFIX, key);
        if let Some(var) = variables
            .effective()
            .into_iter()
            .find(|v| v.name.contains(&needle))
        {
            debug!(flag = %key, variable = %var.name, "Using flag value from environment variable");
            return FlagResult::new(key, &var.value, FlagSource::Variable);
        }

        if let Some(value) = self.defaults.get(key) {
            debug!(flag = %key, "Using default flag value from {}{}", DEFAULT_PREFIX, key);
            return FlagResult::new(key, value, FlagSource::Default);
        }

        FlagResult::new(key, "", FlagSource::Unset)
    }

    /// Shorthand for the resolved value, empty when unset.
    pub fn value(&self, key: &str, variables: &VariableSet) -> String {
        self.resolve(key, variables).value
    }

    /// Admin-only flag, empty when unset.
    pub fn admin(&self, key: &str) -> String {
        match self.admin.get(key) {
            Some(value) => {
                debug!(flag = %key, "Using admin feature flag value from {}{}", ADMIN_PREFIX, key);
                value.clone()
            }
            None => String::new(),
        }
    }

    /// Numeric knob captured from the environment, `default` when absent or unparsable.
    pub fn env_int(&self, name: &str, default: i64) -> i64 {
        self.raw
            .get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}
