//! Project and environment variables.
//!
//! Variables arrive as two independently supplied JSON lists. They are merged
//! into one ordered [`VariableSet`] where insertion order is precedence order:
//! environment entries come after project entries, so a lookup that finds
//! the same name twice returns the environment value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::VariableError;

/// Build-time scope
pub const SCOPE_BUILD: &str = "build";
/// Runtime scope, injected into the environment configmap
pub const SCOPE_RUNTIME: &str = "runtime";
/// Both build and runtime
pub const SCOPE_GLOBAL: &str = "global";
/// Injected by the platform, never user supplied
pub const SCOPE_INTERNAL_SYSTEM: &str = "internal_system";
/// Container registry credentials
pub const SCOPE_CONTAINER_REGISTRY: &str = "container_registry";

/// One named configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    pub scope: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            scope: scope.into(),
        }
    }

    fn in_scope(&self, scopes: Option<&[&str]>) -> bool {
        scopes.map_or(true, |allowed| allowed.contains(&self.scope.as_str()))
    }
}

/// Ordered list of variables, later entries win
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSet(Vec<Variable>);

impl VariableSet {
    pub fn new(variables: Vec<Variable>) -> Self {
        Self(variables)
    }

    /// Parse a JSON variable list. Empty input is an empty set.
    pub fn from_json(source_name: &str, raw: &str) -> Result<Self, VariableError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str::<Vec<Variable>>(raw)
            .map(Self)
            .map_err(|e| VariableError::Malformed {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })
    }

    /// Append `environment` after `project`.
    pub fn merge(project: &VariableSet, environment: &VariableSet) -> VariableSet {
        let mut merged = project.0.clone();
        merged.extend(environment.0.iter().cloned());
        VariableSet(merged)
    }

    /// Return a new set with `other` appended.
    pub fn with(&self, other: impl IntoIterator<Item = Variable>) -> VariableSet {
        let mut merged = self.0.clone();
        merged.extend(other);
        VariableSet(merged)
    }

    /// Find the winning entry for `name`, optionally restricted to `scopes`.
    pub fn get(&self, name: &str, scopes: Option<&[&str]>) -> Option<&Variable> {
        self.0
            .iter()
            .rev()
            .find(|v| v.name == name && v.in_scope(scopes))
    }

    pub fn value(&self, name: &str, scopes: Option<&[&str]>) -> Option<&str> {
        self.get(name, scopes).map(|v| v.value.as_str())
    }

    /// One entry per name, positioned at its first occurrence and carrying
    /// the value of its last occurrence.
    pub fn effective(&self) -> Vec<&Variable> {
        let mut last: HashMap<&str, usize> = HashMap::new();
        for (idx, var) in self.0.iter().enumerate() {
            last.insert(var.name.as_str(), idx);
        }
        let mut seen = std::collections::HashSet::new();
        self.0
            .iter()
            .filter(|v| seen.insert(v.name.as_str()))
            .map(|v| &self.0[last[v.name.as_str()]])
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse a `key:value,key:value` override variable into a map.
///
/// Entries without a `:` are ignored.
pub fn parse_pair_list(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
