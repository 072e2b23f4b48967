//! Project descriptor (`.lagoon.yml`).
//!
//! The descriptor is layered before it is deserialized:
//!
//! 1. the project descriptor file
//! 2. an optional override file, deep-merged on top
//! 3. an optional base64 encoded override (`LAGOON_YAML_OVERRIDE`), merged last
//!
//! Any layer whose top level contains a key equal to the project name is a
//! polysite document and only that subtree is used.

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::domain::route::RouteDeclaration;
use crate::domain::schedule::Cronjob;
use crate::error::ConfigError;

pub const OVERRIDE_VARIABLE: &str = "LAGOON_YAML_OVERRIDE";

/// Project descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Compose manifest holding the service list
    #[serde(rename = "docker-compose-yaml", default = "default_compose_file")]
    pub docker_compose_yaml: String,

    /// Per branch/environment configuration, keyed by branch key
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentDescriptor>,

    /// Active/standby route declarations
    #[serde(default)]
    pub production_routes: Option<ProductionRoutes>,

    /// Autogenerated route settings
    #[serde(default)]
    pub routes: RoutesConfig,

    #[serde(rename = "backup-retention", default)]
    pub backup_retention: Option<BackupRetentionConfig>,

    #[serde(rename = "backup-schedule", default)]
    pub backup_schedule: Option<BackupScheduleConfig>,
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_string()
}

impl Default for ProjectDescriptor {
    fn default() -> Self {
        Self {
            docker_compose_yaml: default_compose_file(),
            environments: BTreeMap::new(),
            production_routes: None,
            routes: RoutesConfig::default(),
            backup_retention: None,
            backup_schedule: None,
        }
    }
}

/// Settings for one branch/environment key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    #[serde(default)]
    pub routes: Vec<RouteDeclaration>,

    #[serde(default)]
    pub cronjobs: Vec<Cronjob>,

    /// Service type overrides, service name to type
    #[serde(default)]
    pub types: BTreeMap<String, String>,

    #[serde(rename = "autogenerateRoutes", default)]
    pub autogenerate_routes: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionRoutes {
    #[serde(default)]
    pub active: Option<RouteBlock>,

    #[serde(default)]
    pub standby: Option<RouteBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteBlock {
    #[serde(default)]
    pub routes: Vec<RouteDeclaration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default)]
    pub autogenerate: AutogenerateConfig,
}

/// `routes.autogenerate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutogenerateConfig {
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(rename = "allowPullrequests", default)]
    pub allow_pullrequests: Option<bool>,

    /// Insecure traffic policy, `Allow` when unset
    #[serde(default)]
    pub insecure: Option<String>,

    /// Each prefix adds `<prefix>.<domain>` as an alternative name
    #[serde(default)]
    pub prefixes: Vec<String>,

    #[serde(rename = "ingressClass", default)]
    pub ingress_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupRetentionConfig {
    #[serde(default)]
    pub production: Option<RetentionValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionValues {
    pub hourly: Option<u32>,
    pub daily: Option<u32>,
    pub weekly: Option<u32>,
    pub monthly: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupScheduleConfig {
    #[serde(default)]
    pub production: Option<String>,
}

impl ProjectDescriptor {
    /// Load the descriptor at `path` and layer any overrides over it.
    pub fn load(
        path: &Path,
        override_path: Option<&Path>,
        override_base64: Option<&str>,
        project: &str,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read descriptor: {}", path.display()))?;
        let mut merged = parse_layer(&path.display().to_string(), &content, project)?;

        if let Some(override_path) = override_path.filter(|p| p.exists()) {
            debug!(path = %override_path.display(), "Merging descriptor override file");
            let content = std::fs::read_to_string(override_path).with_context(|| {
                format!("Failed to read descriptor override: {}", override_path.display())
            })?;
            let layer = parse_layer(&override_path.display().to_string(), &content, project)?;
            deep_merge(&mut merged, layer);
        }

        if let Some(encoded) = override_base64.map(str::trim).filter(|s| !s.is_empty()) {
            debug!("Merging descriptor override from {}", OVERRIDE_VARIABLE);
            let decoded = general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ConfigError::ParseError {
                    source_name: OVERRIDE_VARIABLE.to_string(),
                    message: format!("is it base64 encoded?: {}", e),
                })?;
            let content = String::from_utf8(decoded).map_err(|e| ConfigError::ParseError {
                source_name: OVERRIDE_VARIABLE.to_string(),
                message: e.to_string(),
            })?;
            let layer = parse_layer(OVERRIDE_VARIABLE, &content, project)?;
            deep_merge(&mut merged, layer);
        }

        Ok(Self::from_value(&path.display().to_string(), merged)?)
    }

    /// Parse a single descriptor document.
    pub fn from_yaml(source_name: &str, content: &str, project: &str) -> Result<Self, ConfigError> {
        Self::from_value(source_name, parse_layer(source_name, content, project)?)
    }

    fn from_value(source_name: &str, value: Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return serde_yaml::from_str("{}").map_err(|e| parse_error(source_name, e));
        }
        serde_yaml::from_value(value).map_err(|e| parse_error(source_name, e))
    }

    /// Settings for a branch key, if declared
    pub fn environment(&self, branch_key: &str) -> Option<&EnvironmentDescriptor> {
        self.environments.get(branch_key)
    }
}

fn parse_error(source_name: &str, e: serde_yaml::Error) -> ConfigError {
    ConfigError::ParseError {
        source_name: source_name.to_string(),
        message: e.to_string(),
    }
}

/// Parse one layer, selecting the project subtree of polysite documents.
fn parse_layer(source_name: &str, content: &str, project: &str) -> Result<Value, ConfigError> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| parse_error(source_name, e))?;
    if let Some(subtree) = value.get(project) {
        if subtree.is_mapping() {
            debug!(project = %project, "Using polysite section of {}", source_name);
            return Ok(subtree.clone());
        }
    }
    Ok(value)
}

/// Merge `over` into `base`. Mappings merge key by key, anything else replaces.
pub fn deep_merge(base: &mut Value, over: Value) {
    match (base, over) {
        (Value::Mapping(base_map), Value::Mapping(over_map)) => {
            for (key, over_value) in over_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, over_value),
                    None => {
                        base_map.insert(key, over_value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, over) => *base = over,
    }
}
