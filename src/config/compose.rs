//! Compose manifest reader
//!
//! Turns the `services:` section of a compose file into [`ServiceDescriptor`]s.
//! Only `lagoon.*` labels are interpreted; images, build contexts and
//! everything else in the manifest belong to other build stages.

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use super::descriptor::ProjectDescriptor;
use super::variables::{parse_pair_list, VariableSet};
use crate::domain::resources::validate_quantity;
use crate::domain::service::{service_type_defaults, ServiceDescriptor, DEFAULT_PERSISTENT_SIZE};
use crate::error::{ConfigError, ResolveError, ServiceError};

pub const LABEL_TYPE: &str = "lagoon.type";
pub const LABEL_NAME: &str = "lagoon.name";
pub const LABEL_AUTOGENERATED_ROUTE: &str = "lagoon.autogeneratedroute";
pub const LABEL_AUTOGENERATED_ROUTE_TLS_ACME: &str = "lagoon.autogeneratedroute.tls-acme";
pub const LABEL_PERSISTENT: &str = "lagoon.persistent";
pub const LABEL_PERSISTENT_NAME: &str = "lagoon.persistent.name";
pub const LABEL_PERSISTENT_SIZE: &str = "lagoon.persistent.size";

/// Per-service type overrides, `service:type,...`
pub const SERVICE_TYPES_VARIABLE: &str = "LAGOON_SERVICE_TYPES";
/// Per-service DBaaS environment overrides, `service:environment-type,...`
pub const DBAAS_ENVIRONMENT_TYPES_VARIABLE: &str = "LAGOON_DBAAS_ENVIRONMENT_TYPES";

/// Services of this type are not deployed
const SKIP_TYPE: &str = "none";

/// Inputs that shape how compose services are interpreted
#[derive(Debug, Clone)]
pub struct ComposeContext<'a> {
    pub descriptor: &'a ProjectDescriptor,
    pub branch_key: &'a str,
    pub pull_request: bool,
    pub environment_type: &'a str,
    /// `LAGOON_SERVICE_TYPES`, service name to type
    pub service_type_overrides: HashMap<String, String>,
    /// `LAGOON_DBAAS_ENVIRONMENT_TYPES`, service name to environment type
    pub dbaas_environment_overrides: HashMap<String, String>,
}

impl<'a> ComposeContext<'a> {
    /// Context for a build, with the override variables taken from `variables`.
    pub fn new(
        descriptor: &'a ProjectDescriptor,
        branch_key: &'a str,
        pull_request: bool,
        environment_type: &'a str,
        variables: &VariableSet,
    ) -> Self {
        let overrides = |name: &str| {
            variables
                .value(name, None)
                .map(parse_pair_list)
                .unwrap_or_default()
        };
        Self {
            descriptor,
            branch_key,
            pull_request,
            environment_type,
            service_type_overrides: overrides(SERVICE_TYPES_VARIABLE),
            dbaas_environment_overrides: overrides(DBAAS_ENVIRONMENT_TYPES_VARIABLE),
        }
    }

    /// Read the compose file at `path`.
    pub fn load(&self, path: &Path) -> Result<Vec<ServiceDescriptor>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read compose manifest: {}", path.display()))?;
        let services = self
            .read(&path.display().to_string(), &content)
            .with_context(|| format!("Failed to read services from {}", path.display()))?;
        Ok(services)
    }

    /// Read services from compose YAML, in file order.
    pub fn read(&self, source_name: &str, content: &str) -> Result<Vec<ServiceDescriptor>, ResolveError> {
        let manifest: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

        let services = manifest
            .get("services")
            .and_then(Value::as_mapping)
            .filter(|services| !services.is_empty())
            .ok_or(ServiceError::NoServices)?;

        let mut descriptors = Vec::with_capacity(services.len());
        for (name, definition) in services {
            let Some(name) = name.as_str() else {
                continue;
            };
            if let Some(service) = self.describe(name, &labels(definition))? {
                descriptors.push(service);
            }
        }
        Ok(descriptors)
    }

    fn describe(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Option<ServiceDescriptor>, ServiceError> {
        let mut service_type = labels
            .get(LABEL_TYPE)
            .cloned()
            .ok_or_else(|| ServiceError::MissingType {
                service: name.to_string(),
            })?;

        if let Some(overridden) = self
            .descriptor
            .environment(self.branch_key)
            .and_then(|env| env.types.get(name))
        {
            debug!(service = %name, service_type = %overridden, "Service type overridden by descriptor");
            service_type = overridden.clone();
        }
        if let Some(overridden) = self.service_type_overrides.get(name) {
            debug!(service = %name, service_type = %overridden, "Service type overridden by LAGOON_SERVICE_TYPES");
            service_type = overridden.clone();
        }

        if service_type == SKIP_TYPE {
            debug!(service = %name, "Skipping service with type none");
            return Ok(None);
        }
        if service_type_defaults(&service_type).is_none() {
            return Err(ServiceError::InvalidLabel {
                service: name.to_string(),
                label: LABEL_TYPE.to_string(),
                value: service_type,
            });
        }

        let override_name = labels.get(LABEL_NAME).map(String::as_str).unwrap_or(name);
        let mut service = ServiceDescriptor::new(name, service_type).with_override_name(override_name);

        let mut autogenerate = self.autogenerate_enabled();
        if let Some(value) = labels.get(LABEL_AUTOGENERATED_ROUTE) {
            autogenerate = label_bool(name, LABEL_AUTOGENERATED_ROUTE, value)?;
        }
        service.autogenerated_routes_enabled &= autogenerate;

        if let Some(value) = labels.get(LABEL_AUTOGENERATED_ROUTE_TLS_ACME) {
            service.autogenerated_routes_tls_acme =
                label_bool(name, LABEL_AUTOGENERATED_ROUTE_TLS_ACME, value)?;
        }

        if let Some(path) = labels.get(LABEL_PERSISTENT) {
            service.persistent_volume_path = Some(path.clone());
            service.persistent_volume_name.get_or_insert_with(|| name.to_string());
            service
                .persistent_volume_size
                .get_or_insert_with(|| DEFAULT_PERSISTENT_SIZE.to_string());
        }
        if service.persistent_volume_path.is_some() {
            if let Some(volume) = labels.get(LABEL_PERSISTENT_NAME) {
                service.persistent_volume_name = Some(volume.clone());
            }
            if let Some(size) = labels.get(LABEL_PERSISTENT_SIZE) {
                validate_quantity(LABEL_PERSISTENT_SIZE, size).map_err(|_| ServiceError::InvalidLabel {
                    service: name.to_string(),
                    label: LABEL_PERSISTENT_SIZE.to_string(),
                    value: size.clone(),
                })?;
                service.persistent_volume_size = Some(size.clone());
            }
        }

        service.dbaas_environment = self
            .dbaas_environment_overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.environment_type.to_string());

        Ok(Some(service))
    }

    /// Descriptor-level switch for autogenerated routes
    fn autogenerate_enabled(&self) -> bool {
        let autogenerate = &self.descriptor.routes.autogenerate;
        let mut enabled = autogenerate.enabled.unwrap_or(true);
        if self.pull_request {
            if let Some(allowed) = autogenerate.allow_pullrequests {
                enabled = allowed;
            }
        }
        if let Some(env_enabled) = self
            .descriptor
            .environment(self.branch_key)
            .and_then(|env| env.autogenerate_routes)
        {
            enabled = env_enabled;
        }
        enabled
    }
}

/// Labels as a flat map. Compose allows both a mapping and a `KEY=value` list.
fn labels(definition: &Value) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    match definition.get("labels") {
        Some(Value::Mapping(map)) => {
            for (key, value) in map {
                if let (Some(key), Some(value)) = (key.as_str(), scalar(value)) {
                    labels.insert(key.to_string(), value);
                }
            }
        }
        Some(Value::Sequence(items)) => {
            for item in items {
                if let Some((key, value)) = item.as_str().and_then(|s| s.split_once('=')) {
                    labels.insert(key.to_string(), value.to_string());
                }
            }
        }
        _ => {}
    }
    labels
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn label_bool(service: &str, label: &str, value: &str) -> Result<bool, ServiceError> {
    match value.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ServiceError::InvalidLabel {
            service: service.to_string(),
            label: label.to_string(),
            value: value.to_string(),
        }),
    }
}
