//! Service domain types
//!
//! Defines the abstract workload descriptors produced from the compose
//! manifest and the linking of services that share one routing identity.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use super::schedule::Cronjob;

/// Volume size used when a persistent service does not set one
pub const DEFAULT_PERSISTENT_SIZE: &str = "5Gi";

/// Static defaults for a service type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceTypeDefaults {
    pub name: &'static str,
    pub port: Option<u16>,
    pub persistent_path: Option<&'static str>,
    pub persistent_size: Option<&'static str>,
    pub supports_autogenerated_routes: bool,
}

const fn service_type(
    name: &'static str,
    port: Option<u16>,
    persistent_path: Option<&'static str>,
    supports_autogenerated_routes: bool,
) -> ServiceTypeDefaults {
    ServiceTypeDefaults {
        name,
        port,
        persistent_path,
        persistent_size: match persistent_path {
            Some(_) => Some(DEFAULT_PERSISTENT_SIZE),
            None => None,
        },
        supports_autogenerated_routes,
    }
}

const SERVICE_TYPES: &[ServiceTypeDefaults] = &[
    service_type("basic", Some(3000), None, true),
    service_type("basic-persistent", Some(3000), Some("/app/files"), true),
    service_type("cli", None, None, false),
    service_type("cli-persistent", None, Some("/app/docroot/sites/default/files"), false),
    service_type("elasticsearch", Some(9200), Some("/usr/share/elasticsearch/data"), false),
    service_type("mariadb", Some(3306), None, false),
    service_type("mariadb-dbaas", None, None, false),
    service_type("mariadb-single", Some(3306), Some("/var/lib/mysql"), false),
    service_type("mongodb", Some(27017), None, false),
    service_type("mongodb-dbaas", None, None, false),
    service_type("mongodb-single", Some(27017), Some("/data/db"), false),
    service_type("nginx", Some(8080), None, true),
    service_type("nginx-php", Some(8080), None, true),
    service_type("nginx-php-persistent", Some(8080), Some("/app/docroot/sites/default/files"), true),
    service_type("node", Some(3000), None, true),
    service_type("node-persistent", Some(3000), Some("/app/files"), true),
    service_type("opensearch", Some(9200), Some("/usr/share/opensearch/data"), false),
    service_type("postgres", Some(5432), None, false),
    service_type("postgres-dbaas", None, None, false),
    service_type("postgres-single", Some(5432), Some("/var/lib/postgresql/data"), false),
    service_type("python", Some(8800), None, true),
    service_type("python-persistent", Some(8800), Some("/app/files"), true),
    service_type("rabbitmq", Some(5672), Some("/var/lib/rabbitmq"), false),
    service_type("redis", Some(6379), None, false),
    service_type("redis-persistent", Some(6379), Some("/data"), false),
    service_type("solr", Some(8983), None, false),
    service_type("solr-php-persistent", Some(8983), Some("/var/solr"), false),
    service_type("varnish", Some(8080), None, true),
    service_type("varnish-persistent", Some(8080), Some("/var/cache/varnish"), true),
    service_type("worker", None, None, false),
    service_type("worker-persistent", None, Some("/app/docroot/sites/default/files"), false),
];

/// Look up defaults for a service type name
pub fn service_type_defaults(name: &str) -> Option<&'static ServiceTypeDefaults> {
    SERVICE_TYPES.iter().find(|t| t.name == name)
}

/// One abstract workload unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    /// Compose service name
    pub name: String,
    /// Routing identity, groups services that must be linked
    pub override_name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub autogenerated_routes_enabled: bool,
    #[serde(rename = "autogeneratedRoutesTLSAcme")]
    pub autogenerated_routes_tls_acme: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub autogenerated_route_domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short_autogenerated_route_domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dbaas_environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_size: Option<String>,
    #[serde(default)]
    pub native_cronjobs: Vec<Cronjob>,
    #[serde(default)]
    pub in_pod_cronjobs: Vec<Cronjob>,
    #[serde(default)]
    pub linked_service: Option<Box<ServiceDescriptor>>,
}

impl ServiceDescriptor {
    /// Descriptor with type defaults applied
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        let name = name.into();
        let service_type = service_type.into();
        let defaults = service_type_defaults(&service_type);
        Self {
            override_name: name.clone(),
            autogenerated_routes_enabled: defaults
                .map(|d| d.supports_autogenerated_routes)
                .unwrap_or(false),
            autogenerated_routes_tls_acme: true,
            service_port: defaults.and_then(|d| d.port),
            persistent_volume_path: defaults
                .and_then(|d| d.persistent_path)
                .map(str::to_string),
            persistent_volume_name: defaults
                .and_then(|d| d.persistent_path)
                .map(|_| name.clone()),
            persistent_volume_size: defaults
                .and_then(|d| d.persistent_size)
                .map(str::to_string),
            name,
            service_type,
            ..Default::default()
        }
    }

    /// Builder: set the routing identity
    pub fn with_override_name(mut self, override_name: impl Into<String>) -> Self {
        self.override_name = override_name.into();
        self
    }

    /// Builder: enable/disable autogenerated routes
    pub fn with_autogenerated_routes(mut self, enabled: bool) -> Self {
        self.autogenerated_routes_enabled = enabled;
        self
    }

    /// Routing identity, the compose name when no override is set
    pub fn routing_identity(&self) -> &str {
        if self.override_name.is_empty() {
            &self.name
        } else {
            &self.override_name
        }
    }
}

/// Pair services that share a routing identity.
///
/// Standalone services keep their relative order. Each group of two or more
/// services collapses into its anchor (the member named like the routing
/// identity, else the first member) carrying the partner in
/// `linked_service`. Anchors follow all standalone services, in the order
/// their groups were first seen.
pub fn link(services: Vec<ServiceDescriptor>) -> Vec<ServiceDescriptor> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for service in &services {
        *counts.entry(service.routing_identity().to_string()).or_default() += 1;
    }

    let mut standalone = Vec::new();
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ServiceDescriptor>> = HashMap::new();

    for service in services {
        let identity = service.routing_identity().to_string();
        if counts[&identity] > 1 {
            if !groups.contains_key(&identity) {
                group_order.push(identity.clone());
            }
            groups.entry(identity).or_default().push(service);
        } else {
            standalone.push(service);
        }
    }

    for identity in group_order {
        let Some(mut members) = groups.remove(&identity) else {
            continue;
        };
        let anchor_idx = members
            .iter()
            .position(|s| s.name == identity)
            .unwrap_or(0);
        let mut anchor = members.remove(anchor_idx);
        let mut rest = members.into_iter();
        if let Some(partner) = rest.next() {
            anchor.linked_service = Some(Box::new(partner));
        }
        for surplus in rest {
            warn!(
                service = %surplus.name,
                anchor = %anchor.name,
                "Service shares a routing identity that is already linked, dropping it"
            );
        }
        standalone.push(anchor);
    }

    standalone
}
