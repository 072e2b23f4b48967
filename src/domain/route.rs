//! Ingress routes
//!
//! A [`Route`] is one ingress rule keyed by its domain. Routes come from three
//! places: the platform (autogenerated), the project descriptor (declared
//! per environment, or for active/standby), and the API (`LAGOON_ROUTES_JSON`).
//! The serde shape of [`RouteSet`] is the API JSON document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::fastly::FastlyConfig;
use crate::config::variables::VariableSet;
use crate::error::RouteError;

pub const INSECURE_ALLOW: &str = "Allow";
pub const INSECURE_REDIRECT: &str = "Redirect";
const DEFAULT_MONITORING_PATH: &str = "/";

/// One ingress rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub domain: String,

    /// Routing identity the ingress points at
    #[serde(rename = "service", default)]
    pub lagoon_service: String,

    /// Compose service backing the route (autogenerated routes only)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compose_service: String,

    #[serde(rename = "tls-acme", default, skip_serializing_if = "Option::is_none")]
    pub tls_acme: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsts_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsts_max_age: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsts_include_subdomains: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsts_preload: Option<bool>,

    #[serde(rename = "monitoring-path", default, skip_serializing_if = "String::is_empty")]
    pub monitoring_path: String,

    #[serde(default, skip_serializing_if = "FastlyConfig::is_empty")]
    pub fastly: FastlyConfig,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub alternative_names: Vec<String>,

    #[serde(default)]
    pub ingress_name: String,

    #[serde(default)]
    pub ingress_class: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<bool>,

    #[serde(skip)]
    pub autogenerated: bool,
}

impl Route {
    pub fn is_wildcard(&self) -> bool {
        self.wildcard.unwrap_or(false)
    }
}

/// Ordered list of routes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSet {
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl RouteSet {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.domain.as_str())
    }

    /// Merge `api` over `self`.
    ///
    /// An API route replaces the route with the same domain in place, API
    /// routes with no counterpart are appended in API order, and routes only
    /// present in `self` are kept as they are. Each domain appears once; when
    /// the API repeats a domain its last entry wins.
    pub fn merge(&self, api: &RouteSet) -> RouteSet {
        let latest = |domain: &str| api.routes.iter().rev().find(|a| a.domain == domain);

        let mut merged: Vec<Route> = self
            .routes
            .iter()
            .map(|route| latest(&route.domain).unwrap_or(route).clone())
            .collect();

        for api_route in &api.routes {
            if !merged.iter().any(|r| r.domain == api_route.domain) {
                merged.push(latest(&api_route.domain).unwrap_or(api_route).clone());
            }
        }

        RouteSet::new(merged)
    }
}

/// Per-route options accepted in the descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOptions {
    #[serde(rename = "tls-acme", default)]
    pub tls_acme: Option<bool>,

    #[serde(default)]
    pub migrate: Option<bool>,

    #[serde(default)]
    pub insecure: Option<String>,

    #[serde(rename = "hstsEnabled", alias = "hsts", default)]
    pub hsts_enabled: Option<bool>,

    #[serde(rename = "hstsMaxAge", default)]
    pub hsts_max_age: Option<i64>,

    #[serde(rename = "hstsIncludeSubdomains", default)]
    pub hsts_include_subdomains: Option<bool>,

    #[serde(rename = "hstsPreload", default)]
    pub hsts_preload: Option<bool>,

    #[serde(rename = "monitoring-path", default)]
    pub monitoring_path: Option<String>,

    #[serde(default)]
    pub fastly: FastlyConfig,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(rename = "alternativenames", alias = "alternativeNames", default)]
    pub alternative_names: Vec<String>,

    #[serde(rename = "ingressName", default)]
    pub ingress_name: Option<String>,

    #[serde(rename = "ingressClass", default)]
    pub ingress_class: Option<String>,

    #[serde(default)]
    pub wildcard: Option<bool>,
}

/// One domain under a service in the descriptor: either a bare domain or
/// a single-key map of domain to options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteEntry {
    Domain(String),
    Detailed(IndexMap<String, RouteOptions>),
}

/// A descriptor route block: routing identity to its domains, in the order
/// they are written
pub type RouteDeclaration = IndexMap<String, Vec<RouteEntry>>;

/// Environment-wide inputs used to fill route defaults
#[derive(Debug, Clone, Copy)]
pub struct RouteDefaults<'a> {
    pub ingress_class: &'a str,
    pub fastly_no_cache_service_id: &'a str,
    pub fastly_secret_prefix: &'a str,
    pub variables: &'a VariableSet,
    /// Active/standby routes migrate between environments by default
    pub active_standby: bool,
}

impl RouteDefaults<'_> {
    /// Fill unset fields on `route` and resolve its Fastly configuration.
    pub fn apply(&self, mut route: Route) -> Result<Route, RouteError> {
        if route.tls_acme.is_none() {
            route.tls_acme = Some(!route.is_wildcard());
        }
        if route.is_wildcard() && route.tls_acme == Some(true) {
            return Err(RouteError::WildcardTlsAcme {
                domain: route.domain,
            });
        }
        if route.migrate.is_none() {
            route.migrate = Some(self.active_standby);
        }
        if route.insecure.is_none() {
            route.insecure = Some(INSECURE_REDIRECT.to_string());
        }
        if route.hsts_enabled.is_none() {
            route.hsts_enabled = Some(false);
        }
        if route.monitoring_path.is_empty() {
            route.monitoring_path = DEFAULT_MONITORING_PATH.to_string();
        }
        if route.ingress_name.is_empty() {
            route.ingress_name = if route.is_wildcard() {
                format!("wildcard-{}", route.domain)
            } else {
                route.domain.clone()
            };
        }
        if route.ingress_class.is_empty() {
            route.ingress_class = self.ingress_class.to_string();
        }
        route.fastly = route.fastly.resolve(
            self.fastly_no_cache_service_id,
            &route.domain,
            self.fastly_secret_prefix,
            self.variables,
        )?;
        Ok(route)
    }

    /// Expand descriptor route blocks into routes, in declaration order.
    pub fn expand(&self, declarations: &[RouteDeclaration]) -> Result<RouteSet, RouteError> {
        let mut routes = Vec::new();
        for block in declarations {
            for (service, entries) in block {
                for entry in entries {
                    match entry {
                        RouteEntry::Domain(domain) => {
                            routes.push(self.apply(Route {
                                domain: domain.clone(),
                                lagoon_service: service.clone(),
                                ..Default::default()
                            })?);
                        }
                        RouteEntry::Detailed(map) => {
                            for (domain, options) in map {
                                routes.push(self.apply(from_options(service, domain, options))?);
                            }
                        }
                    }
                }
            }
        }
        Ok(RouteSet::new(routes))
    }
}

fn from_options(service: &str, domain: &str, options: &RouteOptions) -> Route {
    Route {
        domain: domain.to_string(),
        lagoon_service: service.to_string(),
        tls_acme: options.tls_acme,
        migrate: options.migrate,
        insecure: options.insecure.clone(),
        hsts_enabled: options.hsts_enabled,
        hsts_max_age: options.hsts_max_age,
        hsts_include_subdomains: options.hsts_include_subdomains,
        hsts_preload: options.hsts_preload,
        monitoring_path: options.monitoring_path.clone().unwrap_or_default(),
        fastly: options.fastly.clone(),
        annotations: options.annotations.clone(),
        alternative_names: options.alternative_names.clone(),
        ingress_name: options.ingress_name.clone().unwrap_or_default(),
        ingress_class: options.ingress_class.clone().unwrap_or_default(),
        wildcard: options.wildcard,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(domain: &str, service: &str) -> Route {
        Route {
            domain: domain.to_string(),
            lagoon_service: service.to_string(),
            ..Default::default()
        }
    }

    fn defaults(variables: &VariableSet) -> RouteDefaults<'_> {
        RouteDefaults {
            ingress_class: "nginx",
            fastly_no_cache_service_id: "",
            fastly_secret_prefix: "fastly-api-",
            variables,
            active_standby: false,
        }
    }

    #[test]
    fn test_merge_replaces_and_appends() {
        let yaml = RouteSet::new(vec![route("a.com", "nginx"), route("b.com", "nginx")]);
        let api = RouteSet::new(vec![route("c.com", "varnish"), route("a.com", "varnish")]);

        let merged = yaml.merge(&api);
        let domains: Vec<&str> = merged.domains().collect();
        assert_eq!(domains, vec!["a.com", "b.com", "c.com"]);
        assert_eq!(merged.routes[0].lagoon_service, "varnish");
        assert_eq!(merged.routes[1].lagoon_service, "nginx");
    }

    #[test]
    fn test_merge_with_itself_is_idempotent() {
        let set = RouteSet::new(vec![route("a.com", "nginx"), route("b.com", "node")]);
        let merged = set.merge(&set);
        assert_eq!(merged, set);
    }

    #[test]
    fn test_merge_into_empty_yaml() {
        let api = RouteSet::new(vec![route("a.com", "nginx"), route("a.com", "node")]);
        let merged = RouteSet::default().merge(&api);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.routes[0].lagoon_service, "node");
    }

    #[test]
    fn test_merge_repeated_api_domain_last_wins() {
        let api = RouteSet::new(vec![
            route("a.com", "first"),
            route("b.com", "first"),
            route("a.com", "second"),
            route("b.com", "second"),
        ]);

        let with_yaml = RouteSet::new(vec![route("a.com", "nginx")]).merge(&api);
        let domains: Vec<&str> = with_yaml.domains().collect();
        assert_eq!(domains, vec!["a.com", "b.com"]);
        assert_eq!(with_yaml.routes[0].lagoon_service, "second");
        assert_eq!(with_yaml.routes[1].lagoon_service, "second");
    }

    #[test]
    fn test_expand_keeps_declared_service_order() {
        let yaml = "- varnish:\n    - v.example.com\n  nginx:\n    - n.example.com\n";
        let declarations: Vec<RouteDeclaration> = serde_yaml::from_str(yaml).unwrap();
        let variables = VariableSet::default();
        let set = defaults(&variables).expand(&declarations).unwrap();

        let domains: Vec<&str> = set.domains().collect();
        assert_eq!(domains, vec!["v.example.com", "n.example.com"]);
        assert_eq!(set.routes[0].lagoon_service, "varnish");
    }

    #[test]
    fn test_expand_declarations() {
        let yaml = r#"
- nginx:
    - example.com
    - "www.example.com":
        tls-acme: false
        insecure: Allow
        alternativenames:
          - alias.example.com
        annotations:
          nginx.ingress.kubernetes.io/permanent-redirect: https://example.com$request_uri
"#;
        let declarations: Vec<RouteDeclaration> = serde_yaml::from_str(yaml).unwrap();
        let variables = VariableSet::default();
        let set = defaults(&variables).expand(&declarations).unwrap();

        assert_eq!(set.len(), 2);
        let plain = &set.routes[0];
        assert_eq!(plain.domain, "example.com");
        assert_eq!(plain.lagoon_service, "nginx");
        assert_eq!(plain.tls_acme, Some(true));
        assert_eq!(plain.insecure.as_deref(), Some(INSECURE_REDIRECT));
        assert_eq!(plain.ingress_name, "example.com");
        assert_eq!(plain.ingress_class, "nginx");
        assert_eq!(plain.monitoring_path, "/");
        assert_eq!(plain.migrate, Some(false));

        let detailed = &set.routes[1];
        assert_eq!(detailed.tls_acme, Some(false));
        assert_eq!(detailed.insecure.as_deref(), Some(INSECURE_ALLOW));
        assert_eq!(detailed.alternative_names, vec!["alias.example.com"]);
        assert_eq!(detailed.annotations.len(), 1);
    }

    #[test]
    fn test_wildcard_routes() {
        let variables = VariableSet::default();
        let mut wildcard = route("example.com", "nginx");
        wildcard.wildcard = Some(true);

        let applied = defaults(&variables).apply(wildcard.clone()).unwrap();
        assert_eq!(applied.tls_acme, Some(false));
        assert_eq!(applied.ingress_name, "wildcard-example.com");

        wildcard.tls_acme = Some(true);
        let err = defaults(&variables).apply(wildcard).unwrap_err();
        assert!(matches!(err, RouteError::WildcardTlsAcme { .. }));
    }

    #[test]
    fn test_active_standby_defaults_to_migrate() {
        let variables = VariableSet::default();
        let mut d = defaults(&variables);
        d.active_standby = true;
        let applied = d.apply(route("example.com", "nginx")).unwrap();
        assert_eq!(applied.migrate, Some(true));
    }

    #[test]
    fn test_api_json_shape() {
        let json = r#"{"routes":[{"domain":"test1.example.com","service":"nginx","tls-acme":false,"monitoring-path":"/bypass-cache","alternativeNames":["alt.example.com"],"fastly":{"service-id":"abc","watch":true}}]}"#;
        let set: RouteSet = serde_json::from_str(json).unwrap();
        let r = &set.routes[0];
        assert_eq!(r.domain, "test1.example.com");
        assert_eq!(r.lagoon_service, "nginx");
        assert_eq!(r.tls_acme, Some(false));
        assert_eq!(r.monitoring_path, "/bypass-cache");
        assert_eq!(r.alternative_names, vec!["alt.example.com"]);
        assert_eq!(r.fastly.service_id, "abc");
        assert!(r.fastly.watch);
    }
}
