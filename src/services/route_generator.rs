//! Route generation
//!
//! Produces the three route sets of an environment. Each call returns a new
//! [`RouteSet`]; nothing is shared between the sets.

use base64::{engine::general_purpose, Engine as _};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::descriptor::ProjectDescriptor;
use crate::config::variables::{VariableSet, SCOPE_BUILD, SCOPE_GLOBAL, SCOPE_INTERNAL_SYSTEM};
use crate::domain::fastly::FastlyConfig;
use crate::domain::hostname::{self, GeneratedDomain};
use crate::domain::route::{Route, RouteDeclaration, RouteDefaults, RouteSet, INSECURE_ALLOW};
use crate::domain::service::ServiceDescriptor;
use crate::error::RouteError;

pub const ROUTER_PATTERN_VARIABLE: &str = "LAGOON_SYSTEM_ROUTER_PATTERN";
pub const ROUTES_JSON_VARIABLE: &str = "LAGOON_ROUTES_JSON";

const AUTOGENERATED_CHART: &str = "autogenerated-ingress";
const AUTOGENERATED_CHART_VERSION: &str = "0.1.0";

/// Autogenerated routes and the domains generated for each service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutogeneratedRoutes {
    pub routes: RouteSet,
    /// Full and short domain, keyed by compose service name
    pub domains: BTreeMap<String, GeneratedDomain>,
}

/// Environment facts needed to build routes
#[derive(Debug, Clone)]
pub struct RouteGenerator<'a> {
    pub project: &'a str,
    pub environment: &'a str,
    pub branch_key: &'a str,
    pub descriptor: &'a ProjectDescriptor,
    pub variables: &'a VariableSet,
    /// Environment default from the `INGRESS_CLASS` flag
    pub ingress_class: &'a str,
    pub fastly_no_cache_service_id: &'a str,
    pub fastly_secret_prefix: &'a str,
    pub is_active: bool,
    pub is_standby: bool,
}

impl<'a> RouteGenerator<'a> {
    fn defaults(&self, active_standby: bool) -> RouteDefaults<'a> {
        RouteDefaults {
            ingress_class: self.ingress_class,
            fastly_no_cache_service_id: self.fastly_no_cache_service_id,
            fastly_secret_prefix: self.fastly_secret_prefix,
            variables: self.variables,
            active_standby,
        }
    }

    /// One route per service with autogenerated routes enabled.
    ///
    /// `services` should already be linked so each routing identity yields a
    /// single route.
    pub fn autogenerated(&self, services: &[ServiceDescriptor]) -> Result<AutogeneratedRoutes, RouteError> {
        let pattern = self
            .variables
            .value(ROUTER_PATTERN_VARIABLE, Some(&[SCOPE_INTERNAL_SYSTEM]))
            .ok_or_else(|| RouteError::MissingRouterPattern {
                variable: ROUTER_PATTERN_VARIABLE.to_string(),
            })?;

        let autogenerate = &self.descriptor.routes.autogenerate;
        let insecure = autogenerate
            .insecure
            .clone()
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| INSECURE_ALLOW.to_string());
        let ingress_class = autogenerate
            .ingress_class
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.ingress_class.to_string());

        let mut routes = Vec::new();
        let mut domains = BTreeMap::new();
        for service in services.iter().filter(|s| s.autogenerated_routes_enabled) {
            let identity = service.routing_identity().to_string();
            let generated = hostname::generate(pattern, &identity, self.project, self.environment);
            debug!(service = %service.name, domain = %generated.domain, "Generated autogenerated route");

            let fastly = FastlyConfig::default().resolve(
                self.fastly_no_cache_service_id,
                &generated.domain,
                self.fastly_secret_prefix,
                self.variables,
            )?;

            let labels = BTreeMap::from([
                ("lagoon.sh/autogenerated".to_string(), "true".to_string()),
                (
                    "helm.sh/chart".to_string(),
                    format!("{}-{}", AUTOGENERATED_CHART, AUTOGENERATED_CHART_VERSION),
                ),
                ("app.kubernetes.io/name".to_string(), AUTOGENERATED_CHART.to_string()),
                ("app.kubernetes.io/instance".to_string(), identity.clone()),
                ("lagoon.sh/service".to_string(), identity.clone()),
                ("lagoon.sh/service-type".to_string(), service.service_type.clone()),
            ]);

            routes.push(Route {
                domain: generated.domain.clone(),
                lagoon_service: identity.clone(),
                compose_service: service.name.clone(),
                tls_acme: Some(service.autogenerated_routes_tls_acme),
                insecure: Some(insecure.clone()),
                fastly,
                labels,
                alternative_names: autogenerate
                    .prefixes
                    .iter()
                    .map(|prefix| format!("{}.{}", prefix, generated.domain))
                    .collect(),
                ingress_name: identity,
                ingress_class: ingress_class.clone(),
                autogenerated: true,
                ..Default::default()
            });

            domains.insert(service.name.clone(), generated);
        }

        Ok(AutogeneratedRoutes {
            routes: RouteSet::new(routes),
            domains,
        })
    }

    /// Routes declared for the branch key, with API routes merged over them.
    pub fn declared(&self) -> Result<RouteSet, RouteError> {
        let declarations: &[RouteDeclaration] = self
            .descriptor
            .environment(self.branch_key)
            .map(|env| env.routes.as_slice())
            .unwrap_or_default();
        let yaml_routes = self.defaults(false).expand(declarations)?;

        let api_routes = self.api_routes()?;
        if !api_routes.is_empty() {
            info!(count = api_routes.len(), "Merging routes from {}", ROUTES_JSON_VARIABLE);
        }
        Ok(yaml_routes.merge(&api_routes))
    }

    /// Routes from `LAGOON_ROUTES_JSON`, defaults applied.
    fn api_routes(&self) -> Result<RouteSet, RouteError> {
        let Some(encoded) = self
            .variables
            .value(ROUTES_JSON_VARIABLE, Some(&[SCOPE_BUILD, SCOPE_GLOBAL]))
        else {
            return Ok(RouteSet::default());
        };
        debug!("Collecting routes from environment variable {}", ROUTES_JSON_VARIABLE);

        let malformed = |message: String| RouteError::ApiRoutesMalformed {
            variable: ROUTES_JSON_VARIABLE.to_string(),
            message,
        };
        let raw = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| malformed(e.to_string()))?;
        let parsed: RouteSet = serde_json::from_slice(&raw).map_err(|e| malformed(e.to_string()))?;

        let defaults = self.defaults(false);
        let routes = parsed
            .routes
            .into_iter()
            .map(|route| defaults.apply(route))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RouteSet::new(routes))
    }

    /// Routes from `production_routes` for an active or standby environment.
    pub fn active_standby(&self) -> Result<RouteSet, RouteError> {
        let Some(production) = self.descriptor.production_routes.as_ref() else {
            return Ok(RouteSet::default());
        };

        let mut declarations: Vec<RouteDeclaration> = Vec::new();
        if self.is_active {
            if let Some(active) = &production.active {
                declarations.extend(active.routes.iter().cloned());
            }
        }
        if self.is_standby {
            if let Some(standby) = &production.standby {
                declarations.extend(standby.routes.iter().cloned());
            }
        }
        self.defaults(true).expand(&declarations)
    }
}
