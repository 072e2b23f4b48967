//! Fastly CDN configuration attached to each route.

use serde::{Deserialize, Serialize};

use crate::config::variables::{VariableSet, SCOPE_BUILD, SCOPE_GLOBAL};
use crate::error::RouteError;

/// Applies to every route unless a per-domain entry exists.
/// Format: `SERVICE_ID:WATCH[:SECRET_NAME]`
pub const SERVICE_ID_VARIABLE: &str = "LAGOON_FASTLY_SERVICE_ID";
/// Per-domain overrides.
/// Format: `DOMAIN:SERVICE_ID:WATCH[:SECRET_NAME],...`
pub const SERVICE_IDS_VARIABLE: &str = "LAGOON_FASTLY_SERVICE_IDS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastlyConfig {
    #[serde(rename = "service-id", default, skip_serializing_if = "String::is_empty")]
    pub service_id: String,

    #[serde(rename = "api-secret-name", default, skip_serializing_if = "String::is_empty")]
    pub api_secret_name: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub watch: bool,
}

impl FastlyConfig {
    pub fn is_empty(&self) -> bool {
        self.service_id.is_empty() && self.api_secret_name.is_empty() && !self.watch
    }

    /// Resolve the Fastly configuration for `domain`.
    ///
    /// Starts from `self` (the route's own declaration), falls back to the
    /// no-cache service when nothing was declared, then applies the
    /// environment-wide and per-domain variables in that order.
    pub fn resolve(
        &self,
        no_cache_service_id: &str,
        domain: &str,
        secret_prefix: &str,
        variables: &VariableSet,
    ) -> Result<FastlyConfig, RouteError> {
        let mut config = self.clone();
        if config.service_id.is_empty() && !no_cache_service_id.is_empty() {
            config.service_id = no_cache_service_id.to_string();
            config.watch = true;
        }

        let scopes: &[&str] = &[SCOPE_BUILD, SCOPE_GLOBAL];

        if let Some(value) = variables.value(SERVICE_ID_VARIABLE, Some(scopes)) {
            let parts: Vec<&str> = value.split(':').collect();
            config.apply(SERVICE_ID_VARIABLE, &parts, secret_prefix)?;
        }

        if let Some(value) = variables.value(SERVICE_IDS_VARIABLE, Some(scopes)) {
            for entry in value.split(',') {
                let parts: Vec<&str> = entry.trim().split(':').collect();
                if parts[0] == domain {
                    config.apply(SERVICE_IDS_VARIABLE, &parts[1..], secret_prefix)?;
                }
            }
        }

        Ok(config)
    }

    /// Apply `SERVICE_ID:WATCH[:SECRET_NAME]` parts.
    fn apply(&mut self, variable: &str, parts: &[&str], secret_prefix: &str) -> Result<(), RouteError> {
        if parts.len() < 2 {
            return Err(RouteError::Fastly {
                variable: variable.to_string(),
                message: "no watch status was provided, only the service id".to_string(),
            });
        }
        let watch = parse_bool(parts[1]).ok_or_else(|| RouteError::Fastly {
            variable: variable.to_string(),
            message: format!("the provided value {} is not a valid boolean", parts[1]),
        })?;
        self.service_id = parts[0].to_string();
        self.watch = watch;
        if let Some(secret) = parts.get(2) {
            self.api_secret_name = format!("{}{}", secret_prefix, secret);
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
