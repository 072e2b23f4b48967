//! Centralized error types for forge-resolve
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for a resolution pass
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Variable error: {0}")]
    Variable(#[from] VariableError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// Route generation errors
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Router pattern variable {variable} not found, autogenerated routes cannot be created")]
    MissingRouterPattern { variable: String },

    #[error("Couldn't decode routes from {variable}, is it actually JSON that has been base64 encoded?: {message}")]
    ApiRoutesMalformed { variable: String, message: String },

    #[error("Route {domain} is a wildcard route and cannot use tls-acme")]
    WildcardTlsAcme { domain: String },

    #[error("Invalid Fastly configuration in {variable}: {message}")]
    Fastly { variable: String, message: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required configuration missing: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Provided {field} {value} is not a valid resource quantity")]
    InvalidQuantity { field: String, value: String },

    #[error("Invalid schedule '{schedule}': {message}")]
    InvalidSchedule { schedule: String, message: String },

    #[error("Failed to parse {source_name}: {message}")]
    ParseError { source_name: String, message: String },
}

/// Variable list errors
#[derive(Error, Debug)]
pub enum VariableError {
    #[error("Couldn't unmarshal {source_name} variables: {message}")]
    Malformed { source_name: String, message: String },
}

/// Service manifest errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service {service} has no lagoon.type label")]
    MissingType { service: String },

    #[error("Service {service} has an invalid label {label}: {value}")]
    InvalidLabel {
        service: String,
        label: String,
        value: String,
    },

    #[error("Compose manifest has no services")]
    NoServices,
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_error_display() {
        let err = RouteError::MissingRouterPattern {
            variable: "LAGOON_SYSTEM_ROUTER_PATTERN".to_string(),
        };
        assert!(err.to_string().contains("LAGOON_SYSTEM_ROUTER_PATTERN"));
    }

    #[test]
    fn test_error_conversion() {
        let route_err = RouteError::WildcardTlsAcme {
            domain: "*.example.com".to_string(),
        };
        let resolve_err: ResolveError = route_err.into();
        assert!(matches!(resolve_err, ResolveError::Route(_)));
    }
}
