//! Resource overrides applied to every workload.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::ConfigError;

/// Kubernetes quantity: signed decimal number with an optional binary SI,
/// decimal SI or exponent suffix.
const QUANTITY_PATTERN: &str =
    r"^[+-]?(\d+(\.\d*)?|\.\d+)(Ki|Mi|Gi|Ti|Pi|Ei|n|u|m|k|M|G|T|P|E|[eE][+-]?\d+)?$";

fn quantity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(QUANTITY_PATTERN).expect("quantity pattern is valid"))
}

/// Validate a Kubernetes resource quantity (e.g. "512Mi", "1.5Gi", "100m")
pub fn validate_quantity(field: &str, value: &str) -> Result<(), ConfigError> {
    if quantity_regex().is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidQuantity {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub limits: ResourceLimits,
    pub requests: ResourceRequests,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory: String,
    #[serde(rename = "ephemeral-storage", default, skip_serializing_if = "String::is_empty")]
    pub ephemeral_storage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequests {
    #[serde(rename = "ephemeral-storage", default, skip_serializing_if = "String::is_empty")]
    pub ephemeral_storage: String,
}

impl Resources {
    /// Validate every override that is set
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("memory limit", &self.limits.memory),
            ("ephemeral storage limit", &self.limits.ephemeral_storage),
            ("ephemeral storage requests", &self.requests.ephemeral_storage),
        ];
        for (field, value) in checks {
            if !value.is_empty() {
                validate_quantity(field, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_quantities() {
        for q in ["512Mi", "1Gi", "1.5Gi", "100m", "2", "0.5", "1e3", "128974848", "+1k", ".5G"] {
            assert!(validate_quantity("memory limit", q).is_ok(), "{} should be valid", q);
        }
    }

    #[test]
    fn test_invalid_quantities() {
        for q in ["", "Mi", "1Gb", "ten", "1 Gi", "1.2.3", "--1", " 16Gi\n", "16Gi ", "\t512Mi"] {
            assert!(validate_quantity("memory limit", q).is_err(), "{:?} should be invalid", q);
        }

        let padded = Resources {
            limits: ResourceLimits {
                memory: " 16Gi\n".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(padded.validate().is_err());
    }

    #[test]
    fn test_resources_validate_names_field() {
        let resources = Resources {
            limits: ResourceLimits {
                memory: "16Gi".to_string(),
                ephemeral_storage: "lots".to_string(),
            },
            ..Default::default()
        };
        let err = resources.validate().unwrap_err();
        assert!(err.to_string().contains("ephemeral storage limit"));
        assert!(err.to_string().contains("lots"));
    }
}
