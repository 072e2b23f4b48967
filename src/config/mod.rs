//! # Build Inputs
//!
//! Everything a resolution pass reads, in the order it is layered:
//!
//! 1. **Identity** ([`GeneratorInput`]) - project, environment, build type,
//!    supplied by the build controller as flags or environment variables
//! 2. **Variables** ([`variables`]) - project and environment lists from the API
//! 3. **Feature flags** ([`flags`]) - cluster-wide force/default/admin tables
//! 4. **Project descriptor** ([`descriptor`]) - `.lagoon.yml` plus overrides
//! 5. **Compose manifest** ([`compose`]) - the service list

pub mod compose;
pub mod descriptor;
pub mod flags;
pub mod variables;

pub use compose::ComposeContext;
pub use descriptor::ProjectDescriptor;
pub use flags::{FeatureFlags, FlagResult, FlagSource};
pub use variables::{Variable, VariableSet};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

pub const ENVIRONMENT_TYPE_PRODUCTION: &str = "production";
pub const ENVIRONMENT_TYPE_DEVELOPMENT: &str = "development";

/// Kind of build being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Branch,
    Pullrequest,
    Promote,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Branch => "branch",
            BuildType::Pullrequest => "pullrequest",
            BuildType::Promote => "promote",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "branch" => Ok(BuildType::Branch),
            "pullrequest" => Ok(BuildType::Pullrequest),
            "promote" => Ok(BuildType::Promote),
            other => Err(ConfigError::InvalidValue {
                field: "build-type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Raw inputs for one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorInput {
    pub project: String,
    pub environment: String,
    pub environment_type: String,
    pub build_type: String,
    pub branch: String,
    pub pr_number: String,
    pub pr_title: String,
    pub pr_head_branch: String,
    pub pr_base_branch: String,
    pub active_environment: String,
    pub standby_environment: String,

    /// JSON variable lists as supplied by the API
    pub project_variables: String,
    pub environment_variables: String,

    pub fastly_no_cache_service_id: String,
    /// Prepended to Fastly secret names
    pub fastly_api_secret_prefix: String,

    pub monitoring_contact: String,
    pub monitoring_status_page_id: String,

    pub lagoon_version: String,
    pub namespace: String,
    pub default_backup_schedule: String,
    pub k8up_version: String,
    pub dbaas_operator_endpoint: String,
    pub config_map_sha: String,
}

/// Validated build identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentity {
    pub build_type: BuildType,
    /// Descriptor environment key: the branch, or `pr-<number>`
    pub branch_key: String,
}

impl GeneratorInput {
    /// Check required identity fields and derive the branch key.
    pub fn validate(&self) -> Result<BuildIdentity, ConfigError> {
        if self.project.is_empty()
            || self.environment.is_empty()
            || self.environment_type.is_empty()
            || self.build_type.is_empty()
        {
            return Err(ConfigError::MissingField {
                field: "project-name, environment-name, environment-type, or build-type".to_string(),
            });
        }

        let build_type: BuildType = self.build_type.parse()?;
        let branch_key = match build_type {
            BuildType::Branch | BuildType::Promote => {
                if self.branch.is_empty() {
                    return Err(ConfigError::MissingField {
                        field: "branch".to_string(),
                    });
                }
                self.branch.clone()
            }
            BuildType::Pullrequest => {
                if self.pr_number.is_empty()
                    || self.pr_head_branch.is_empty()
                    || self.pr_base_branch.is_empty()
                {
                    return Err(ConfigError::MissingField {
                        field: "pullrequest-number, pullrequest-head-branch, or pullrequest-base-branch"
                            .to_string(),
                    });
                }
                format!("pr-{}", self.pr_number)
            }
        };

        Ok(BuildIdentity {
            build_type,
            branch_key,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment_type == ENVIRONMENT_TYPE_PRODUCTION
    }

    /// Seed for schedule placeholders, the namespace when known
    pub fn schedule_seed(&self) -> String {
        if self.namespace.is_empty() {
            format!("{}-{}", self.project, self.environment)
        } else {
            self.namespace.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch_input() -> GeneratorInput {
        GeneratorInput {
            project: "example-project".to_string(),
            environment: "main".to_string(),
            environment_type: "production".to_string(),
            build_type: "branch".to_string(),
            branch: "main".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_branch_identity() {
        let identity = branch_input().validate().unwrap();
        assert_eq!(identity.build_type, BuildType::Branch);
        assert_eq!(identity.branch_key, "main");
    }

    #[test]
    fn test_pullrequest_branch_key() {
        let input = GeneratorInput {
            environment: "pr-123".to_string(),
            environment_type: "development".to_string(),
            build_type: "pullrequest".to_string(),
            branch: String::new(),
            pr_number: "123".to_string(),
            pr_head_branch: "feature".to_string(),
            pr_base_branch: "main".to_string(),
            ..branch_input()
        };
        let identity = input.validate().unwrap();
        assert_eq!(identity.build_type, BuildType::Pullrequest);
        assert_eq!(identity.branch_key, "pr-123");
    }

    #[test]
    fn test_missing_identity_fields() {
        let input = GeneratorInput {
            project: String::new(),
            ..branch_input()
        };
        assert!(matches!(
            input.validate(),
            Err(ConfigError::MissingField { .. })
        ));

        let input = GeneratorInput {
            branch: String::new(),
            ..branch_input()
        };
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("branch"));

        let input = GeneratorInput {
            build_type: "pullrequest".to_string(),
            pr_number: "1".to_string(),
            ..branch_input()
        };
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("pullrequest-head-branch"));
    }

    #[test]
    fn test_unknown_build_type() {
        let input = GeneratorInput {
            build_type: "tag".to_string(),
            ..branch_input()
        };
        assert!(matches!(
            input.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_schedule_seed() {
        assert_eq!(branch_input().schedule_seed(), "example-project-main");
        let input = GeneratorInput {
            namespace: "example-project-main-ns".to_string(),
            ..branch_input()
        };
        assert_eq!(input.schedule_seed(), "example-project-main-ns");
    }
}
