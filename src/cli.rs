//! CLI definitions for forge-resolve
//!
//! This module contains all CLI argument parsing structures using clap.
//! Every generator argument falls back to the environment variable the build
//! controller sets for it.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use forge_resolve::config::GeneratorInput;

#[derive(Parser)]
#[command(
    name = "forge-resolve",
    version,
    about = "Resolve the build configuration of an application environment",
    long_about = "Merges the compose manifest, project descriptor, API variables and cluster feature flags\ninto one deterministic build configuration."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify resources a build would create
    Identify {
        #[command(subcommand)]
        command: IdentifyCommands,
    },

    /// Print the resolved build configuration as JSON
    Values {
        #[command(flatten)]
        generator: GeneratorArgs,
    },
}

/// Identify subcommands
#[derive(Subcommand)]
pub enum IdentifyCommands {
    /// Print the primary ingress URL
    #[command(alias = "pi")]
    PrimaryIngress {
        #[command(flatten)]
        generator: GeneratorArgs,
    },

    /// Print the primary, secondary and autogenerated ingress URLs as JSON
    #[command(alias = "i")]
    Ingress {
        #[command(flatten)]
        generator: GeneratorArgs,
    },

    /// Print the names of native cronjobs as JSON
    #[command(alias = "nc")]
    NativeCronjobs {
        #[command(flatten)]
        generator: GeneratorArgs,
    },
}

/// Arguments shared by every command that runs the generator
#[derive(Args, Debug, Clone)]
pub struct GeneratorArgs {
    /// Project descriptor
    #[arg(short = 'l', long, default_value = ".lagoon.yml")]
    pub lagoon_yml: PathBuf,

    /// Descriptor override file, merged over the descriptor when it exists
    #[arg(long, default_value = ".lagoon.override.yml")]
    pub lagoon_yml_override: PathBuf,

    /// Base64 encoded descriptor override, merged last
    #[arg(long, env = "LAGOON_YAML_OVERRIDE")]
    pub lagoon_yml_override_base64: Option<String>,

    /// Compose manifest, defaults to the descriptor's docker-compose-yaml
    #[arg(long)]
    pub compose: Option<PathBuf>,

    #[arg(short = 'p', long, env = "PROJECT", default_value = "")]
    pub project_name: String,

    #[arg(short = 'e', long, env = "ENVIRONMENT", default_value = "")]
    pub environment_name: String,

    /// production or development
    #[arg(short = 'E', long, env = "ENVIRONMENT_TYPE", default_value = "")]
    pub environment_type: String,

    /// branch, pullrequest or promote
    #[arg(short = 'd', long, env = "BUILD_TYPE", default_value = "")]
    pub build_type: String,

    #[arg(short = 'b', long, env = "BRANCH", default_value = "")]
    pub branch: String,

    #[arg(long, env = "PR_NUMBER", default_value = "")]
    pub pullrequest_number: String,

    #[arg(long, env = "PR_TITLE", default_value = "")]
    pub pullrequest_title: String,

    #[arg(long, env = "PR_HEAD_BRANCH", default_value = "")]
    pub pullrequest_head_branch: String,

    #[arg(long, env = "PR_BASE_BRANCH", default_value = "")]
    pub pullrequest_base_branch: String,

    #[arg(long, env = "ACTIVE_ENVIRONMENT", default_value = "")]
    pub active_environment: String,

    #[arg(long, env = "STANDBY_ENVIRONMENT", default_value = "")]
    pub standby_environment: String,

    /// Project variables as a JSON list
    #[arg(long, env = "LAGOON_PROJECT_VARIABLES", default_value = "")]
    pub project_variables: String,

    /// Environment variables as a JSON list
    #[arg(long, env = "LAGOON_ENVIRONMENT_VARIABLES", default_value = "")]
    pub environment_variables: String,

    #[arg(long, env = "LAGOON_FASTLY_NOCACHE_SERVICE_ID", default_value = "")]
    pub fastly_cache_no_cache_id: String,

    /// Prefix for Fastly API secret names
    #[arg(long, env = "ROUTE_FASTLY_SERVICE_ID", default_value = "fastly-api-")]
    pub fastly_api_secret_prefix: String,

    #[arg(long, env = "MONITORING_ALERTCONTACT", default_value = "")]
    pub monitoring_config: String,

    #[arg(long, env = "MONITORING_STATUSPAGEID", default_value = "")]
    pub monitoring_status_page_id: String,

    #[arg(long, env = "LAGOON_VERSION", default_value = "")]
    pub lagoon_version: String,

    #[arg(long, env = "NAMESPACE", default_value = "")]
    pub namespace: String,

    #[arg(long, env = "DEFAULT_BACKUP_SCHEDULE", default_value = "")]
    pub default_backup_schedule: String,

    #[arg(long, env = "K8UP_VERSION", default_value = "")]
    pub k8up_version: String,

    #[arg(long, env = "DBAAS_OPERATOR_HTTP", default_value = "")]
    pub dbaas_operator_endpoint: String,

    #[arg(long, env = "CONFIG_MAP_SHA", default_value = "")]
    pub config_map_sha: String,
}

impl GeneratorArgs {
    pub fn to_input(&self) -> GeneratorInput {
        GeneratorInput {
            project: self.project_name.clone(),
            environment: self.environment_name.clone(),
            environment_type: self.environment_type.clone(),
            build_type: self.build_type.clone(),
            branch: self.branch.clone(),
            pr_number: self.pullrequest_number.clone(),
            pr_title: self.pullrequest_title.clone(),
            pr_head_branch: self.pullrequest_head_branch.clone(),
            pr_base_branch: self.pullrequest_base_branch.clone(),
            active_environment: self.active_environment.clone(),
            standby_environment: self.standby_environment.clone(),
            project_variables: self.project_variables.clone(),
            environment_variables: self.environment_variables.clone(),
            fastly_no_cache_service_id: self.fastly_cache_no_cache_id.clone(),
            fastly_api_secret_prefix: self.fastly_api_secret_prefix.clone(),
            monitoring_contact: self.monitoring_config.clone(),
            monitoring_status_page_id: self.monitoring_status_page_id.clone(),
            lagoon_version: self.lagoon_version.clone(),
            namespace: self.namespace.clone(),
            default_backup_schedule: self.default_backup_schedule.clone(),
            k8up_version: self.k8up_version.clone(),
            dbaas_operator_endpoint: self.dbaas_operator_endpoint.clone(),
            config_map_sha: self.config_map_sha.clone(),
        }
    }
}
