//! Build configuration aggregator
//!
//! Orchestrates a full resolution pass:
//!
//! 1. validate the build identity
//! 2. merge variables and add the runtime `LAGOON_*` variables
//! 3. evaluate feature flags and admin resource overrides
//! 4. backups, cronjobs and service linking
//! 5. route generation and assembly
//! 6. publish the route variables

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::assembler::{assemble, RouteSummary};
use super::backup::{BackupConfiguration, BackupInputs};
use super::route_generator::RouteGenerator;
use crate::config::compose::{DBAAS_ENVIRONMENT_TYPES_VARIABLE, SERVICE_TYPES_VARIABLE};
use crate::config::descriptor::ProjectDescriptor;
use crate::config::flags::FeatureFlags;
use crate::config::variables::{Variable, VariableSet, SCOPE_RUNTIME};
use crate::config::{BuildIdentity, BuildType, GeneratorInput};
use crate::domain::resources::{ResourceLimits, ResourceRequests, Resources};
use crate::domain::route::RouteSet;
use crate::domain::schedule::split_cronjobs;
use crate::domain::service::{link, ServiceDescriptor};
use crate::error::Result;

pub const DEFAULT_DBAAS_OPERATOR_ENDPOINT: &str = "http://dbaas.lagoon.svc:5000";
pub const TASK_SCALE_MAX_ITERATIONS: &str = "LAGOON_FEATURE_FLAG_TASK_SCALE_MAX_ITERATIONS";
pub const TASK_SCALE_WAIT_TIME: &str = "LAGOON_FEATURE_FLAG_TASK_SCALE_WAIT_TIME";
const LEGACY_FASTLY_AUTOGENERATED: &str = "LAGOON_FASTLY_AUTOGENERATED";
const CRONJOBS_DISABLED: &str = "LAGOON_CRONJOBS_DISABLED";

/// Security context applied to every pod
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContext {
    pub fs_group: i64,
    pub run_as_group: i64,
    pub run_as_user: i64,
    pub on_root_mismatch: bool,
}

impl PodSecurityContext {
    /// Non-root user with a group-writable filesystem
    pub fn rootless() -> Self {
        Self {
            fs_group: 10001,
            run_as_group: 0,
            run_as_user: 10000,
            on_root_mismatch: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub alert_contact: String,
    #[serde(rename = "statusPageID")]
    pub status_page_id: String,
}

/// Everything the manifest renderer needs for one environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfiguration {
    pub project: String,
    pub environment: String,
    pub environment_type: String,
    pub namespace: String,
    pub build_type: String,
    pub branch: String,
    pub pr_number: String,
    pub pr_title: String,
    pub pr_head_branch: String,
    pub pr_base_branch: String,
    pub lagoon_version: String,
    pub config_map_sha: String,

    pub active_environment: String,
    pub standby_environment: String,
    pub is_active_environment: bool,
    pub is_standby_environment: bool,

    pub pod_security_context: PodSecurityContext,
    pub image_cache: String,
    pub ingress_class: String,
    pub resources: Resources,

    pub fastly_cache_no_cache: String,
    #[serde(rename = "fastlyAPISecretPrefix")]
    pub fastly_api_secret_prefix: String,
    pub autogenerated_routes_fastly: bool,

    /// Primary URL
    pub route: String,
    /// Every published URL
    pub routes: Vec<String>,
    pub autogenerated_routes: Vec<String>,
    pub routes_autogenerate_prefixes: Vec<String>,

    pub services: Vec<ServiceDescriptor>,
    pub backup: BackupConfiguration,
    pub monitoring: MonitoringConfig,

    pub dbaas_operator_endpoint: String,
    pub service_type_overrides: Option<String>,
    pub dbaas_environment_type_overrides: Option<String>,

    pub task_scale_max_iterations: i64,
    pub task_scale_wait_time: i64,
    pub cronjobs_disabled: bool,

    /// Merged variables including the runtime `LAGOON_*` values
    #[serde(skip)]
    pub variables: VariableSet,
    #[serde(skip)]
    pub autogenerated_route_set: RouteSet,
    #[serde(skip)]
    pub main_route_set: RouteSet,
    #[serde(skip)]
    pub active_standby_route_set: RouteSet,
}

/// Merge the API variable lists and append the runtime build variables.
pub fn collect_variables(input: &GeneratorInput, identity: &BuildIdentity) -> Result<VariableSet> {
    let project = VariableSet::from_json("project", &input.project_variables)?;
    let environment = VariableSet::from_json("environment", &input.environment_variables)?;
    Ok(VariableSet::merge(&project, &environment).with(runtime_variables(input, identity)))
}

fn runtime_variables(input: &GeneratorInput, identity: &BuildIdentity) -> Vec<Variable> {
    let runtime = |name: &str, value: &str| Variable::new(name, value, SCOPE_RUNTIME);

    let mut vars = vec![
        runtime("LAGOON_PROJECT", &input.project),
        runtime("LAGOON_ENVIRONMENT", &input.environment),
        runtime("LAGOON_ENVIRONMENT_TYPE", &input.environment_type),
        runtime("LAGOON_GIT_SAFE_BRANCH", &input.environment),
    ];
    match identity.build_type {
        BuildType::Branch => vars.push(runtime("LAGOON_GIT_BRANCH", &input.branch)),
        BuildType::Pullrequest => {
            vars.push(runtime("LAGOON_PR_HEAD_BRANCH", &input.pr_head_branch));
            vars.push(runtime("LAGOON_PR_BASE_BRANCH", &input.pr_base_branch));
            vars.push(runtime("LAGOON_PR_TITLE", &input.pr_title));
            vars.push(runtime("LAGOON_PR_NUMBER", &input.pr_number));
        }
        BuildType::Promote => {}
    }
    if !input.active_environment.is_empty() {
        vars.push(runtime("LAGOON_ACTIVE_ENVIRONMENT", &input.active_environment));
    }
    if !input.standby_environment.is_empty() {
        vars.push(runtime("LAGOON_STANDBY_ENVIRONMENT", &input.standby_environment));
    }
    vars
}

fn route_variables(summary: &RouteSummary) -> Vec<Variable> {
    vec![
        Variable::new("LAGOON_ROUTE", &summary.primary, SCOPE_RUNTIME),
        Variable::new("LAGOON_ROUTES", summary.secondary.join(","), SCOPE_RUNTIME),
        Variable::new(
            "LAGOON_AUTOGENERATED_ROUTES",
            summary.autogenerated.join(","),
            SCOPE_RUNTIME,
        ),
    ]
}

impl BuildConfiguration {
    /// Resolve the configuration of one environment.
    ///
    /// `services` is the unlinked service list read from the compose manifest.
    pub fn resolve(
        input: &GeneratorInput,
        descriptor: &ProjectDescriptor,
        services: Vec<ServiceDescriptor>,
        flags: &FeatureFlags,
    ) -> Result<Self> {
        let identity = input.validate()?;
        let variables = collect_variables(input, &identity)?;
        Self::resolve_with_variables(input, &identity, variables, descriptor, services, flags)
    }

    /// Resolve with an identity and variable set the caller already derived
    /// through [`GeneratorInput::validate`] and [`collect_variables`].
    pub fn resolve_with_variables(
        input: &GeneratorInput,
        identity: &BuildIdentity,
        variables: VariableSet,
        descriptor: &ProjectDescriptor,
        services: Vec<ServiceDescriptor>,
        flags: &FeatureFlags,
    ) -> Result<Self> {
        let mut config = BuildConfiguration {
            project: input.project.clone(),
            environment: input.environment.clone(),
            environment_type: input.environment_type.clone(),
            namespace: input.namespace.clone(),
            build_type: identity.build_type.to_string(),
            branch: identity.branch_key.clone(),
            lagoon_version: input.lagoon_version.clone(),
            config_map_sha: input.config_map_sha.clone(),
            active_environment: input.active_environment.clone(),
            standby_environment: input.standby_environment.clone(),
            fastly_cache_no_cache: input.fastly_no_cache_service_id.clone(),
            fastly_api_secret_prefix: input.fastly_api_secret_prefix.clone(),
            routes_autogenerate_prefixes: descriptor.routes.autogenerate.prefixes.clone(),
            dbaas_operator_endpoint: if input.dbaas_operator_endpoint.is_empty() {
                DEFAULT_DBAAS_OPERATOR_ENDPOINT.to_string()
            } else {
                input.dbaas_operator_endpoint.clone()
            },
            task_scale_max_iterations: flags.env_int(TASK_SCALE_MAX_ITERATIONS, 30),
            task_scale_wait_time: flags.env_int(TASK_SCALE_WAIT_TIME, 10),
            ..Default::default()
        };
        if identity.build_type == BuildType::Pullrequest {
            config.pr_number = input.pr_number.clone();
            config.pr_title = input.pr_title.clone();
            config.pr_head_branch = input.pr_head_branch.clone();
            config.pr_base_branch = input.pr_base_branch.clone();
        }

        if input.is_production() {
            config.monitoring = MonitoringConfig {
                enabled: true,
                alert_contact: input.monitoring_contact.clone(),
                status_page_id: input.monitoring_status_page_id.clone(),
            };
            config.is_active_environment = input.environment == input.active_environment;
            config.is_standby_environment = input.environment == input.standby_environment;
        }

        config.apply_flags(flags, &variables)?;

        config.backup = BackupConfiguration::resolve(
            BackupInputs {
                seed: &input.schedule_seed(),
                production: input.is_production(),
                build_type: identity.build_type,
                default_schedule: &input.default_backup_schedule,
                k8up_version: &input.k8up_version,
            },
            descriptor,
            &variables,
        )?;

        let services = config.attach_cronjobs(input, identity, descriptor, services)?;
        let mut services = link(services);

        let generator = RouteGenerator {
            project: &input.project,
            environment: &input.environment,
            branch_key: &identity.branch_key,
            descriptor,
            variables: &variables,
            ingress_class: &config.ingress_class,
            fastly_no_cache_service_id: &input.fastly_no_cache_service_id,
            fastly_secret_prefix: &input.fastly_api_secret_prefix,
            is_active: config.is_active_environment,
            is_standby: config.is_standby_environment,
        };
        let autogenerated = generator.autogenerated(&services)?;
        for service in &mut services {
            if let Some(generated) = autogenerated.domains.get(&service.name) {
                service.autogenerated_route_domain = generated.domain.clone();
                service.short_autogenerated_route_domain = generated.short_domain.clone();
            }
        }
        let autogenerated = autogenerated.routes;
        let declared = generator.declared()?;
        let active_standby = generator.active_standby()?;
        let summary = assemble(&autogenerated, &declared, &active_standby);
        info!(primary = %summary.primary, routes = summary.secondary.len(), "Routes assembled");

        config.variables = variables.with(route_variables(&summary));
        config.route = summary.primary;
        config.routes = summary.secondary;
        config.autogenerated_routes = summary.autogenerated;
        config.services = services;
        config.autogenerated_route_set = autogenerated;
        config.main_route_set = declared;
        config.active_standby_route_set = active_standby;

        Ok(config)
    }

    /// Flag-driven fields and admin resource overrides.
    fn apply_flags(&mut self, flags: &FeatureFlags, variables: &VariableSet) -> Result<()> {
        let mut image_cache = flags.value("IMAGECACHE_REGISTRY", variables);
        if !image_cache.is_empty() && !image_cache.ends_with('/') {
            image_cache.push('/');
        }
        self.image_cache = image_cache;

        self.ingress_class = flags.value("INGRESS_CLASS", variables);

        if flags.resolve("ROOTLESS_WORKLOAD", variables).is_enabled() {
            self.pod_security_context = PodSecurityContext::rootless();
        }
        if flags.resolve("FS_ON_ROOT_MISMATCH", variables).is_enabled() {
            self.pod_security_context.on_root_mismatch = true;
        }

        self.resources = Resources {
            limits: ResourceLimits {
                memory: flags.admin("CONTAINER_MEMORY_LIMIT"),
                ephemeral_storage: flags.admin("EPHEMERAL_STORAGE_LIMIT"),
            },
            requests: ResourceRequests {
                ephemeral_storage: flags.admin("EPHEMERAL_STORAGE_REQUESTS"),
            },
        };
        self.resources.validate()?;

        self.service_type_overrides = variables.value(SERVICE_TYPES_VARIABLE, None).map(str::to_string);
        self.dbaas_environment_type_overrides = variables
            .value(DBAAS_ENVIRONMENT_TYPES_VARIABLE, None)
            .map(str::to_string);

        self.autogenerated_routes_fastly = flags.resolve("FASTLY_AUTOGENERATED", variables).is_enabled();
        if let Some(legacy) = variables.value(LEGACY_FASTLY_AUTOGENERATED, None) {
            debug!("Using {} over the feature flag", LEGACY_FASTLY_AUTOGENERATED);
            self.autogenerated_routes_fastly = legacy == "enabled";
        }

        self.cronjobs_disabled = variables.value(CRONJOBS_DISABLED, None) == Some("true");
        Ok(())
    }

    /// Convert the branch's cronjobs and attach them to their services.
    fn attach_cronjobs(
        &self,
        input: &GeneratorInput,
        identity: &BuildIdentity,
        descriptor: &ProjectDescriptor,
        mut services: Vec<ServiceDescriptor>,
    ) -> Result<Vec<ServiceDescriptor>> {
        let Some(cronjobs) = descriptor
            .environment(&identity.branch_key)
            .map(|env| env.cronjobs.as_slice())
            .filter(|c| !c.is_empty())
        else {
            return Ok(services);
        };
        if self.cronjobs_disabled {
            info!("Cronjobs are disabled for this environment");
            return Ok(services);
        }

        let (native, in_pod) = split_cronjobs(&input.schedule_seed(), cronjobs)?;
        for (cronjob, in_pod) in native
            .into_iter()
            .map(|c| (c, false))
            .chain(in_pod.into_iter().map(|c| (c, true)))
        {
            let Some(service) = services.iter_mut().find(|s| s.name == cronjob.service) else {
                warn!(cronjob = %cronjob.name, service = %cronjob.service, "Cronjob targets an unknown service, skipping");
                continue;
            };
            if in_pod {
                service.in_pod_cronjobs.push(cronjob);
            } else {
                service.native_cronjobs.push(cronjob);
            }
        }
        Ok(services)
    }

    /// Published URLs
    pub fn route_summary(&self) -> RouteSummary {
        RouteSummary {
            primary: self.route.clone(),
            secondary: self.routes.clone(),
            autogenerated: self.autogenerated_routes.clone(),
        }
    }

    /// Names of every native cronjob, linked services included
    pub fn native_cronjob_names(&self) -> Vec<String> {
        self.services
            .iter()
            .flat_map(|s| std::iter::once(s).chain(s.linked_service.as_deref()))
            .flat_map(|s| s.native_cronjobs.iter().map(|c| c.native_name()))
            .collect()
    }
}
