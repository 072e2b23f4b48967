//! Command implementations
//!
//! Every command runs the same pipeline and differs only in what it prints.

pub mod identify;
pub mod values;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use forge_resolve::config::{BuildType, ComposeContext, FeatureFlags, ProjectDescriptor};
use forge_resolve::services::build_values::collect_variables;
use forge_resolve::services::BuildConfiguration;

use crate::cli::GeneratorArgs;

/// Load every input named by `args` and resolve the build configuration.
pub fn resolve(args: &GeneratorArgs, flags: &FeatureFlags) -> Result<BuildConfiguration> {
    let input = args.to_input();
    let identity = input.validate().context("Invalid build arguments")?;

    let descriptor = ProjectDescriptor::load(
        &args.lagoon_yml,
        Some(args.lagoon_yml_override.as_path()),
        args.lagoon_yml_override_base64.as_deref(),
        &input.project,
    )?;
    let variables = collect_variables(&input, &identity)?;

    let compose_path = compose_path(args, &descriptor);
    debug!(path = %compose_path.display(), "Reading compose manifest");
    let services = ComposeContext::new(
        &descriptor,
        &identity.branch_key,
        identity.build_type == BuildType::Pullrequest,
        &input.environment_type,
        &variables,
    )
    .load(&compose_path)?;

    let config =
        BuildConfiguration::resolve_with_variables(&input, &identity, variables, &descriptor, services, flags)
            .context("Failed to resolve build configuration")?;
    info!(
        project = %config.project,
        environment = %config.environment,
        services = config.services.len(),
        "Resolved build configuration"
    );
    Ok(config)
}

/// Compose manifest path, relative to the descriptor unless given explicitly
fn compose_path(args: &GeneratorArgs, descriptor: &ProjectDescriptor) -> PathBuf {
    if let Some(path) = &args.compose {
        return path.clone();
    }
    match args.lagoon_yml.parent() {
        Some(dir) => dir.join(&descriptor.docker_compose_yaml),
        None => PathBuf::from(&descriptor.docker_compose_yaml),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::path::Path;
    use tempfile::TempDir;

    pub const DESCRIPTOR: &str = r#"
docker-compose-yaml: docker-compose.yml
environments:
  main:
    routes:
      - nginx:
          - example.com
          - www.example.com
    cronjobs:
      - name: drush cron
        schedule: "*/15 * * * *"
        command: drush cron
        service: cli
      - name: nightly report
        schedule: "M 3 * * *"
        command: ./report.sh
        service: cli
"#;

    pub const COMPOSE: &str = r#"
services:
  cli:
    build: .
    labels:
      lagoon.type: cli-persistent
      lagoon.persistent: /app/web/sites/default/files/
  nginx:
    build: .
    labels:
      lagoon.type: nginx-php-persistent
      lagoon.name: nginx
      lagoon.persistent: /app/web/sites/default/files/
  php:
    build: .
    labels:
      lagoon.type: nginx-php-persistent
      lagoon.name: nginx
      lagoon.persistent: /app/web/sites/default/files/
  mariadb:
    image: mariadb
    labels:
      lagoon.type: mariadb
"#;

    /// Write a project checkout and parse `values` arguments pointing at it.
    pub fn project(dir: &TempDir) -> GeneratorArgs {
        std::fs::write(dir.path().join(".lagoon.yml"), DESCRIPTOR).unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), COMPOSE).unwrap();

        let lagoon_yml = dir.path().join(".lagoon.yml");
        let override_path = dir.path().join(".lagoon.override.yml");
        let argv = vec![
            "forge-resolve",
            "values",
            "--lagoon-yml",
            lagoon_yml.to_str().unwrap(),
            "--lagoon-yml-override",
            override_path.to_str().unwrap(),
            "--lagoon-yml-override-base64",
            "",
            "--project-name",
            "example-project",
            "--environment-name",
            "main",
            "--environment-type",
            "production",
            "--build-type",
            "branch",
            "--branch",
            "main",
            "--namespace",
            "example-project-main",
            "--project-variables",
            r#"[{"name":"LAGOON_SYSTEM_ROUTER_PATTERN","value":"${service}-${project}-${environment}.example.net","scope":"internal_system"}]"#,
            "--environment-variables",
            "[]",
            "--active-environment",
            "",
            "--standby-environment",
            "",
        ];

        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Values { generator } => generator,
            _ => panic!("expected values"),
        }
    }

    #[test]
    fn test_resolve_project_checkout() {
        let dir = TempDir::new().unwrap();
        let args = project(&dir);

        let config = resolve(&args, &FeatureFlags::default()).unwrap();
        assert_eq!(config.route, "https://example.com");
        assert!(config
            .autogenerated_routes
            .contains(&"https://nginx-example-project-main.example.net".to_string()));
    }

    #[test]
    fn test_explicit_compose_path() {
        let dir = TempDir::new().unwrap();
        let mut args = project(&dir);
        std::fs::write(
            dir.path().join("other-compose.yml"),
            "services:\n  node:\n    build: .\n    labels:\n      lagoon.type: node\n",
        )
        .unwrap();
        args.compose = Some(dir.path().join("other-compose.yml"));

        let config = resolve(&args, &FeatureFlags::default()).unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].name, "node");
    }

    #[test]
    fn test_compose_path_next_to_descriptor() {
        let dir = TempDir::new().unwrap();
        let args = project(&dir);
        let descriptor = ProjectDescriptor::default();
        assert_eq!(
            compose_path(&args, &descriptor),
            dir.path().join("docker-compose.yml")
        );
        assert_eq!(
            Path::new(".lagoon.yml").parent().map(|p| p.join("docker-compose.yml")),
            Some(PathBuf::from("docker-compose.yml"))
        );
    }

    #[test]
    fn test_missing_descriptor() {
        let dir = TempDir::new().unwrap();
        let mut args = project(&dir);
        args.lagoon_yml = dir.path().join("missing.yml");

        let err = resolve(&args, &FeatureFlags::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read descriptor"));
    }

    #[test]
    fn test_invalid_arguments() {
        let dir = TempDir::new().unwrap();
        let mut args = project(&dir);
        args.branch = String::new();

        let err = resolve(&args, &FeatureFlags::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid build arguments"));
    }
}
