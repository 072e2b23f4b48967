//! Identify commands
//!
//! Print what a build would create without rendering any resources.

use anyhow::{Context, Result};

use forge_resolve::config::FeatureFlags;
use forge_resolve::services::BuildConfiguration;

use crate::cli::GeneratorArgs;
use crate::ui;

/// Print the primary ingress URL.
pub fn primary_ingress(args: &GeneratorArgs, flags: &FeatureFlags) -> Result<()> {
    let config = super::resolve(args, flags)?;
    if config.route.is_empty() {
        ui::print_warning("Environment has no routes");
    }
    println!("{}", config.route);
    Ok(())
}

/// Print the primary, secondary and autogenerated URLs as JSON.
pub fn ingress(args: &GeneratorArgs, flags: &FeatureFlags) -> Result<()> {
    let config = super::resolve(args, flags)?;
    println!("{}", render_ingress(&config)?);
    Ok(())
}

/// Print native cronjob names as a JSON list.
pub fn native_cronjobs(args: &GeneratorArgs, flags: &FeatureFlags) -> Result<()> {
    let config = super::resolve(args, flags)?;
    println!("{}", render_native_cronjobs(&config)?);
    Ok(())
}

fn render_ingress(config: &BuildConfiguration) -> Result<String> {
    serde_json::to_string(&config.route_summary()).context("Failed to serialize routes")
}

fn render_native_cronjobs(config: &BuildConfiguration) -> Result<String> {
    serde_json::to_string(&config.native_cronjob_names()).context("Failed to serialize cronjob names")
}
