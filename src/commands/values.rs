//! Values command
//!
//! Prints the full resolved build configuration as JSON.

use anyhow::{Context, Result};

use forge_resolve::config::FeatureFlags;
use forge_resolve::services::BuildConfiguration;

use crate::cli::GeneratorArgs;

pub fn execute(args: &GeneratorArgs, flags: &FeatureFlags) -> Result<()> {
    let config = super::resolve(args, flags)?;
    println!("{}", render(&config)?);
    Ok(())
}

fn render(config: &BuildConfiguration) -> Result<String> {
    serde_json::to_string_pretty(config).context("Failed to serialize build configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::resolve;
    use crate::commands::tests::project;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn test_values_json() {
        let dir = TempDir::new().unwrap();
        let config = resolve(&project(&dir), &FeatureFlags::default()).unwrap();

        let json: Value = serde_json::from_str(&render(&config).unwrap()).unwrap();
        assert_eq!(json["project"], "example-project");
        assert_eq!(json["environment"], "main");
        assert_eq!(json["route"], "https://example.com");
        assert_eq!(json["monitoring"]["enabled"], true);
        assert!(json.get("variables").is_none());
    }

    #[test]
    fn test_flags_reach_values() {
        let dir = TempDir::new().unwrap();
        let flags = FeatureFlags::default().with_forced("ROOTLESS_WORKLOAD", "enabled");
        let config = resolve(&project(&dir), &flags).unwrap();

        let json: Value = serde_json::from_str(&render(&config).unwrap()).unwrap();
        assert_eq!(json["podSecurityContext"]["runAsUser"], 10000);
    }
}
