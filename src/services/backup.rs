//! Backup schedule and retention for an environment.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::descriptor::ProjectDescriptor;
use crate::config::variables::{VariableSet, SCOPE_BUILD, SCOPE_GLOBAL};
use crate::config::BuildType;
use crate::domain::schedule::convert_schedule;
use crate::error::ConfigError;

pub const DEFAULT_BACKUP_SCHEDULE: &str = "M H(22-2) * * *";
pub const DEV_SCHEDULE_VARIABLE: &str = "LAGOON_BACKUP_DEV_SCHEDULE";
pub const PR_SCHEDULE_VARIABLE: &str = "LAGOON_BACKUP_PR_SCHEDULE";
const MAINTENANCE_SCHEDULE: &str = "@weekly-random";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneRetention {
    pub hourly: u32,
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
}

impl Default for PruneRetention {
    fn default() -> Self {
        Self {
            hourly: 0,
            daily: 7,
            weekly: 6,
            monthly: 1,
        }
    }
}

/// Converted schedules and retention handed to the backup operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfiguration {
    pub backup_schedule: String,
    pub check_schedule: String,
    pub prune_schedule: String,
    pub prune_retention: PruneRetention,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub k8up_version: String,
}

/// Environment facts that select the backup settings
#[derive(Debug, Clone, Copy)]
pub struct BackupInputs<'a> {
    /// Seed for schedule placeholders
    pub seed: &'a str,
    pub production: bool,
    pub build_type: BuildType,
    /// Cluster default schedule, `M H(22-2) * * *` when empty
    pub default_schedule: &'a str,
    pub k8up_version: &'a str,
}

impl BackupConfiguration {
    pub fn resolve(
        inputs: BackupInputs<'_>,
        descriptor: &ProjectDescriptor,
        variables: &VariableSet,
    ) -> Result<Self, ConfigError> {
        let scopes: &[&str] = &[SCOPE_BUILD, SCOPE_GLOBAL];
        let mut schedule = if inputs.default_schedule.trim().is_empty() {
            DEFAULT_BACKUP_SCHEDULE.to_string()
        } else {
            inputs.default_schedule.to_string()
        };
        let mut retention = PruneRetention::default();

        if inputs.production {
            if let Some(production) = descriptor
                .backup_schedule
                .as_ref()
                .and_then(|s| s.production.as_ref())
                .filter(|s| !s.is_empty())
            {
                debug!(schedule = %production, "Using production backup schedule from descriptor");
                schedule = production.clone();
            }
            if let Some(values) = descriptor
                .backup_retention
                .as_ref()
                .and_then(|r| r.production.as_ref())
            {
                retention.hourly = values.hourly.unwrap_or(retention.hourly);
                retention.daily = values.daily.unwrap_or(retention.daily);
                retention.weekly = values.weekly.unwrap_or(retention.weekly);
                retention.monthly = values.monthly.unwrap_or(retention.monthly);
            }
        } else {
            let variable = match inputs.build_type {
                BuildType::Pullrequest => PR_SCHEDULE_VARIABLE,
                BuildType::Branch | BuildType::Promote => DEV_SCHEDULE_VARIABLE,
            };
            if let Some(value) = variables.value(variable, Some(scopes)).filter(|v| !v.is_empty()) {
                debug!(schedule = %value, "Using backup schedule from {}", variable);
                schedule = value.to_string();
            }
        }

        Ok(Self {
            backup_schedule: convert_schedule(inputs.seed, &schedule)?,
            check_schedule: convert_schedule(inputs.seed, MAINTENANCE_SCHEDULE)?,
            prune_schedule: convert_schedule(inputs.seed, MAINTENANCE_SCHEDULE)?,
            prune_retention: retention,
            k8up_version: inputs.k8up_version.to_string(),
        })
    }
}
