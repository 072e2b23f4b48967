//! Services layer - orchestration logic
//!
//! This module coordinates the config inputs and the pure domain logic into
//! one resolution pass.

pub mod assembler;
pub mod backup;
pub mod build_values;
pub mod route_generator;

// Re-export commonly used types
pub use assembler::{assemble, RouteSummary};
pub use backup::BackupConfiguration;
pub use build_values::{BuildConfiguration, MonitoringConfig, PodSecurityContext};
pub use route_generator::{AutogeneratedRoutes, RouteGenerator};
