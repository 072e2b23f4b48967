//! Domain layer - pure business logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod fastly;
pub mod hostname;
pub mod resources;
pub mod route;
pub mod schedule;
pub mod service;

// Re-export commonly used types
pub use fastly::FastlyConfig;
pub use hostname::{generate, GeneratedDomain};
pub use resources::Resources;
pub use route::{Route, RouteDeclaration, RouteDefaults, RouteSet};
pub use schedule::Cronjob;
pub use service::{link, ServiceDescriptor};
