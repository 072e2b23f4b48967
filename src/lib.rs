//! forge-resolve
//!
//! Resolves the layered build inputs of one application environment
//! (compose manifest, project descriptor, API variables and cluster feature
//! flags) into a single [`BuildConfiguration`](services::BuildConfiguration).

pub mod config;
pub mod domain;
pub mod error;
pub mod services;

pub use error::{ResolveError, Result};
