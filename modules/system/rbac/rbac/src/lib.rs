//! Rbac Module
//!
//! Role-based authorization over the `rbac-sdk` contract: the built-in role
//! and scope registry, the built-in policy with full and partial evaluation,
//! and the cache and recorder middleware around it.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use config::{ConfigError, RbacConfig};
pub use module::RbacModule;
