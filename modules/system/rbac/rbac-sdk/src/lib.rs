#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! RBAC SDK
//!
//! This crate provides the public API for the `rbac` module:
//!
//! - [`Authorizer`], [`PreparedAuthorizer`] - Public API traits for consumers
//! - [`PolicyEngine`] - Backend trait for policy implementations
//! - [`Subject`], [`Object`], [`Role`], [`Scope`], [`Permission`] - Data model
//! - [`allowlist`] - Allow-list parsing, normalization, union and intersection
//! - [`query`] - Residuals, the compiled [`Expression`] AST and SQL rendering
//! - [`AuthzContext`] - Request-scoped cache, cancellation and check recording
//! - [`AuthzError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use rbac_sdk::{Action, AuthzContext, Object, SqlConfig, catalog::resource};
//!
//! let ctx = AuthzContext::builder().with_cache().build();
//!
//! // One concrete object
//! authorizer.authorize(&ctx, &subject, &Action::READ, &workspace.rbac_object())?;
//!
//! // Every workspace the subject may read, as a SQL predicate
//! let prepared = authorizer.prepare(&ctx, &subject, &Action::READ, resource::WORKSPACE)?;
//! let predicate = prepared.compile_to_sql(&SqlConfig::with_acl())?;
//! ```

pub mod allowlist;
pub mod api;
pub mod catalog;
pub mod context;
pub mod engine;
pub mod error;
pub mod models;
pub mod query;

// Re-export main types at crate root
pub use allowlist::{AllowListElement, MAX_ALLOW_LIST_SIZE};
pub use api::{Authorizer, PreparedAuthorizer};
pub use context::{AuthzContext, CheckRecorder, DecisionCache, RecordedCheck};
pub use engine::{DecisionTrace, Level, LevelTrace, PartialInput, PolicyEngine, PolicyInput};
pub use error::{
    AllowListError, AuthzError, CompileError, RegistryError, Unauthorized, ValidationError,
};
pub use models::{
    Action, Object, Permission, RbacObject, Role, RoleIdentifier, Scope, Subject, SubjectType,
    permissions,
};
pub use query::{Expression, PartialQueries, SqlConfig};
