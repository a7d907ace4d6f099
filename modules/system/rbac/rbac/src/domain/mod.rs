//! Domain layer for the rbac module.

pub mod authorizer;
pub mod cache;
pub mod filter;
pub mod partial;
pub mod policy;
pub mod recorder;
pub mod roles;
pub mod scopes;

pub use authorizer::{
    RbacAuthorizer, RbacPreparedAuthorizer, SubjectNames, authorize_by_role_name,
    prepare_by_role_name,
};
pub use cache::Cacher;
pub use filter::{FILTER_PREPARE_THRESHOLD, filter, filter_with_threshold};
pub use policy::BuiltinPolicy;
pub use recorder::RecordingAuthorizer;
pub use roles::RoleOptions;
