//! Module bootstrap.

use std::sync::Arc;

use rbac_sdk::{Action, AuthzContext, AuthzError, Authorizer, RbacObject, Subject};
use tracing::info;

use crate::config::RbacConfig;
use crate::domain::filter::filter_with_threshold;
use crate::domain::roles::reload_builtin_roles;
use crate::domain::{Cacher, RbacAuthorizer, RecordingAuthorizer};

/// Rbac module.
///
/// This module:
/// 1. Rebuilds the built-in role table from the configured role options
/// 2. Builds the authorizer over the built-in policy
/// 3. Wraps it in the configured middleware, cache innermost so recorded
///    checks include cache hits
pub struct RbacModule {
    authorizer: Arc<dyn Authorizer>,
    filter_prepare_threshold: usize,
}

impl RbacModule {
    pub const MODULE_NAME: &'static str = "rbac";

    #[tracing::instrument(skip_all, fields(strict = cfg.strict))]
    #[must_use]
    pub fn init(cfg: &RbacConfig) -> Self {
        info!(
            strict = cfg.strict,
            cache = cfg.cache,
            record_checks = cfg.record_checks,
            filter_prepare_threshold = cfg.filter_prepare_threshold,
            no_owner_workspace_exec = cfg.roles.no_owner_workspace_exec,
            "Initializing {} module",
            Self::MODULE_NAME
        );

        reload_builtin_roles(&cfg.roles);

        let mut authorizer: Arc<dyn Authorizer> =
            Arc::new(RbacAuthorizer::builtin().with_strict(cfg.strict));
        if cfg.cache {
            authorizer = Arc::new(Cacher::new(authorizer));
        }
        if cfg.record_checks {
            authorizer = Arc::new(RecordingAuthorizer::new(authorizer));
        }

        info!("{} module initialized successfully", Self::MODULE_NAME);
        Self {
            authorizer,
            filter_prepare_threshold: cfg.filter_prepare_threshold,
        }
    }

    #[must_use]
    pub fn authorizer(&self) -> Arc<dyn Authorizer> {
        Arc::clone(&self.authorizer)
    }

    /// [`filter`](crate::domain::filter::filter) through this module's authorizer and threshold.
    ///
    /// # Errors
    /// Same as [`filter`](crate::domain::filter::filter).
    pub fn filter<O: RbacObject>(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        objects: Vec<O>,
    ) -> Result<Vec<O>, AuthzError> {
        filter_with_threshold(
            ctx,
            self.authorizer.as_ref(),
            subject,
            action,
            objects,
            self.filter_prepare_threshold,
        )
    }
}
