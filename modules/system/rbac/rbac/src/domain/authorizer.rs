//! Authorizer backed by a [`PolicyEngine`].

use std::sync::Arc;

use rbac_sdk::catalog;
use rbac_sdk::query::compile;
use rbac_sdk::{
    Action, AuthzContext, AuthzError, Authorizer, Expression, Object, PartialInput,
    PartialQueries, PolicyEngine, PolicyInput, PreparedAuthorizer, RegistryError,
    RoleIdentifier, Subject, SubjectType,
};
use tracing::debug;

use super::policy::BuiltinPolicy;
use super::roles::roles_by_names;
use super::scopes::expand_scope;

/// Evaluates requests with a policy engine.
#[derive(Clone)]
pub struct RbacAuthorizer {
    engine: Arc<dyn PolicyEngine>,
    strict: bool,
}

impl RbacAuthorizer {
    #[must_use]
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self {
            engine,
            strict: false,
        }
    }

    /// Authorizer over the [`BuiltinPolicy`].
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(Arc::new(BuiltinPolicy))
    }

    /// Reject actions the object type does not support instead of denying them.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl std::fmt::Debug for RbacAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacAuthorizer")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

fn check_action(strict: bool, resource_type: &str, action: &Action) -> Result<(), AuthzError> {
    if resource_type.is_empty() {
        return Err(AuthzError::InvalidInput("object type is empty".to_owned()));
    }
    if strict && !catalog::is_valid_action(resource_type, action) {
        return Err(AuthzError::InvalidInput(format!(
            "action '{action}' is not valid for resource type '{resource_type}'"
        )));
    }
    Ok(())
}

fn check_object(strict: bool, action: &Action, object: &Object) -> Result<(), AuthzError> {
    if object.any_org && object.has_org() {
        return Err(AuthzError::InvalidInput(format!(
            "object cannot be both any_org and owned by organization '{}'",
            object.org_id
        )));
    }
    check_action(strict, &object.resource_type, action)
}

fn subject_kind(subject: &Subject) -> &'static str {
    match subject.subject_type {
        SubjectType::User => "user",
        SubjectType::Service => "service",
        SubjectType::System => "system",
    }
}

fn decide(
    engine: &dyn PolicyEngine,
    subject: &Subject,
    action: &Action,
    object: &Object,
) -> Result<(), AuthzError> {
    let trace = engine.evaluate(&PolicyInput {
        subject,
        action,
        object,
    });
    if trace.allowed {
        debug!("authorized");
        return Ok(());
    }
    debug!(reason = trace.reason(), "denied");
    Err(AuthzError::unauthorized(
        subject,
        action,
        object,
        trace.reason(),
        Some(trace),
    ))
}

impl Authorizer for RbacAuthorizer {
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            subject = %subject.id,
            subject_type = subject_kind(subject),
            action = %action,
            resource_type = %object.resource_type,
            object_id = %object.id,
        )
    )]
    fn authorize(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        object: &Object,
    ) -> Result<(), AuthzError> {
        ctx.ensure_active()?;
        check_object(self.strict, action, object)?;
        decide(self.engine.as_ref(), subject, action, object)
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(subject = %subject.id, action = %action, resource_type = %resource_type)
    )]
    fn prepare(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        resource_type: &str,
    ) -> Result<Box<dyn PreparedAuthorizer>, AuthzError> {
        ctx.ensure_active()?;
        check_action(self.strict, resource_type, action)?;

        let residual = self.engine.partial(&PartialInput {
            subject,
            action,
            resource_type,
        });
        let expression = compile(&residual)?;
        debug!(queries = residual.queries.len(), "prepared residual");

        Ok(Box::new(RbacPreparedAuthorizer {
            subject: subject.clone(),
            action: action.clone(),
            resource_type: resource_type.to_owned(),
            residual,
            expression,
            engine: Arc::clone(&self.engine),
            strict: self.strict,
        }))
    }
}

/// A residual compiled for one subject, action and object type.
pub struct RbacPreparedAuthorizer {
    subject: Subject,
    action: Action,
    resource_type: String,
    residual: PartialQueries,
    expression: Expression,
    engine: Arc<dyn PolicyEngine>,
    strict: bool,
}

impl RbacPreparedAuthorizer {
    /// The raw residual the expression was compiled from.
    #[must_use]
    pub fn residual(&self) -> &PartialQueries {
        &self.residual
    }
}

impl PreparedAuthorizer for RbacPreparedAuthorizer {
    fn authorize(&self, ctx: &AuthzContext, object: &Object) -> Result<(), AuthzError> {
        ctx.ensure_active()?;
        if object.resource_type != self.resource_type {
            return Err(AuthzError::InvalidInput(format!(
                "prepared for '{}' objects, got '{}'",
                self.resource_type, object.resource_type
            )));
        }
        check_object(self.strict, &self.action, object)?;

        // The residual binds any_org to false.
        if object.any_org {
            return decide(self.engine.as_ref(), &self.subject, &self.action, object);
        }
        if self.expression.eval(object) {
            Ok(())
        } else {
            Err(AuthzError::unauthorized(
                &self.subject,
                &self.action,
                object,
                "prepared residual rejected the object",
                None,
            ))
        }
    }

    fn expression(&self) -> &Expression {
        &self.expression
    }
}

/// Subject as it arrives from the authentication layer: names only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectNames {
    pub id: String,
    pub roles: Vec<RoleIdentifier>,
    pub groups: Vec<String>,
    pub scope: String,
    pub subject_type: SubjectType,
}

impl SubjectNames {
    /// Expand role and scope names through the registry.
    ///
    /// # Errors
    /// Returns the first [`RegistryError`] for an unknown role or scope.
    pub fn expand(&self) -> Result<Subject, RegistryError> {
        let roles = roles_by_names(&self.roles)?;
        let scope = expand_scope(&self.scope)?;
        Ok(Subject::new(self.id.clone(), roles, scope)
            .with_groups(self.groups.clone())
            .with_type(self.subject_type))
    }
}

fn expand_names(names: &SubjectNames) -> Result<Subject, AuthzError> {
    names.expand().map_err(|e| {
        tracing::warn!(subject = %names.id, error = %e, "rejected subject with unresolvable names");
        AuthzError::from(e)
    })
}

/// [`Authorizer::authorize`] for a subject given by role and scope names.
///
/// # Errors
/// Registry errors for unknown names, otherwise whatever `authorizer` returns.
pub fn authorize_by_role_name(
    authorizer: &dyn Authorizer,
    ctx: &AuthzContext,
    names: &SubjectNames,
    action: &Action,
    object: &Object,
) -> Result<(), AuthzError> {
    let subject = expand_names(names)?;
    authorizer.authorize(ctx, &subject, action, object)
}

/// [`Authorizer::prepare`] for a subject given by role and scope names.
///
/// # Errors
/// Registry errors for unknown names, otherwise whatever `authorizer` returns.
pub fn prepare_by_role_name(
    authorizer: &dyn Authorizer,
    ctx: &AuthzContext,
    names: &SubjectNames,
    action: &Action,
    resource_type: &str,
) -> Result<Box<dyn PreparedAuthorizer>, AuthzError> {
    let subject = expand_names(names)?;
    authorizer.prepare(ctx, &subject, action, resource_type)
}
