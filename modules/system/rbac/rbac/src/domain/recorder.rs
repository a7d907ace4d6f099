//! Authorizer middleware feeding the context's check recorder.

use std::sync::Arc;

use rbac_sdk::query::SqlConfig;
use rbac_sdk::{
    Action, AuthzContext, AuthzError, Authorizer, Expression, Object, PreparedAuthorizer,
    RecordedCheck, Subject,
};

/// Records every decision made through it. Errors other than denials are
/// not decisions and are not recorded.
pub struct RecordingAuthorizer {
    inner: Arc<dyn Authorizer>,
}

impl RecordingAuthorizer {
    #[must_use]
    pub fn new(inner: Arc<dyn Authorizer>) -> Self {
        Self { inner }
    }
}

fn record(ctx: &AuthzContext, action: &Action, object: &Object, result: &Result<(), AuthzError>) {
    let Some(recorder) = ctx.recorder() else {
        return;
    };
    let allowed = match result {
        Ok(()) => true,
        Err(e) if e.is_unauthorized() => false,
        Err(_) => return,
    };
    recorder.record(RecordedCheck {
        action: action.clone(),
        resource_type: object.resource_type.clone(),
        object_id: object.id.clone(),
        allowed,
    });
}

impl Authorizer for RecordingAuthorizer {
    fn authorize(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        object: &Object,
    ) -> Result<(), AuthzError> {
        let result = self.inner.authorize(ctx, subject, action, object);
        record(ctx, action, object, &result);
        result
    }

    fn prepare(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        resource_type: &str,
    ) -> Result<Box<dyn PreparedAuthorizer>, AuthzError> {
        let inner = self.inner.prepare(ctx, subject, action, resource_type)?;
        Ok(Box::new(RecordingPrepared {
            inner,
            action: action.clone(),
        }))
    }
}

struct RecordingPrepared {
    inner: Box<dyn PreparedAuthorizer>,
    action: Action,
}

impl PreparedAuthorizer for RecordingPrepared {
    fn authorize(&self, ctx: &AuthzContext, object: &Object) -> Result<(), AuthzError> {
        let result = self.inner.authorize(ctx, object);
        record(ctx, &self.action, object, &result);
        result
    }

    fn expression(&self) -> &Expression {
        self.inner.expression()
    }

    fn compile_to_sql(&self, cfg: &SqlConfig) -> Result<String, AuthzError> {
        self.inner.compile_to_sql(cfg)
    }
}
