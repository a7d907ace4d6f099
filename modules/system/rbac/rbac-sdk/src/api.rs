use crate::context::AuthzContext;
use crate::error::AuthzError;
use crate::models::{Action, Object, Subject};
use crate::query::{Expression, SqlConfig};

/// Public authorization API.
///
/// Implementations are synchronous and CPU-bound. They must check
/// [`AuthzContext::ensure_active`] before doing any work.
pub trait Authorizer: Send + Sync {
    /// Decide whether `subject` may perform `action` on `object`.
    ///
    /// # Errors
    /// - [`AuthzError::Unauthorized`] if the policy denies the request
    /// - [`AuthzError::InvalidInput`] if the object is malformed
    /// - [`AuthzError::Cancelled`] if the request context is done
    fn authorize(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        object: &Object,
    ) -> Result<(), AuthzError>;

    /// Partially evaluate the policy for every object of `resource_type`.
    ///
    /// # Errors
    /// - [`AuthzError::Compile`] if the residual cannot be compiled
    /// - [`AuthzError::Cancelled`] if the request context is done
    fn prepare(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        resource_type: &str,
    ) -> Result<Box<dyn PreparedAuthorizer>, AuthzError>;
}

/// Result of [`Authorizer::prepare`]: one subject, action and object type.
pub trait PreparedAuthorizer: Send + Sync {
    /// Decide for one object of the prepared type.
    ///
    /// # Errors
    /// Same as [`Authorizer::authorize`]; objects of another type are
    /// rejected with [`AuthzError::InvalidInput`].
    fn authorize(&self, ctx: &AuthzContext, object: &Object) -> Result<(), AuthzError>;

    /// The compiled residual.
    fn expression(&self) -> &Expression;

    /// Render the residual as a SQL `WHERE` fragment.
    ///
    /// # Errors
    /// Returns [`AuthzError`] if the residual cannot be rendered.
    fn compile_to_sql(&self, cfg: &SqlConfig) -> Result<String, AuthzError> {
        Ok(self.expression().sql_string(cfg))
    }
}
