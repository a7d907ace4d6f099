//! In-memory filtering of object lists.

use rbac_sdk::{Action, AuthzContext, AuthzError, Authorizer, Object, RbacObject, Subject};

/// From this many objects on, [`filter`] prepares once instead of
/// authorizing each object separately.
pub const FILTER_PREPARE_THRESHOLD: usize = 10;

/// Keep the objects `subject` may perform `action` on, in input order.
///
/// # Errors
/// - [`AuthzError::InvalidInput`] if the objects are not all of one type
/// - any non-denial error from the authorizer, which aborts the whole call
pub fn filter<O: RbacObject>(
    ctx: &AuthzContext,
    authorizer: &dyn Authorizer,
    subject: &Subject,
    action: &Action,
    objects: Vec<O>,
) -> Result<Vec<O>, AuthzError> {
    filter_with_threshold(
        ctx,
        authorizer,
        subject,
        action,
        objects,
        FILTER_PREPARE_THRESHOLD,
    )
}

/// [`filter`] with an explicit prepare threshold.
///
/// # Errors
/// Same as [`filter`].
pub fn filter_with_threshold<O: RbacObject>(
    ctx: &AuthzContext,
    authorizer: &dyn Authorizer,
    subject: &Subject,
    action: &Action,
    objects: Vec<O>,
    prepare_threshold: usize,
) -> Result<Vec<O>, AuthzError> {
    let rbac: Vec<Object> = objects.iter().map(RbacObject::rbac_object).collect();
    let Some(first) = rbac.first() else {
        return Ok(Vec::new());
    };
    let resource_type = first.resource_type.as_str();
    if let Some(other) = rbac.iter().find(|o| o.resource_type != resource_type) {
        return Err(AuthzError::InvalidInput(format!(
            "cannot filter mixed object types '{resource_type}' and '{}'",
            other.resource_type
        )));
    }

    let prepared = if rbac.len() >= prepare_threshold {
        Some(authorizer.prepare(ctx, subject, action, resource_type)?)
    } else {
        None
    };

    let total = objects.len();
    let mut kept = Vec::with_capacity(total);
    for (object, rbac_object) in objects.into_iter().zip(&rbac) {
        let result = match &prepared {
            Some(prepared) => prepared.authorize(ctx, rbac_object),
            None => authorizer.authorize(ctx, subject, action, rbac_object),
        };
        match result {
            Ok(()) => kept.push(object),
            Err(e) if e.is_unauthorized() => {}
            Err(e) => return Err(e),
        }
    }
    tracing::debug!(
        resource_type,
        total,
        kept = kept.len(),
        prepared = prepared.is_some(),
        "filtered objects"
    );
    Ok(kept)
}
