//! Request-scoped memoization of authorization decisions.

use std::sync::Arc;

use rbac_sdk::context::CacheKey;
use rbac_sdk::{
    Action, AuthzContext, AuthzError, Authorizer, Object, PreparedAuthorizer, Subject,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Authorizer middleware that replays decisions from the context's cache.
///
/// Without a cache in the context every call goes straight through.
pub struct Cacher {
    inner: Arc<dyn Authorizer>,
}

impl Cacher {
    #[must_use]
    pub fn new(inner: Arc<dyn Authorizer>) -> Self {
        Self { inner }
    }
}

#[derive(Serialize)]
struct KeyInput<'a> {
    subject: &'a Subject,
    action: &'a Action,
    object: &'a Object,
}

/// SHA-256 of the JSON form of the triple, or `None` if it cannot be serialized.
#[must_use]
pub fn cache_key(subject: &Subject, action: &Action, object: &Object) -> Option<CacheKey> {
    let input = KeyInput {
        subject,
        action,
        object,
    };
    match serde_json::to_vec(&input) {
        Ok(bytes) => Some(Sha256::digest(&bytes).into()),
        Err(e) => {
            tracing::warn!(error = %e, "cannot derive decision cache key, skipping cache");
            None
        }
    }
}

impl Authorizer for Cacher {
    fn authorize(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        object: &Object,
    ) -> Result<(), AuthzError> {
        ctx.ensure_active()?;
        let Some(cache) = ctx.cache() else {
            return self.inner.authorize(ctx, subject, action, object);
        };
        let Some(key) = cache_key(subject, action, object) else {
            return self.inner.authorize(ctx, subject, action, object);
        };
        if let Some(hit) = cache.get(&key) {
            tracing::debug!(key = %hex::encode(&key[..8]), "decision cache hit");
            return hit;
        }
        let result = self.inner.authorize(ctx, subject, action, object);
        cache.insert(key, &result);
        result
    }

    fn prepare(
        &self,
        ctx: &AuthzContext,
        subject: &Subject,
        action: &Action,
        resource_type: &str,
    ) -> Result<Box<dyn PreparedAuthorizer>, AuthzError> {
        self.inner.prepare(ctx, subject, action, resource_type)
    }
}
