//! Error types for the rbac module.

use thiserror::Error;

use crate::engine::DecisionTrace;
use crate::models::{Action, Object, Subject};

/// Malformed role names, permissions or scope strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("role name is empty")]
    EmptyRoleName,

    #[error("role name '{0}' has too many colons")]
    TooManyColons(String),

    #[error("role '{name}' has an invalid organization id '{org_id}'")]
    InvalidOrgId { name: String, org_id: String },

    #[error("unknown resource type '{0}'")]
    UnknownResource(String),

    #[error("action '{action}' is not valid for resource type '{resource_type}'")]
    InvalidAction {
        resource_type: String,
        action: String,
    },

    #[error("site role '{0}' must not carry organization permissions")]
    SiteRoleWithOrgPermissions(String),

    #[error("invalid role '{role}': {}", join(.reasons))]
    InvalidRole {
        role: String,
        reasons: Vec<ValidationError>,
    },

    #[error("scope name is empty")]
    EmptyScope,

    #[error("scope '{0}' must have the form resource:action")]
    MalformedScope(String),

    #[error("scope '{0}' cannot be requested externally")]
    InternalScope(String),

    #[error("{0} must not be nil")]
    NilId(&'static str),
}

fn join(reasons: &[ValidationError]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Allow-list parsing and size errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error("allow list has {count} entries, the maximum is {max}")]
    TooManyEntries { count: usize, max: usize },

    #[error("allow list entry is empty")]
    EmptyEntry,

    #[error("allow list entry '{0}' must have the form type:id")]
    MissingSeparator(String),

    #[error("allow list entry '{0}' names an unknown resource type")]
    UnknownResourceType(String),

    #[error("allow list entry '{0}' has an id that is neither a uuid nor '*'")]
    InvalidId(String),
}

/// Role and scope lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("role '{0}' not found")]
    UnknownRole(String),

    #[error("role '{0}' expects an organization id")]
    MissingOrgId(String),

    #[error("role '{0}' is a site role and takes no organization id")]
    UnexpectedOrgId(String),

    #[error("scope '{0}' not found")]
    UnknownScope(String),

    #[error(transparent)]
    Malformed(#[from] ValidationError),

    #[error(transparent)]
    AllowList(#[from] AllowListError),
}

/// A residual that cannot be expressed with the supported expression nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("residual has {0} support rules, which cannot be compiled")]
    UnsupportedSupportRules(usize),

    #[error("operator {0} not supported")]
    UnsupportedOperator(String),

    #[error("{0} terms are not supported")]
    UnsupportedTerm(&'static str),

    #[error("operator {operator} expects {expected} operands, got {actual}")]
    WrongOperandCount {
        operator: String,
        expected: usize,
        actual: usize,
    },

    #[error("expression '{0}' is not boolean")]
    NonBooleanTerm(String),

    #[error("reference '{0}' must start with a variable")]
    InvalidReference(String),
}

/// Errors returned by authorizers.
///
/// Only [`AuthzError::Unauthorized`] means the policy said no. Everything else
/// is a failure to reach a decision and must not be treated as a denial by
/// callers that filter results.
#[derive(Debug, Clone, Error)]
pub enum AuthzError {
    #[error(transparent)]
    Unauthorized(Box<Unauthorized>),

    #[error("invalid authorization input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("compile residual: {0}")]
    Compile(#[from] CompileError),

    #[error("authorization aborted: request cancelled")]
    Cancelled,
}

impl AuthzError {
    #[must_use]
    pub fn unauthorized(
        subject: &Subject,
        action: &Action,
        object: &Object,
        internal: impl Into<String>,
        trace: Option<DecisionTrace>,
    ) -> Self {
        Self::Unauthorized(Box::new(Unauthorized {
            subject: subject.clone(),
            action: action.clone(),
            object: object.clone(),
            internal: internal.into(),
            trace,
        }))
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// A denial.
///
/// `Display` only ever yields the public message; the internal cause, inputs
/// and decision trace are available through accessors for server-side logs.
#[derive(Debug, Clone, Error)]
#[error("{}", Unauthorized::PUBLIC_MESSAGE)]
pub struct Unauthorized {
    subject: Subject,
    action: Action,
    object: Object,
    internal: String,
    trace: Option<DecisionTrace>,
}

impl Unauthorized {
    pub const PUBLIC_MESSAGE: &'static str = "forbidden";

    #[must_use]
    pub fn internal(&self) -> &str {
        &self.internal
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }

    #[must_use]
    pub fn object(&self) -> &Object {
        &self.object
    }

    #[must_use]
    pub fn trace(&self) -> Option<&DecisionTrace> {
        self.trace.as_ref()
    }
}
