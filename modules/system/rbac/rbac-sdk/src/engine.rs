//! Policy engine contract.
//!
//! The engine is the swappable backend behind every authorizer: it computes
//! full decisions for concrete objects and residual queries for object types.

use serde::Serialize;

use crate::models::{Action, Object, Subject};
use crate::query::PartialQueries;

/// Outcome of one permission level (site, org or user).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// A matching permission was negated.
    Deny,
    /// No permission at this level matched.
    #[default]
    Abstain,
    /// At least one permission matched and none was negated.
    Allow,
}

/// Per-level results for one set of roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelTrace {
    pub site: Level,
    pub org: Level,
    pub user: Level,
    /// The subject is a member of the object's org, or the object has none.
    pub org_ok: bool,
    pub allowed: bool,
}

/// Full record of how a decision was reached. Kept for server-side logs only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionTrace {
    pub roles: LevelTrace,
    pub scope: LevelTrace,
    pub acl: bool,
    pub allow_list: bool,
    pub allowed: bool,
}

impl DecisionTrace {
    /// Short description of the first failing check.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        if self.allowed {
            "allowed"
        } else if !self.roles.allowed && !self.acl {
            "no role or acl entry grants the action"
        } else if !self.allow_list {
            "object is outside the scope allow list"
        } else {
            "scope does not grant the action"
        }
    }
}

/// Input of a full evaluation.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub subject: &'a Subject,
    pub action: &'a Action,
    pub object: &'a Object,
}

/// Input of a partial evaluation: only the object type is known.
#[derive(Debug, Clone, Copy)]
pub struct PartialInput<'a> {
    pub subject: &'a Subject,
    pub action: &'a Action,
    pub resource_type: &'a str,
}

/// A policy implementation.
///
/// Implementations must be pure: the same input always yields the same
/// output, and a residual evaluated against an object must agree with the
/// full evaluation of that object.
pub trait PolicyEngine: Send + Sync {
    /// Decide for a concrete object.
    fn evaluate(&self, input: &PolicyInput<'_>) -> DecisionTrace;

    /// Produce the residual for every object of `input.resource_type`.
    ///
    /// The residual treats the object's id, owner, organization and ACLs as
    /// unknown, and assumes the object is not marked `any_org`.
    fn partial(&self, input: &PartialInput<'_>) -> PartialQueries;
}
