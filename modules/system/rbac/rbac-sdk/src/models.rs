//! Value types of the authorization model.
//!
//! Everything here is plain data: roles, scopes, subjects and objects are
//! built per request (or once at startup for the built-in roles) and never
//! mutated afterwards.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allowlist::{self, AllowListElement};
use crate::catalog::{self, WILDCARD};
use crate::error::ValidationError;

/// An action requested against a resource, e.g. `read` or `ssh`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    pub const WILDCARD: Self = Self::from_static(WILDCARD);
    pub const CREATE: Self = Self::from_static("create");
    pub const READ: Self = Self::from_static("read");
    pub const UPDATE: Self = Self::from_static("update");
    pub const DELETE: Self = Self::from_static("delete");
    pub const ASSIGN: Self = Self::from_static("assign");
    pub const SSH: Self = Self::from_static("ssh");
    pub const APPLICATION_CONNECT: Self = Self::from_static("application_connect");
    pub const START: Self = Self::from_static("start");
    pub const STOP: Self = Self::from_static("stop");
    pub const VIEW_INSIGHTS: Self = Self::from_static("view_insights");
    pub const USE: Self = Self::from_static("use");
    pub const READ_PERSONAL: Self = Self::from_static("read_personal");
    pub const UPDATE_PERSONAL: Self = Self::from_static("update_personal");

    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Whether a granted action covers the requested one.
    #[must_use]
    pub fn covers(&self, requested: &Action) -> bool {
        self.is_wildcard() || self == requested
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A single grant (or denial) of an action on a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default)]
    pub negate: bool,
    pub resource_type: String,
    pub action: Action,
}

impl Permission {
    #[must_use]
    pub fn allow(resource_type: impl Into<String>, action: Action) -> Self {
        Self {
            negate: false,
            resource_type: resource_type.into(),
            action,
        }
    }

    #[must_use]
    pub fn deny(resource_type: impl Into<String>, action: Action) -> Self {
        Self {
            negate: true,
            resource_type: resource_type.into(),
            action,
        }
    }

    /// Whether this permission applies to `action` on `resource_type`,
    /// honoring wildcards on either field.
    #[must_use]
    pub fn matches(&self, resource_type: &str, action: &Action) -> bool {
        (self.resource_type == WILDCARD || self.resource_type == resource_type)
            && self.action.covers(action)
    }

    /// Check the permission against the catalog.
    ///
    /// # Errors
    /// Returns [`ValidationError`] if the resource type is unknown or does not
    /// support the action.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(def) = catalog::resource(&self.resource_type) else {
            return Err(ValidationError::UnknownResource(self.resource_type.clone()));
        };
        if !def.supports(&self.action) {
            return Err(ValidationError::InvalidAction {
                resource_type: self.resource_type.clone(),
                action: self.action.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("-")?;
        }
        write!(f, "{}:{}", self.resource_type, self.action)
    }
}

/// Build allow permissions from `(resource_type, actions)` pairs.
///
/// The result is sorted by resource type, then action, and free of duplicates
/// so that roles built from the same grants compare and hash equal.
#[must_use]
pub fn permissions(grants: &[(&str, &[Action])]) -> Vec<Permission> {
    let set: BTreeSet<Permission> = grants
        .iter()
        .flat_map(|(resource_type, actions)| {
            actions
                .iter()
                .map(move |action| Permission::allow(*resource_type, action.clone()))
        })
        .collect();
    set.into_iter().collect()
}

/// Unique name of a role: a base name, plus an organization for org roles.
///
/// The textual form is `name` or `name:<org-uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleIdentifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
}

impl RoleIdentifier {
    #[must_use]
    pub fn site(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            organization_id: None,
        }
    }

    #[must_use]
    pub fn org(name: impl Into<String>, organization_id: Uuid) -> Self {
        Self {
            name: name.into(),
            organization_id: Some(organization_id),
        }
    }

    #[must_use]
    pub fn is_org_role(&self) -> bool {
        self.organization_id.is_some()
    }
}

impl fmt::Display for RoleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.organization_id {
            Some(org) => write!(f, "{}:{org}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for RoleIdentifier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (name, org) = match parts.as_slice() {
            [name] => (*name, None),
            [name, org] => (*name, Some(*org)),
            _ => return Err(ValidationError::TooManyColons(s.to_owned())),
        };
        if name.is_empty() {
            return Err(ValidationError::EmptyRoleName);
        }
        let organization_id = org
            .map(|org| {
                Uuid::parse_str(org).map_err(|_| ValidationError::InvalidOrgId {
                    name: name.to_owned(),
                    org_id: org.to_owned(),
                })
            })
            .transpose()?;
        Ok(Self {
            name: name.to_owned(),
            organization_id,
        })
    }
}

/// A named bundle of permissions at the site, organization and user levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub identifier: RoleIdentifier,
    pub display_name: String,
    /// Applies platform-wide.
    #[serde(default)]
    pub site: Vec<Permission>,
    /// Keyed by organization id; applies only to objects in that organization.
    #[serde(default)]
    pub org: BTreeMap<String, Vec<Permission>>,
    /// Applies only to objects owned by the subject.
    #[serde(default)]
    pub user: Vec<Permission>,
}

impl Role {
    #[must_use]
    pub fn is_org_role(&self) -> bool {
        self.identifier.is_org_role()
    }

    /// Organization-level permissions for `org_id`, empty if the role has none.
    #[must_use]
    pub fn org_permissions(&self, org_id: &str) -> &[Permission] {
        self.org.get(org_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Validate every permission of the role against the catalog.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidRole`] listing every problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut reasons = Vec::new();
        if !self.is_org_role() && !self.org.is_empty() {
            reasons.push(ValidationError::SiteRoleWithOrgPermissions(
                self.identifier.to_string(),
            ));
        }
        let all = self
            .site
            .iter()
            .chain(self.org.values().flatten())
            .chain(self.user.iter());
        reasons.extend(all.filter_map(|p| p.validate().err()));

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::InvalidRole {
                role: self.identifier.to_string(),
                reasons,
            })
        }
    }
}

/// A role-shaped restriction plus the concrete resources it may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub role: Role,
    pub allow_id_list: Vec<AllowListElement>,
}

impl Scope {
    #[must_use]
    pub fn name(&self) -> &RoleIdentifier {
        &self.role.identifier
    }

    /// Whether the allow-list admits `object`.
    #[must_use]
    pub fn allows(&self, object: &Object) -> bool {
        allowlist::matches_any(&self.allow_id_list, object)
    }
}

/// Kind of identity behind a subject. Only used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    #[default]
    User,
    Service,
    System,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub groups: Vec<String>,
    pub scope: Scope,
    #[serde(default)]
    pub subject_type: SubjectType,
}

impl Subject {
    #[must_use]
    pub fn new(id: impl Into<String>, roles: Vec<Role>, scope: Scope) -> Self {
        Self {
            id: id.into(),
            roles,
            groups: Vec::new(),
            scope,
            subject_type: SubjectType::default(),
        }
    }

    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    #[must_use]
    pub fn with_type(mut self, subject_type: SubjectType) -> Self {
        self.subject_type = subject_type;
        self
    }

    /// Organizations the subject belongs to: every org id keyed in any role.
    #[must_use]
    pub fn org_memberships(&self) -> BTreeSet<&str> {
        self.roles
            .iter()
            .flat_map(|r| r.org.keys())
            .map(String::as_str)
            .filter(|org| !org.is_empty())
            .collect()
    }

    pub fn role_names(&self) -> impl Iterator<Item = &RoleIdentifier> {
        self.roles.iter().map(|r| &r.identifier)
    }

    /// Identity equality: same id, scope, role names and group set.
    ///
    /// Role bodies are not compared, only their identifiers.
    #[must_use]
    pub fn equal(&self, other: &Self) -> bool {
        if self.id != other.id || self.scope.name() != other.scope.name() {
            return false;
        }
        let roles: BTreeSet<_> = self.role_names().collect();
        let other_roles: BTreeSet<_> = other.role_names().collect();
        let groups: BTreeSet<_> = self.groups.iter().collect();
        let other_groups: BTreeSet<_> = other.groups.iter().collect();
        roles == other_roles && groups == other_groups
    }
}

/// The resource being checked.
///
/// Empty strings mean "not set": an object without an id is one about to be
/// created, an object without an org is platform-wide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, rename = "org_owner")]
    pub org_id: String,
    /// Matches whichever organization the subject belongs to.
    #[serde(default)]
    pub any_org: bool,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub acl_user_list: BTreeMap<String, Vec<Action>>,
    #[serde(default)]
    pub acl_group_list: BTreeMap<String, Vec<Action>>,
}

impl Object {
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    #[must_use]
    pub fn in_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    #[must_use]
    pub fn any_organization(mut self) -> Self {
        self.any_org = true;
        self
    }

    #[must_use]
    pub fn with_acl_user_list(mut self, acl: BTreeMap<String, Vec<Action>>) -> Self {
        self.acl_user_list = acl;
        self
    }

    #[must_use]
    pub fn with_group_acl(mut self, acl: BTreeMap<String, Vec<Action>>) -> Self {
        self.acl_group_list = acl;
        self
    }

    #[must_use]
    pub fn has_org(&self) -> bool {
        !self.org_id.is_empty()
    }

    /// Check that `action` is one the object's type supports.
    ///
    /// # Errors
    /// Returns [`ValidationError`] for unknown types or unsupported actions.
    pub fn valid_action(&self, action: &Action) -> Result<(), ValidationError> {
        Permission::allow(self.resource_type.clone(), action.clone()).validate()
    }
}

/// Anything that can be checked by the authorizer.
pub trait RbacObject {
    fn rbac_object(&self) -> Object;
}

impl RbacObject for Object {
    fn rbac_object(&self) -> Object {
        self.clone()
    }
}
