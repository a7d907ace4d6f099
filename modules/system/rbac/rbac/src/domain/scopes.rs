//! Scope expansion.
//!
//! A scope name is either one of the built-in high-level scopes or a
//! low-level `resource:action` pair checked against the permission catalog.

use std::collections::BTreeMap;

use rbac_sdk::catalog::{WILDCARD, resource};
use rbac_sdk::{
    Action, AllowListElement, Permission, RegistryError, Role, RoleIdentifier, Scope,
    ValidationError, allowlist, permissions,
};
use uuid::Uuid;

pub const SCOPE_ALL: &str = "all";
pub const SCOPE_APPLICATION_CONNECT: &str = "application_connect";

/// Name of the scope built by [`workspace_agent_scope`].
pub const SCOPE_WORKSPACE_AGENT: &str = "workspace_agent";

/// Low-level scopes end users may request for their tokens.
///
/// Sorted. Every other structurally valid `resource:action` is internal-only.
const EXTERNAL_LOW_LEVEL: &[&str] = &[
    "api_key:delete",
    "api_key:read",
    "file:create",
    "file:read",
    "group:read",
    "organization:read",
    "template:read",
    "template:use",
    "user:read",
    "user:read_personal",
    "user:update_personal",
    "workspace:application_connect",
    "workspace:create",
    "workspace:delete",
    "workspace:read",
    "workspace:ssh",
    "workspace:start",
    "workspace:stop",
    "workspace:update",
];

fn scope_role(name: &str, display_name: &str, site: Vec<Permission>) -> Role {
    Role {
        identifier: RoleIdentifier::site(name),
        display_name: display_name.to_owned(),
        site,
        org: BTreeMap::new(),
        user: Vec::new(),
    }
}

fn unrestricted(role: Role) -> Scope {
    Scope {
        role,
        allow_id_list: vec![AllowListElement::all()],
    }
}

/// Expand a scope name into a role plus allow-list.
///
/// # Errors
/// - [`RegistryError::Malformed`] for empty or malformed `resource:action`
///   strings, unknown resources and unsupported actions
/// - [`RegistryError::UnknownScope`] for a bare name that is not built in
pub fn expand_scope(name: &str) -> Result<Scope, RegistryError> {
    match name {
        "" => Err(ValidationError::EmptyScope.into()),
        SCOPE_ALL => Ok(unrestricted(scope_role(
            SCOPE_ALL,
            "All operations",
            vec![Permission::allow(WILDCARD, Action::WILDCARD)],
        ))),
        SCOPE_APPLICATION_CONNECT => Ok(unrestricted(scope_role(
            SCOPE_APPLICATION_CONNECT,
            "Ability to connect to applications",
            vec![Permission::allow(
                resource::WORKSPACE,
                Action::APPLICATION_CONNECT,
            )],
        ))),
        _ if name.contains(':') => expand_low_level(name),
        _ => Err(RegistryError::UnknownScope(name.to_owned())),
    }
}

fn expand_low_level(name: &str) -> Result<Scope, RegistryError> {
    let parts: Vec<&str> = name.split(':').collect();
    let [resource_type, action] = parts.as_slice() else {
        return Err(ValidationError::MalformedScope(name.to_owned()).into());
    };
    if resource_type.is_empty() || action.is_empty() || *resource_type == WILDCARD {
        return Err(ValidationError::MalformedScope(name.to_owned()).into());
    }
    let permission = Permission::allow(*resource_type, Action::new(*action));
    permission.validate()?;
    Ok(unrestricted(scope_role(
        name,
        &format!("Scope {name}"),
        vec![permission],
    )))
}

/// Whether `name` may be requested by end users.
#[must_use]
pub fn is_external_scope(name: &str) -> bool {
    matches!(name, SCOPE_ALL | SCOPE_APPLICATION_CONNECT)
        || EXTERNAL_LOW_LEVEL.binary_search(&name).is_ok()
}

/// Every externally requestable scope name, sorted.
#[must_use]
pub fn external_scope_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = EXTERNAL_LOW_LEVEL.to_vec();
    names.extend([SCOPE_ALL, SCOPE_APPLICATION_CONNECT]);
    names.sort_unstable();
    names
}

/// Expand a scope requested from outside, rejecting internal-only names.
///
/// # Errors
/// Returns [`ValidationError::InternalScope`] for valid scopes that are not
/// externally requestable, or any [`expand_scope`] error.
pub fn expand_external_scope(name: &str) -> Result<Scope, RegistryError> {
    let scope = expand_scope(name)?;
    if !is_external_scope(name) {
        tracing::warn!(scope = name, "rejected request for internal scope");
        return Err(ValidationError::InternalScope(name.to_owned()).into());
    }
    Ok(scope)
}

/// Identifiers a workspace agent token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceAgentScopeParams {
    pub workspace_id: Uuid,
    pub owner_id: Uuid,
    pub template_id: Uuid,
}

/// Scope of a workspace agent: its own workspace, owner and template only.
///
/// # Errors
/// Returns [`ValidationError::NilId`] if any id is nil.
pub fn workspace_agent_scope(params: WorkspaceAgentScopeParams) -> Result<Scope, RegistryError> {
    for (field, id) in [
        ("workspace_id", params.workspace_id),
        ("owner_id", params.owner_id),
        ("template_id", params.template_id),
    ] {
        if id.is_nil() {
            return Err(ValidationError::NilId(field).into());
        }
    }

    let role = scope_role(
        SCOPE_WORKSPACE_AGENT,
        "Workspace agent",
        permissions(&[
            (
                resource::WORKSPACE,
                &[
                    Action::READ,
                    Action::UPDATE,
                    Action::SSH,
                    Action::APPLICATION_CONNECT,
                ],
            ),
            (resource::TEMPLATE, &[Action::READ]),
            (resource::USER, &[Action::READ_PERSONAL]),
        ]),
    );
    let allow_id_list = allowlist::normalize(&[
        AllowListElement::new(resource::WORKSPACE, params.workspace_id.to_string()),
        AllowListElement::new(resource::USER, params.owner_id.to_string()),
        AllowListElement::new(resource::TEMPLATE, params.template_id.to_string()),
    ])?;
    Ok(Scope {
        role,
        allow_id_list,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn builtin_scopes_are_unrestricted() {
        for name in [SCOPE_ALL, SCOPE_APPLICATION_CONNECT] {
            let scope = expand_scope(name).unwrap();
            assert_eq!(scope.allow_id_list, vec![AllowListElement::all()]);
            assert_eq!(scope.name().name, name);
            scope.role.validate().unwrap();
        }
    }

    #[test]
    fn low_level_scope_has_one_site_permission() {
        let scope = expand_scope("workspace:read").unwrap();
        assert_eq!(
            scope.role.site,
            vec![Permission::allow(resource::WORKSPACE, Action::READ)]
        );
        assert!(scope.role.org.is_empty());
        assert!(scope.role.user.is_empty());
        assert_eq!(scope.allow_id_list, vec![AllowListElement::all()]);
    }

    #[test]
    fn low_level_wildcard_action() {
        let scope = expand_scope("template:*").unwrap();
        assert_eq!(
            scope.role.site,
            vec![Permission::allow(resource::TEMPLATE, Action::WILDCARD)]
        );
    }

    #[test]
    fn malformed_scope_strings_fail() {
        assert_eq!(
            expand_scope(""),
            Err(RegistryError::Malformed(ValidationError::EmptyScope))
        );
        for bad in ["workspace:", ":read", "a:b:c", "*:read"] {
            assert!(
                matches!(
                    expand_scope(bad),
                    Err(RegistryError::Malformed(ValidationError::MalformedScope(_)))
                ),
                "{bad} should be malformed"
            );
        }
        assert!(matches!(
            expand_scope("unknown:read"),
            Err(RegistryError::Malformed(ValidationError::UnknownResource(_)))
        ));
        assert!(matches!(
            expand_scope("workspace:bogus"),
            Err(RegistryError::Malformed(ValidationError::InvalidAction { .. }))
        ));
        assert_eq!(
            expand_scope("everything"),
            Err(RegistryError::UnknownScope("everything".to_owned()))
        );
    }

    #[test]
    fn external_list_is_sorted_and_valid() {
        let mut sorted = EXTERNAL_LOW_LEVEL.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, EXTERNAL_LOW_LEVEL);

        for name in external_scope_names() {
            assert!(is_external_scope(name));
            expand_scope(name).unwrap_or_else(|e| panic!("{name}: {e}"));
        }
    }

    #[test]
    fn internal_scopes_are_rejected_externally() {
        assert!(expand_scope("system:read").is_ok());
        assert!(!is_external_scope("system:read"));
        assert_eq!(
            expand_external_scope("system:read"),
            Err(RegistryError::Malformed(ValidationError::InternalScope(
                "system:read".to_owned()
            )))
        );
        assert!(expand_external_scope("workspace:ssh").is_ok());
    }

    #[test]
    fn workspace_agent_scope_binds_ids() {
        let params = WorkspaceAgentScopeParams {
            workspace_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
        };
        let scope = workspace_agent_scope(params).unwrap();
        assert_eq!(scope.allow_id_list.len(), 3);
        assert!(scope.allow_id_list.contains(&AllowListElement::new(
            resource::WORKSPACE,
            params.workspace_id.to_string()
        )));
        assert!(
            scope
                .role
                .site
                .iter()
                .any(|p| p.matches(resource::WORKSPACE, &Action::SSH))
        );
        scope.role.validate().unwrap();
    }

    #[test]
    fn workspace_agent_scope_rejects_nil_ids() {
        let params = WorkspaceAgentScopeParams {
            workspace_id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            template_id: Uuid::new_v4(),
        };
        assert_eq!(
            workspace_agent_scope(params),
            Err(RegistryError::Malformed(ValidationError::NilId("owner_id")))
        );
    }
}
