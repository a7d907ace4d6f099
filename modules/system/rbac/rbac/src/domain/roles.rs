//! Built-in role registry.
//!
//! The table is process-wide and read on every role expansion. It is only ever
//! replaced as a whole by [`reload_builtin_roles`], so readers always see one
//! consistent generation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use rbac_sdk::catalog::{self, resource};
use rbac_sdk::{Action, Permission, RegistryError, Role, RoleIdentifier, permissions};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const OWNER: &str = "owner";
pub const MEMBER: &str = "member";
pub const AUDITOR: &str = "auditor";
pub const TEMPLATE_ADMIN: &str = "template-admin";
pub const USER_ADMIN: &str = "user-admin";
pub const ORG_ADMIN: &str = "organization-admin";
pub const ORG_MEMBER: &str = "organization-member";

/// Actor name used by internal system processes. Never assignable.
pub const SYSTEM: &str = "system";

/// Deployment toggles applied when the built-in table is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoleOptions {
    /// Remove `ssh` and `application_connect` on workspaces from the owner role.
    pub no_owner_workspace_exec: bool,
}

/// An org role before it is bound to an organization.
#[derive(Debug, Clone)]
struct OrgRoleTemplate {
    display_name: &'static str,
    org: Vec<Permission>,
    user: Vec<Permission>,
}

impl OrgRoleTemplate {
    fn instantiate(&self, name: &str, org_id: Uuid) -> Role {
        Role {
            identifier: RoleIdentifier::org(name, org_id),
            display_name: self.display_name.to_owned(),
            site: Vec::new(),
            org: BTreeMap::from([(org_id.to_string(), self.org.clone())]),
            user: self.user.clone(),
        }
    }
}

#[derive(Debug)]
struct BuiltinRoles {
    site: BTreeMap<&'static str, Role>,
    org: BTreeMap<&'static str, OrgRoleTemplate>,
}

static BUILTIN_ROLES: LazyLock<ArcSwap<BuiltinRoles>> =
    LazyLock::new(|| ArcSwap::from_pointee(BuiltinRoles::new(&RoleOptions::default())));

const DORMANT_ACTIONS: &[Action] = &[
    Action::READ,
    Action::DELETE,
    Action::CREATE,
    Action::UPDATE,
    Action::STOP,
];

fn all_perms_except(excluded: &[&str]) -> Vec<Permission> {
    catalog::resource_names()
        .filter(|name| !excluded.contains(name))
        .map(|name| Permission::allow(name, Action::WILDCARD))
        .collect()
}

fn workspace_actions(exec: bool) -> Vec<Action> {
    catalog::resource(resource::WORKSPACE)
        .map(|def| def.actions)
        .unwrap_or_default()
        .iter()
        .filter(|a| exec || (**a != Action::SSH && **a != Action::APPLICATION_CONNECT))
        .cloned()
        .collect()
}

fn site_role(name: &str, display_name: &str, site: Vec<Permission>, user: Vec<Permission>) -> Role {
    Role {
        identifier: RoleIdentifier::site(name),
        display_name: display_name.to_owned(),
        site,
        org: BTreeMap::new(),
        user,
    }
}

impl BuiltinRoles {
    fn new(opts: &RoleOptions) -> Self {
        let owner_ws = workspace_actions(!opts.no_owner_workspace_exec);
        let mut owner = all_perms_except(&[resource::WORKSPACE_DORMANT, resource::WORKSPACE]);
        owner.extend(permissions(&[
            (resource::WORKSPACE, &owner_ws),
            (resource::WORKSPACE_DORMANT, DORMANT_ACTIONS),
        ]));

        let mut member_user = all_perms_except(&[
            resource::WORKSPACE_DORMANT,
            resource::USER,
            resource::ORGANIZATION_MEMBER,
        ]);
        member_user.extend(permissions(&[
            (resource::WORKSPACE_DORMANT, DORMANT_ACTIONS),
            (
                resource::USER,
                &[Action::READ, Action::READ_PERSONAL, Action::UPDATE_PERSONAL],
            ),
        ]));

        let site = BTreeMap::from([
            (OWNER, site_role(OWNER, "Owner", owner, Vec::new())),
            (MEMBER, site_role(MEMBER, "Member", member_site(), member_user)),
            (AUDITOR, site_role(AUDITOR, "Auditor", auditor_site(), Vec::new())),
            (
                TEMPLATE_ADMIN,
                site_role(TEMPLATE_ADMIN, "Template Admin", template_admin_site(), Vec::new()),
            ),
            (
                USER_ADMIN,
                site_role(USER_ADMIN, "User Admin", user_admin_site(), Vec::new()),
            ),
        ]);

        let mut org_admin = all_perms_except(&[resource::WORKSPACE, resource::WORKSPACE_DORMANT]);
        org_admin.extend(permissions(&[
            (resource::WORKSPACE_DORMANT, DORMANT_ACTIONS),
            (resource::WORKSPACE, &workspace_actions(false)),
        ]));

        let org = BTreeMap::from([
            (
                ORG_ADMIN,
                OrgRoleTemplate {
                    display_name: "Organization Admin",
                    org: org_admin,
                    user: Vec::new(),
                },
            ),
            (
                ORG_MEMBER,
                OrgRoleTemplate {
                    display_name: "Organization Member",
                    org: permissions(&[
                        (resource::ORGANIZATION, &[Action::READ]),
                        (resource::ASSIGN_ORG_ROLE, &[Action::READ]),
                    ]),
                    user: permissions(&[(resource::ORGANIZATION_MEMBER, &[Action::READ])]),
                },
            ),
        ]);

        Self { site, org }
    }
}

fn member_site() -> Vec<Permission> {
    permissions(&[
        (resource::ASSIGN_ROLE, &[Action::READ]),
        (resource::PROVISIONER_DAEMON, &[Action::READ]),
        (resource::OAUTH2_APP, &[Action::READ]),
        (resource::WORKSPACE_PROXY, &[Action::READ]),
    ])
}

fn auditor_site() -> Vec<Permission> {
    permissions(&[
        (resource::TEMPLATE, &[Action::READ, Action::VIEW_INSIGHTS]),
        (resource::AUDIT_LOG, &[Action::READ]),
        (resource::USER, &[Action::READ]),
        (resource::GROUP, &[Action::READ]),
        (resource::DEPLOYMENT_STATS, &[Action::READ]),
        (resource::DEPLOYMENT_CONFIG, &[Action::READ]),
        (resource::ORGANIZATION_MEMBER, &[Action::READ]),
    ])
}

fn template_admin_site() -> Vec<Permission> {
    permissions(&[
        (
            resource::TEMPLATE,
            &[
                Action::CREATE,
                Action::READ,
                Action::UPDATE,
                Action::DELETE,
                Action::VIEW_INSIGHTS,
            ],
        ),
        (resource::FILE, &[Action::CREATE, Action::READ]),
        (resource::WORKSPACE, &[Action::READ]),
        (
            resource::PROVISIONER_DAEMON,
            &[Action::CREATE, Action::READ, Action::UPDATE, Action::DELETE],
        ),
        (resource::ORGANIZATION, &[Action::READ]),
        (resource::USER, &[Action::READ]),
        (resource::GROUP, &[Action::READ]),
        (resource::ORGANIZATION_MEMBER, &[Action::READ]),
    ])
}

fn user_admin_site() -> Vec<Permission> {
    permissions(&[
        (
            resource::ASSIGN_ROLE,
            &[Action::ASSIGN, Action::DELETE, Action::READ],
        ),
        (
            resource::USER,
            &[
                Action::CREATE,
                Action::READ,
                Action::UPDATE,
                Action::DELETE,
                Action::UPDATE_PERSONAL,
                Action::READ_PERSONAL,
            ],
        ),
        (
            resource::ORGANIZATION_MEMBER,
            &[Action::CREATE, Action::READ, Action::UPDATE, Action::DELETE],
        ),
        (
            resource::GROUP,
            &[Action::CREATE, Action::READ, Action::UPDATE, Action::DELETE],
        ),
    ])
}

/// Rebuild the built-in role table and swap it in atomically.
pub fn reload_builtin_roles(opts: &RoleOptions) {
    BUILTIN_ROLES.store(Arc::new(BuiltinRoles::new(opts)));
    tracing::debug!(
        no_owner_workspace_exec = opts.no_owner_workspace_exec,
        "built-in roles reloaded"
    );
}

/// Expand a role identifier into its permissions.
///
/// # Errors
/// - [`RegistryError::UnknownRole`] if no built-in role has that name
/// - [`RegistryError::MissingOrgId`] for an org role without an organization
/// - [`RegistryError::UnexpectedOrgId`] for a site role with an organization
pub fn role_by_name(id: &RoleIdentifier) -> Result<Role, RegistryError> {
    let table = BUILTIN_ROLES.load();
    if let Some(role) = table.site.get(id.name.as_str()) {
        if id.organization_id.is_some() {
            return Err(RegistryError::UnexpectedOrgId(id.to_string()));
        }
        return Ok(role.clone());
    }
    if let Some(template) = table.org.get(id.name.as_str()) {
        let Some(org_id) = id.organization_id.filter(|org| !org.is_nil()) else {
            return Err(RegistryError::MissingOrgId(id.to_string()));
        };
        return Ok(template.instantiate(&id.name, org_id));
    }
    Err(RegistryError::UnknownRole(id.to_string()))
}

/// Parse `name` or `name:org-uuid` and expand it.
///
/// # Errors
/// Returns [`RegistryError::Malformed`] for unparsable names, or any
/// [`role_by_name`] error.
pub fn role_by_name_str(name: &str) -> Result<Role, RegistryError> {
    let id: RoleIdentifier = name.parse()?;
    role_by_name(&id)
}

/// Expand many role identifiers, failing on the first unknown one.
///
/// # Errors
/// Returns the first [`role_by_name`] error.
pub fn roles_by_names(ids: &[RoleIdentifier]) -> Result<Vec<Role>, RegistryError> {
    ids.iter().map(role_by_name).collect()
}

/// Every built-in site role, sorted by name.
#[must_use]
pub fn site_roles() -> Vec<Role> {
    BUILTIN_ROLES.load().site.values().cloned().collect()
}

/// Every built-in org role bound to `org_id`, sorted by name.
#[must_use]
pub fn organization_roles(org_id: Uuid) -> Vec<Role> {
    BUILTIN_ROLES
        .load()
        .org
        .iter()
        .map(|(name, template)| template.instantiate(name, org_id))
        .collect()
}

#[must_use]
pub fn is_builtin_role(name: &str) -> bool {
    let table = BUILTIN_ROLES.load();
    table.site.contains_key(name) || table.org.contains_key(name)
}

/// Roles granted and revoked when a subject's role set changes from `from` to `to`.
///
/// Both lists are sorted and free of duplicates. Roles present on both sides
/// appear in neither, since keeping a role needs no assignment check.
#[must_use]
pub fn change_role_set(
    from: &[RoleIdentifier],
    to: &[RoleIdentifier],
) -> (Vec<RoleIdentifier>, Vec<RoleIdentifier>) {
    let from: BTreeSet<&RoleIdentifier> = from.iter().collect();
    let to: BTreeSet<&RoleIdentifier> = to.iter().collect();
    let added = to.difference(&from).map(|r| (*r).clone()).collect();
    let removed = from.difference(&to).map(|r| (*r).clone()).collect();
    (added, removed)
}

/// Whether an actor holding `actor_roles` may assign `assigned` to someone.
///
/// Org roles held by the actor only count for assignments in the same org.
#[must_use]
pub fn can_assign_role(actor_roles: &[RoleIdentifier], assigned: &RoleIdentifier) -> bool {
    let custom = !is_builtin_role(&assigned.name);
    actor_roles
        .iter()
        .filter(|actor| {
            actor.organization_id.is_none() || actor.organization_id == assigned.organization_id
        })
        .any(|actor| match actor.name.as_str() {
            SYSTEM | OWNER => true,
            USER_ADMIN => !custom && matches!(assigned.name.as_str(), MEMBER | ORG_MEMBER),
            ORG_ADMIN => !custom && matches!(assigned.name.as_str(), ORG_ADMIN | ORG_MEMBER),
            _ => false,
        })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn org() -> Uuid {
        Uuid::parse_str("7c3e6c0a-4d8b-4f4e-9a51-0b7f1c2d3e4f").unwrap()
    }

    #[test]
    fn every_builtin_role_is_valid() {
        for role in site_roles().iter().chain(organization_roles(org()).iter()) {
            role.validate()
                .unwrap_or_else(|e| panic!("{} is invalid: {e}", role.identifier));
        }
    }

    #[test]
    fn site_role_lookup() {
        let owner = role_by_name_str(OWNER).unwrap();
        assert_eq!(owner.identifier, RoleIdentifier::site(OWNER));
        assert!(owner.org.is_empty());
        assert!(
            owner
                .site
                .iter()
                .any(|p| p.matches(resource::TEMPLATE, &Action::DELETE))
        );
    }

    #[test]
    fn org_role_lookup_binds_the_org() {
        let role = role_by_name(&RoleIdentifier::org(ORG_MEMBER, org())).unwrap();
        assert_eq!(role.org.keys().collect::<Vec<_>>(), vec![&org().to_string()]);
        assert!(role.site.is_empty());
    }

    #[test]
    fn lookup_errors() {
        assert_eq!(
            role_by_name_str("spaceship-captain"),
            Err(RegistryError::UnknownRole("spaceship-captain".to_owned()))
        );
        assert!(matches!(
            role_by_name_str(ORG_ADMIN),
            Err(RegistryError::MissingOrgId(_))
        ));
        assert!(matches!(
            role_by_name(&RoleIdentifier::org(ORG_ADMIN, Uuid::nil())),
            Err(RegistryError::MissingOrgId(_))
        ));
        assert!(matches!(
            role_by_name(&RoleIdentifier::org(OWNER, org())),
            Err(RegistryError::UnexpectedOrgId(_))
        ));
        assert!(matches!(
            role_by_name_str("a:b:c"),
            Err(RegistryError::Malformed(_))
        ));
    }

    #[test]
    fn roles_by_names_fails_on_first_unknown() {
        let ids = vec![
            RoleIdentifier::site(MEMBER),
            RoleIdentifier::site("nope"),
        ];
        assert!(matches!(
            roles_by_names(&ids),
            Err(RegistryError::UnknownRole(name)) if name == "nope"
        ));
    }

    #[test]
    fn listing_filters_by_kind() {
        let site: Vec<_> = site_roles().into_iter().map(|r| r.identifier.name).collect();
        assert_eq!(site, vec![AUDITOR, MEMBER, OWNER, TEMPLATE_ADMIN, USER_ADMIN]);

        let org_roles = organization_roles(org());
        assert_eq!(org_roles.len(), 2);
        assert!(org_roles.iter().all(Role::is_org_role));
    }

    #[test]
    fn reload_toggles_owner_exec() {
        let owner_can_ssh = || {
            role_by_name_str(OWNER)
                .unwrap()
                .site
                .iter()
                .any(|p| p.matches(resource::WORKSPACE, &Action::SSH))
        };
        assert!(owner_can_ssh());

        reload_builtin_roles(&RoleOptions {
            no_owner_workspace_exec: true,
        });
        assert!(!owner_can_ssh());

        reload_builtin_roles(&RoleOptions::default());
        assert!(owner_can_ssh());
    }

    #[test]
    fn org_admin_never_has_exec() {
        let role = role_by_name(&RoleIdentifier::org(ORG_ADMIN, org())).unwrap();
        let perms = role.org_permissions(&org().to_string());
        assert!(perms.iter().any(|p| p.matches(resource::WORKSPACE, &Action::READ)));
        assert!(!perms.iter().any(|p| p.matches(resource::WORKSPACE, &Action::SSH)));
    }

    #[test]
    fn change_role_set_is_a_set_difference() {
        let from = vec![
            RoleIdentifier::site(MEMBER),
            RoleIdentifier::site(AUDITOR),
            RoleIdentifier::site(AUDITOR),
        ];
        let to = vec![RoleIdentifier::site(MEMBER), RoleIdentifier::site(OWNER)];
        let (added, removed) = change_role_set(&from, &to);
        assert_eq!(added, vec![RoleIdentifier::site(OWNER)]);
        assert_eq!(removed, vec![RoleIdentifier::site(AUDITOR)]);
    }

    #[test]
    fn assignment_matrix() {
        let other_org = Uuid::new_v4();
        let owner = [RoleIdentifier::site(OWNER)];
        let user_admin = [RoleIdentifier::site(USER_ADMIN)];
        let org_admin = [RoleIdentifier::org(ORG_ADMIN, org())];
        let member = [RoleIdentifier::site(MEMBER)];

        assert!(can_assign_role(&owner, &RoleIdentifier::site(OWNER)));
        assert!(can_assign_role(&owner, &RoleIdentifier::site("custom-role")));

        assert!(can_assign_role(&user_admin, &RoleIdentifier::site(MEMBER)));
        assert!(can_assign_role(&user_admin, &RoleIdentifier::org(ORG_MEMBER, org())));
        assert!(!can_assign_role(&user_admin, &RoleIdentifier::site(OWNER)));
        assert!(!can_assign_role(&user_admin, &RoleIdentifier::site("custom-role")));

        assert!(can_assign_role(&org_admin, &RoleIdentifier::org(ORG_MEMBER, org())));
        assert!(can_assign_role(&org_admin, &RoleIdentifier::org(ORG_ADMIN, org())));
        assert!(!can_assign_role(&org_admin, &RoleIdentifier::org(ORG_MEMBER, other_org)));
        assert!(!can_assign_role(&org_admin, &RoleIdentifier::site(MEMBER)));

        assert!(!can_assign_role(&member, &RoleIdentifier::site(MEMBER)));
    }
}
