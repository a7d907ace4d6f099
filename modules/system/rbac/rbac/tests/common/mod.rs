//! Subjects and objects shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use rbac::domain::roles::{
    AUDITOR, MEMBER, ORG_ADMIN, ORG_MEMBER, OWNER, TEMPLATE_ADMIN, USER_ADMIN, role_by_name,
};
use rbac::domain::scopes::{
    SCOPE_ALL, WorkspaceAgentScopeParams, expand_scope, workspace_agent_scope,
};
use rbac_sdk::catalog::resource;
use rbac_sdk::{Action, AllowListElement, Object, RoleIdentifier, Scope, Subject};
use uuid::Uuid;

pub const ME: &str = "5c7a1a5e-1111-4a4a-8b8b-000000000001";
pub const OTHER: &str = "5c7a1a5e-1111-4a4a-8b8b-000000000002";
pub const ORG_X: &str = "5c7a1a5e-2222-4a4a-8b8b-00000000000a";
pub const ORG_Y: &str = "5c7a1a5e-2222-4a4a-8b8b-00000000000b";
pub const WS_1: &str = "5c7a1a5e-3333-4a4a-8b8b-000000000001";
pub const WS_2: &str = "5c7a1a5e-3333-4a4a-8b8b-000000000002";
pub const TEMPLATE_1: &str = "5c7a1a5e-4444-4a4a-8b8b-000000000001";
pub const GROUP: &str = "5c7a1a5e-5555-4a4a-8b8b-000000000001";

pub fn org_x() -> Uuid {
    Uuid::parse_str(ORG_X).unwrap()
}

pub fn site(name: &str) -> RoleIdentifier {
    RoleIdentifier::site(name)
}

pub fn in_x(name: &str) -> RoleIdentifier {
    RoleIdentifier::org(name, org_x())
}

pub fn subject(ids: &[RoleIdentifier], scope: Scope) -> Subject {
    let roles = ids.iter().map(|id| role_by_name(id).unwrap()).collect();
    Subject::new(ME, roles, scope)
}

pub fn all() -> Scope {
    expand_scope(SCOPE_ALL).unwrap()
}

/// One subject per interesting shape, labelled for assertion messages.
pub fn subjects() -> Vec<(&'static str, Subject)> {
    let mut pinned = all();
    pinned.allow_id_list = vec![AllowListElement::new(resource::WORKSPACE, WS_1)];
    let agent = workspace_agent_scope(WorkspaceAgentScopeParams {
        workspace_id: Uuid::parse_str(WS_1).unwrap(),
        owner_id: Uuid::parse_str(ME).unwrap(),
        template_id: Uuid::parse_str(TEMPLATE_1).unwrap(),
    })
    .unwrap();

    vec![
        ("owner", subject(&[site(OWNER)], all())),
        ("member", subject(&[site(MEMBER)], all())),
        (
            "org member",
            subject(&[site(MEMBER), in_x(ORG_MEMBER)], all()),
        ),
        (
            "org admin in group",
            subject(&[site(MEMBER), in_x(ORG_ADMIN)], all()).with_groups(vec![GROUP.to_owned()]),
        ),
        (
            "org member in group",
            subject(&[site(MEMBER), in_x(ORG_MEMBER)], all())
                .with_groups(vec![GROUP.to_owned()]),
        ),
        ("auditor", subject(&[site(AUDITOR)], all())),
        ("template admin", subject(&[site(TEMPLATE_ADMIN)], all())),
        ("user admin", subject(&[site(USER_ADMIN)], all())),
        (
            "member scoped to workspace:read",
            subject(&[site(MEMBER)], expand_scope("workspace:read").unwrap()),
        ),
        ("owner as agent", subject(&[site(OWNER)], agent)),
        (
            "org member pinned to one workspace",
            subject(&[site(MEMBER), in_x(ORG_MEMBER)], pinned),
        ),
        ("nobody", subject(&[], all())),
    ]
}

fn acl(key: &str, actions: &[Action]) -> BTreeMap<String, Vec<Action>> {
    BTreeMap::from([(key.to_owned(), actions.to_vec())])
}

/// Every combination of org, owner, id and ACL shape for one type.
pub fn objects(resource_type: &str) -> Vec<Object> {
    let mut out = Vec::new();
    for org in ["", ORG_X, ORG_Y] {
        for owner in ["", ME, OTHER] {
            for id in [WS_1, WS_2, TEMPLATE_1] {
                let base = Object::new(resource_type)
                    .with_id(id)
                    .with_owner(owner)
                    .in_org(org);
                out.push(base.clone());
                out.push(base.clone().with_acl_user_list(acl(ME, &[Action::READ])));
                out.push(base.clone().with_acl_user_list(acl(OTHER, &[Action::WILDCARD])));
                out.push(base.clone().with_group_acl(acl(GROUP, &[Action::WILDCARD])));
                out.push(base.with_group_acl(acl(ORG_X, &[Action::READ, Action::USE])));
            }
        }
    }
    out
}
