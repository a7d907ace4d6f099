//! Built-in policy: level precedence evaluated directly in code.
//!
//! Site permissions decide first, then the permissions of the object's
//! organization, then the subject's own-resource permissions. A level decides
//! as soon as any permission matches: a negated match denies, otherwise it
//! allows. ACL entries on the object are a second grant source next to the
//! roles. Whatever the roles and ACLs allow is then narrowed by the subject's
//! scope, which goes through the same level algorithm, and by the scope's
//! allow-list.

use std::collections::BTreeSet;

use rbac_sdk::{
    Action, DecisionTrace, Level, LevelTrace, Object, PartialInput, PartialQueries, Permission,
    PolicyEngine, PolicyInput, Role, Subject,
};

use super::partial;

/// The policy engine shipped with the module.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPolicy;

impl PolicyEngine for BuiltinPolicy {
    fn evaluate(&self, input: &PolicyInput<'_>) -> DecisionTrace {
        evaluate(input)
    }

    fn partial(&self, input: &PartialInput<'_>) -> PartialQueries {
        partial::residual(input)
    }
}

/// Level of a set of permissions for one `(resource_type, action)` pair.
pub(crate) fn level<'a, I>(perms: I, resource_type: &str, action: &Action) -> Level
where
    I: IntoIterator<Item = &'a Permission>,
{
    let mut matched = false;
    for perm in perms {
        if perm.matches(resource_type, action) {
            if perm.negate {
                return Level::Deny;
            }
            matched = true;
        }
    }
    if matched { Level::Allow } else { Level::Abstain }
}

pub(crate) fn site_level(roles: &[Role], resource_type: &str, action: &Action) -> Level {
    level(roles.iter().flat_map(|r| &r.site), resource_type, action)
}

pub(crate) fn org_level(roles: &[Role], org_id: &str, resource_type: &str, action: &Action) -> Level {
    level(
        roles.iter().flat_map(|r| r.org_permissions(org_id)),
        resource_type,
        action,
    )
}

pub(crate) fn user_level(roles: &[Role], resource_type: &str, action: &Action) -> Level {
    level(roles.iter().flat_map(|r| &r.user), resource_type, action)
}

/// Every organization id keyed in the org maps of `roles`.
pub(crate) fn org_keys(roles: &[Role]) -> BTreeSet<&str> {
    roles
        .iter()
        .flat_map(|r| r.org.keys())
        .map(String::as_str)
        .filter(|org| !org.is_empty())
        .collect()
}

/// Org level for an object that matches whichever org grants it.
fn any_org_level(roles: &[Role], resource_type: &str, action: &Action) -> Level {
    let mut denied = false;
    for org in org_keys(roles) {
        match org_level(roles, org, resource_type, action) {
            Level::Allow => return Level::Allow,
            Level::Deny => denied = true,
            Level::Abstain => {}
        }
    }
    if denied { Level::Deny } else { Level::Abstain }
}

/// The precedence rule shared by the full and the partial evaluator.
pub(crate) fn levels_allow(site: Level, org: Level, user: Level, org_ok: bool) -> bool {
    site == Level::Allow
        || (site != Level::Deny && org == Level::Allow)
        || (site != Level::Deny && org != Level::Deny && org_ok && user == Level::Allow)
}

/// Whether the object is owned by the subject. An unset owner never matches.
fn owned_by(subject: &Subject, object: &Object) -> bool {
    !object.owner.is_empty() && object.owner == subject.id
}

fn evaluate_roles(
    roles: &[Role],
    members: &BTreeSet<&str>,
    subject: &Subject,
    action: &Action,
    object: &Object,
) -> LevelTrace {
    let resource_type = object.resource_type.as_str();
    let site = site_level(roles, resource_type, action);
    let (org, org_ok) = if object.any_org {
        (
            any_org_level(roles, resource_type, action),
            !members.is_empty(),
        )
    } else if object.has_org() {
        (
            org_level(roles, &object.org_id, resource_type, action),
            members.contains(object.org_id.as_str()),
        )
    } else {
        (Level::Abstain, true)
    };
    let user = if owned_by(subject, object) {
        user_level(roles, resource_type, action)
    } else {
        Level::Abstain
    };
    LevelTrace {
        site,
        org,
        user,
        org_ok,
        allowed: levels_allow(site, org, user, org_ok),
    }
}

pub(crate) fn acl_grants(actions: Option<&Vec<Action>>, requested: &Action) -> bool {
    actions.is_some_and(|granted| granted.iter().any(|a| a.covers(requested)))
}

fn acl_allows(
    subject: &Subject,
    members: &BTreeSet<&str>,
    action: &Action,
    object: &Object,
) -> bool {
    if acl_grants(object.acl_user_list.get(&subject.id), action) {
        return true;
    }
    if !object.has_org() || !members.contains(object.org_id.as_str()) {
        return false;
    }
    subject
        .groups
        .iter()
        .any(|group| acl_grants(object.acl_group_list.get(group), action))
        || acl_grants(object.acl_group_list.get(&object.org_id), action)
}

/// Full evaluation for a concrete object.
#[must_use]
pub fn evaluate(input: &PolicyInput<'_>) -> DecisionTrace {
    let PolicyInput {
        subject,
        action,
        object,
    } = *input;
    let members = subject.org_memberships();

    let roles = evaluate_roles(&subject.roles, &members, subject, action, object);
    let acl = acl_allows(subject, &members, action, object);
    let scope = evaluate_roles(
        std::slice::from_ref(&subject.scope.role),
        &members,
        subject,
        action,
        object,
    );
    let allow_list = subject.scope.allows(object);

    DecisionTrace {
        roles,
        scope,
        acl,
        allow_list,
        allowed: (roles.allowed || acl) && scope.allowed && allow_list,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use rbac_sdk::catalog::{WILDCARD, resource};
    use rbac_sdk::{AllowListElement, RoleIdentifier, Scope};

    use super::*;

    pub const ORG_X: &str = "0a1b2c3d-0000-4000-8000-00000000000a";
    pub const ORG_Y: &str = "0a1b2c3d-0000-4000-8000-00000000000b";

    pub fn role(name: &str) -> Role {
        Role {
            identifier: RoleIdentifier::site(name),
            display_name: name.to_owned(),
            site: Vec::new(),
            org: BTreeMap::new(),
            user: Vec::new(),
        }
    }

    pub fn all_scope() -> Scope {
        let mut scope_role = role("all");
        scope_role.site = vec![Permission::allow(WILDCARD, Action::WILDCARD)];
        Scope {
            role: scope_role,
            allow_id_list: vec![AllowListElement::all()],
        }
    }

    fn check(subject: &Subject, action: &Action, object: &Object) -> DecisionTrace {
        evaluate(&PolicyInput {
            subject,
            action,
            object,
        })
    }

    #[test]
    fn site_allow_beats_lower_denies() {
        let mut r = role("custom");
        r.site = vec![Permission::allow(WILDCARD, Action::WILDCARD)];
        r.org = BTreeMap::from([(
            ORG_X.to_owned(),
            vec![Permission::deny(WILDCARD, Action::WILDCARD)],
        )]);
        r.user = vec![Permission::deny(WILDCARD, Action::WILDCARD)];
        let me = Subject::new("me", vec![r], all_scope());
        let ws = Object::new(resource::WORKSPACE).in_org(ORG_X).with_owner("me");

        let trace = check(&me, &Action::READ, &ws);
        assert!(trace.allowed);
        assert_eq!(trace.roles.site, Level::Allow);
        assert_eq!(trace.roles.org, Level::Deny);
        assert_eq!(trace.roles.user, Level::Deny);
    }

    #[test]
    fn org_allow_beats_user_deny_only_in_that_org() {
        let mut r = role("custom");
        r.org = BTreeMap::from([(
            ORG_X.to_owned(),
            vec![Permission::allow(WILDCARD, Action::WILDCARD)],
        )]);
        r.user = vec![Permission::deny(WILDCARD, Action::WILDCARD)];
        let me = Subject::new("me", vec![r], all_scope());

        let in_x = Object::new(resource::WORKSPACE).in_org(ORG_X).with_owner("me");
        assert!(check(&me, &Action::UPDATE, &in_x).allowed);

        let in_y = Object::new(resource::WORKSPACE).in_org(ORG_Y).with_owner("me");
        assert!(!check(&me, &Action::UPDATE, &in_y).allowed);
    }

    #[test]
    fn site_deny_stops_evaluation() {
        let mut r = role("custom");
        r.site = vec![Permission::deny(resource::WORKSPACE, Action::READ)];
        r.user = vec![Permission::allow(WILDCARD, Action::WILDCARD)];
        let me = Subject::new("me", vec![r], all_scope());
        let ws = Object::new(resource::WORKSPACE).with_owner("me");
        assert!(!check(&me, &Action::READ, &ws).allowed);
        assert!(check(&me, &Action::UPDATE, &ws).allowed);
    }

    #[test]
    fn user_level_needs_org_membership() {
        let mut r = role("custom");
        r.user = vec![Permission::allow(WILDCARD, Action::WILDCARD)];
        let me = Subject::new("me", vec![r], all_scope());

        let personal = Object::new(resource::WORKSPACE).with_owner("me");
        assert!(check(&me, &Action::READ, &personal).allowed);

        let foreign_org = Object::new(resource::WORKSPACE).in_org(ORG_X).with_owner("me");
        let trace = check(&me, &Action::READ, &foreign_org);
        assert!(!trace.roles.org_ok);
        assert!(!trace.allowed);
    }

    #[test]
    fn unset_owner_never_matches() {
        let mut r = role("custom");
        r.user = vec![Permission::allow(WILDCARD, Action::WILDCARD)];
        let anonymous = Subject::new("", vec![r], all_scope());
        let unowned = Object::new(resource::WORKSPACE);
        assert!(!check(&anonymous, &Action::READ, &unowned).allowed);
    }

    #[test]
    fn scope_narrows_role() {
        let mut owner = role("owner");
        owner.site = vec![Permission::allow(WILDCARD, Action::WILDCARD)];
        let mut scope = all_scope();
        scope.role.site = vec![Permission::allow(resource::WORKSPACE, Action::READ)];
        let me = Subject::new("me", vec![owner], scope);

        let ws = Object::new(resource::WORKSPACE);
        assert!(check(&me, &Action::READ, &ws).allowed);
        let trace = check(&me, &Action::CREATE, &ws);
        assert!(trace.roles.allowed);
        assert!(!trace.scope.allowed);
        assert!(!trace.allowed);
        assert_eq!(trace.reason(), "scope does not grant the action");
    }

    #[test]
    fn allow_list_restricts_ids() {
        let mut owner = role("owner");
        owner.site = vec![Permission::allow(WILDCARD, Action::WILDCARD)];
        let mut scope = all_scope();
        scope.allow_id_list = vec![AllowListElement::new(resource::WORKSPACE, "ws-1")];
        let me = Subject::new("me", vec![owner], scope);

        let ws1 = Object::new(resource::WORKSPACE).with_id("ws-1");
        let ws2 = Object::new(resource::WORKSPACE).with_id("ws-2");
        assert!(check(&me, &Action::READ, &ws1).allowed);
        let trace = check(&me, &Action::READ, &ws2);
        assert!(!trace.allow_list);
        assert_eq!(trace.reason(), "object is outside the scope allow list");
    }

    #[test]
    fn acl_grants_are_an_independent_source() {
        let mut r = role("custom");
        r.site = vec![Permission::deny(resource::WORKSPACE, Action::WILDCARD)];
        let me = Subject::new("me", vec![r], all_scope());
        let ws = Object::new(resource::WORKSPACE).with_acl_user_list(BTreeMap::from([(
            "me".to_owned(),
            vec![Action::READ],
        )]));

        let trace = check(&me, &Action::READ, &ws);
        assert!(!trace.roles.allowed);
        assert!(trace.acl);
        assert!(trace.allowed);
        assert!(!check(&me, &Action::UPDATE, &ws).allowed);
    }

    #[test]
    fn group_acl_requires_org_membership() {
        let mut member = role("organization-member");
        member.org = BTreeMap::from([(ORG_X.to_owned(), Vec::new())]);
        let me = Subject::new("me", vec![member], all_scope()).with_groups(vec!["g1".to_owned()]);
        let acl = BTreeMap::from([("g1".to_owned(), vec![Action::WILDCARD])]);

        let in_x = Object::new(resource::TEMPLATE)
            .in_org(ORG_X)
            .with_group_acl(acl.clone());
        assert!(check(&me, &Action::USE, &in_x).allowed);

        let in_y = Object::new(resource::TEMPLATE).in_org(ORG_Y).with_group_acl(acl);
        assert!(!check(&me, &Action::USE, &in_y).allowed);

        let everyone = Object::new(resource::TEMPLATE)
            .in_org(ORG_X)
            .with_group_acl(BTreeMap::from([(ORG_X.to_owned(), vec![Action::READ])]));
        assert!(check(&me, &Action::READ, &everyone).allowed);
    }

    #[test]
    fn any_org_matches_any_granting_org() {
        let mut admin = role("organization-admin");
        admin.org = BTreeMap::from([(
            ORG_X.to_owned(),
            vec![Permission::allow(resource::TEMPLATE, Action::CREATE)],
        )]);
        let me = Subject::new("me", vec![admin], all_scope());
        let anywhere = Object::new(resource::TEMPLATE).any_organization();
        assert!(check(&me, &Action::CREATE, &anywhere).allowed);
        assert!(!check(&me, &Action::DELETE, &anywhere).allowed);

        let loner = Subject::new("me", vec![role("nothing")], all_scope());
        assert!(!check(&loner, &Action::CREATE, &anywhere).allowed);
    }

    #[test]
    fn no_grant_is_default_deny() {
        let me = Subject::new("me", vec![role("nothing")], all_scope());
        let trace = check(&me, &Action::READ, &Object::new(resource::WORKSPACE));
        assert!(!trace.allowed);
        assert_eq!(trace.reason(), "no role or acl entry grants the action");
    }
}
