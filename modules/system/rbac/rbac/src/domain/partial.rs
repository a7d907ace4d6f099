//! Partial evaluation of the built-in policy.
//!
//! Only the object type is known. Everything the full evaluator reads from
//! the object (id, owner, organization and ACL entries) becomes a predicate in
//! the residual, which is a disjunction of conjunctions. The object is assumed
//! not to be `any_org`; prepared authorizers fall back to full evaluation for
//! such objects.

use std::collections::BTreeSet;

use rbac_sdk::catalog::WILDCARD;
use rbac_sdk::query::{Body, Expr, Term};
use rbac_sdk::{Action, Level, PartialInput, PartialQueries, Role};

use super::policy::{org_keys, org_level, site_level, user_level};

const ID: &str = "id";
const OWNER: &str = "owner";
const ORG_OWNER: &str = "org_owner";
const ACL_USER_LIST: &str = "acl_user_list";
const ACL_GROUP_LIST: &str = "acl_group_list";

/// Disjunctive normal form: an empty list is false, an empty body is true.
type Dnf = Vec<Vec<Expr>>;

fn always() -> Dnf {
    vec![Vec::new()]
}

fn never() -> Dnf {
    Vec::new()
}

/// `input.object.<field> = value`, or membership for several values.
fn field_in<'a, I>(field: &str, values: I) -> Option<Expr>
where
    I: IntoIterator<Item = &'a str>,
{
    let values: BTreeSet<&str> = values.into_iter().collect();
    match values.len() {
        0 => None,
        1 => values
            .first()
            .map(|v| Expr::eq(Term::object_field(field), Term::string(*v))),
        _ => Some(Expr::member(
            Term::object_field(field),
            Term::string_set(values),
        )),
    }
}

fn field_eq(field: &str, value: &str) -> Expr {
    Expr::eq(Term::object_field(field), Term::string(value))
}

/// Conjunction of two DNFs, with duplicate conjuncts and bodies dropped.
fn cross(lhs: &Dnf, rhs: &Dnf) -> Dnf {
    let mut out: Dnf = Vec::new();
    for a in lhs {
        for b in rhs {
            let mut body: Vec<Expr> = Vec::with_capacity(a.len() + b.len());
            for expr in a.iter().chain(b) {
                if !body.contains(expr) {
                    body.push(expr.clone());
                }
            }
            push_unique(&mut out, body);
        }
    }
    out
}

fn push_unique(dnf: &mut Dnf, body: Vec<Expr>) {
    if !dnf.contains(&body) {
        dnf.push(body);
    }
}

/// A true disjunct absorbs every other one.
fn absorb(dnf: Dnf) -> Dnf {
    if dnf.iter().any(Vec::is_empty) {
        always()
    } else {
        dnf
    }
}

/// Residual of the level precedence rule for `roles`.
///
/// `members` are the organizations the subject belongs to; they decide
/// whether user-level grants count for an object's organization.
fn role_dnf(
    roles: &[Role],
    members: &BTreeSet<&str>,
    subject_id: &str,
    action: &Action,
    resource_type: &str,
) -> Dnf {
    let site = site_level(roles, resource_type, action);
    if site == Level::Allow {
        return always();
    }
    if site == Level::Deny {
        return never();
    }

    let mut allow_orgs = BTreeSet::new();
    let mut deny_orgs = BTreeSet::new();
    for org in org_keys(roles) {
        match org_level(roles, org, resource_type, action) {
            Level::Allow => {
                allow_orgs.insert(org);
            }
            Level::Deny => {
                deny_orgs.insert(org);
            }
            Level::Abstain => {}
        }
    }

    let mut dnf = never();
    if let Some(expr) = field_in(ORG_OWNER, allow_orgs.iter().copied()) {
        push_unique(&mut dnf, vec![expr]);
    }

    let user = user_level(roles, resource_type, action);
    if !subject_id.is_empty() && user == Level::Allow {
        push_unique(
            &mut dnf,
            vec![field_eq(ORG_OWNER, ""), field_eq(OWNER, subject_id)],
        );
        let usable = members.iter().copied().filter(|m| !deny_orgs.contains(m));
        if let Some(expr) = field_in(ORG_OWNER, usable) {
            push_unique(&mut dnf, vec![expr, field_eq(OWNER, subject_id)]);
        }
    }
    dnf
}

/// Residual of the ACL grants.
fn acl_dnf(input: &PartialInput<'_>, members: &BTreeSet<&str>) -> Dnf {
    let mut needles = vec![input.action.as_str()];
    if !input.action.is_wildcard() {
        needles.push(WILDCARD);
    }
    let member = |field: &str, key: &str, needle: &str| {
        Expr::member(Term::string(needle), Term::object_entry(field, key))
    };

    let mut dnf = never();
    for &needle in &needles {
        push_unique(
            &mut dnf,
            vec![member(ACL_USER_LIST, &input.subject.id, needle)],
        );
    }

    let Some(in_member_org) = field_in(ORG_OWNER, members.iter().copied()) else {
        return dnf;
    };
    for group in &input.subject.groups {
        for &needle in &needles {
            push_unique(
                &mut dnf,
                vec![
                    in_member_org.clone(),
                    member(ACL_GROUP_LIST, group, needle),
                ],
            );
        }
    }
    for &org in members {
        for &needle in &needles {
            push_unique(
                &mut dnf,
                vec![field_eq(ORG_OWNER, org), member(ACL_GROUP_LIST, org, needle)],
            );
        }
    }
    dnf
}

/// Residual of the scope allow-list for objects of `resource_type`.
fn allow_list_dnf(input: &PartialInput<'_>) -> Dnf {
    let list = &input.subject.scope.allow_id_list;
    let type_matches = |t: &str| t == WILDCARD || t == input.resource_type;

    if list
        .iter()
        .any(|e| type_matches(&e.resource_type) && e.id == WILDCARD)
    {
        return always();
    }
    let ids = list
        .iter()
        .filter(|e| type_matches(&e.resource_type))
        .map(|e| e.id.as_str());
    field_in(ID, ids).map_or_else(never, |expr| vec![vec![expr]])
}

/// Residual of the full decision for every object of `input.resource_type`.
#[must_use]
pub fn residual(input: &PartialInput<'_>) -> PartialQueries {
    let subject = input.subject;
    let members = subject.org_memberships();

    let mut grants = role_dnf(
        &subject.roles,
        &members,
        &subject.id,
        input.action,
        input.resource_type,
    );
    for body in acl_dnf(input, &members) {
        push_unique(&mut grants, body);
    }
    let grants = absorb(grants);

    let scope = role_dnf(
        std::slice::from_ref(&subject.scope.role),
        &members,
        &subject.id,
        input.action,
        input.resource_type,
    );
    let restriction = absorb(cross(&allow_list_dnf(input), &scope));
    let dnf = absorb(cross(&grants, &restriction));

    if dnf.iter().any(Vec::is_empty) {
        return PartialQueries::always_true();
    }
    PartialQueries {
        queries: dnf.into_iter().map(Body).collect(),
        support: Vec::new(),
    }
}
