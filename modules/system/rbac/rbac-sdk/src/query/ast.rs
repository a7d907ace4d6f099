//! Compiled residual expressions.
//!
//! A closed set of node kinds. Every node renders itself back to rule text
//! for debugging and to a SQL fragment for push-down, and can be evaluated
//! in memory against a concrete [`Object`].

use std::fmt;

use crate::models::{Action, Object};

use super::residual::{INPUT, OBJECT, is_identifier, ops, write_quoted};
use super::sql::{ColumnType, SqlConfig};

/// A reference to an input attribute, e.g. `input.object.owner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    path: Vec<String>,
}

impl Variable {
    #[must_use]
    pub fn new(path: Vec<String>) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Dotted form of the path, e.g. `input.object.acl_user_list.me`.
    #[must_use]
    pub fn name(&self) -> String {
        self.path.join(".")
    }

    /// Attribute path below `input.object`, if the variable points into the object.
    fn object_path(&self) -> Option<&[String]> {
        match self.path.as_slice() {
            [root, object, rest @ ..] if root == INPUT && object == OBJECT => Some(rest),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.path.iter().enumerate() {
            if i == 0 {
                f.write_str(seg)?;
            } else if is_identifier(seg) {
                write!(f, ".{seg}")?;
            } else {
                f.write_str("[")?;
                write_quoted(f, seg)?;
                f.write_str("]")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Boolean(bool),
    Variable(Variable),
    String(String),
    Set(Vec<Expression>),
    Equality {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        negated: bool,
    },
    Membership {
        needle: Box<Expression>,
        haystack: Box<Expression>,
    },
    And(Vec<Expression>),
    Or(Vec<Expression>),
}

/// Value of a term while evaluating against an object.
#[derive(Debug, PartialEq, Eq)]
enum Value<'a> {
    Undefined,
    Bool(bool),
    Str(&'a str),
    Set(Vec<&'a str>),
}

impl Expression {
    /// Rule-language text of the expression.
    #[must_use]
    pub fn rego_string(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Variable(var) => var.to_string(),
            Self::String(s) => quoted(s),
            Self::Set(items) if items.is_empty() => "set()".to_owned(),
            Self::Set(items) => format!("{{{}}}", join(items, ", ", Self::rego_string)),
            Self::Equality { lhs, rhs, negated } => {
                let op = if *negated { "!=" } else { "=" };
                format!("{} {op} {}", lhs.rego_string(), rhs.rego_string())
            }
            Self::Membership { needle, haystack } => format!(
                "{}({}, {})",
                ops::MEMBER,
                needle.rego_string(),
                haystack.rego_string()
            ),
            Self::And(children) => join_group(children, "; ", "true", Self::rego_string),
            Self::Or(children) => join_group(children, "\n", "false", Self::rego_string),
        }
    }

    /// SQL boolean fragment, with variables mapped through `cfg`.
    #[must_use]
    pub fn sql_string(&self, cfg: &SqlConfig) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Variable(var) => cfg
                .resolve(var)
                .map_or_else(|| var.name(), |(select, _)| select),
            Self::String(s) => sql_quote(s),
            Self::Set(items) if items.is_empty() => "ARRAY[]::text[]".to_owned(),
            Self::Set(items) => format!("ARRAY [{}]", join(items, ", ", |e| e.sql_string(cfg))),
            Self::Equality { lhs, rhs, negated } => boolean_column_sql(lhs, rhs, *negated, cfg)
                .or_else(|| boolean_column_sql(rhs, lhs, *negated, cfg))
                .unwrap_or_else(|| {
                    let op = if *negated { "!=" } else { "=" };
                    format!("{} {op} {}", lhs.sql_string(cfg), rhs.sql_string(cfg))
                }),
            Self::Membership { needle, haystack } => membership_sql(needle, haystack, cfg),
            Self::And(children) => {
                paren_group(children, " AND ", "true", |e| e.sql_string(cfg))
            }
            Self::Or(children) => paren_group(children, " OR ", "false", |e| e.sql_string(cfg)),
        }
    }

    /// Evaluate the expression against a concrete object.
    ///
    /// Follows rule semantics: comparisons touching an undefined attribute
    /// (e.g. a missing ACL entry) are false, never an error.
    #[must_use]
    pub fn eval(&self, object: &Object) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Equality { lhs, rhs, negated } => {
                match (lhs.value(object), rhs.value(object)) {
                    (Value::Undefined, _) | (_, Value::Undefined) => false,
                    (l, r) => (l == r) != *negated,
                }
            }
            Self::Membership { needle, haystack } => {
                match (needle.value(object), haystack.value(object)) {
                    (Value::Str(n), Value::Set(items)) => items.contains(&n),
                    _ => false,
                }
            }
            Self::And(children) => children.iter().all(|c| c.eval(object)),
            Self::Or(children) => children.iter().any(|c| c.eval(object)),
            Self::Variable(_) | Self::String(_) | Self::Set(_) => {
                matches!(self.value(object), Value::Bool(true))
            }
        }
    }

    fn value<'a>(&'a self, object: &'a Object) -> Value<'a> {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::String(s) => Value::Str(s),
            Self::Set(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item.value(object) {
                        Value::Str(s) => values.push(s),
                        _ => return Value::Undefined,
                    }
                }
                values.sort_unstable();
                values.dedup();
                Value::Set(values)
            }
            Self::Variable(var) => resolve_object_attribute(var, object),
            Self::Equality { .. } | Self::Membership { .. } | Self::And(_) | Self::Or(_) => {
                Value::Bool(self.eval(object))
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rego_string())
    }
}

fn resolve_object_attribute<'a>(var: &Variable, object: &'a Object) -> Value<'a> {
    let Some(path) = var.object_path() else {
        return Value::Undefined;
    };
    match path {
        [field] => match field.as_str() {
            "id" => Value::Str(&object.id),
            "owner" => Value::Str(&object.owner),
            "org_owner" => Value::Str(&object.org_id),
            "type" => Value::Str(&object.resource_type),
            "any_org" => Value::Bool(object.any_org),
            _ => Value::Undefined,
        },
        [field, key] => {
            let acl = match field.as_str() {
                "acl_user_list" => &object.acl_user_list,
                "acl_group_list" => &object.acl_group_list,
                _ => return Value::Undefined,
            };
            acl.get(key).map_or(Value::Undefined, |actions| {
                let mut values: Vec<&str> = actions.iter().map(Action::as_str).collect();
                values.sort_unstable();
                values.dedup();
                Value::Set(values)
            })
        }
        _ => Value::Undefined,
    }
}

/// A boolean column compared with a literal renders as the bare column or its negation.
fn boolean_column_sql(
    column: &Expression,
    literal: &Expression,
    negated: bool,
    cfg: &SqlConfig,
) -> Option<String> {
    let (Expression::Variable(var), Expression::Boolean(value)) = (column, literal) else {
        return None;
    };
    match cfg.resolve(var)? {
        (select, ColumnType::Boolean) if *value != negated => Some(select),
        (select, ColumnType::Boolean) => Some(format!("NOT {select}")),
        _ => None,
    }
}

fn membership_sql(needle: &Expression, haystack: &Expression, cfg: &SqlConfig) -> String {
    if let Expression::Variable(var) = haystack {
        match cfg.resolve(var) {
            Some((_, ColumnType::Skip)) => return "false".to_owned(),
            Some((select, ColumnType::JsonbTextArray)) => {
                return format!("{select} ? {}", needle.sql_string(cfg));
            }
            _ => {}
        }
    }
    format!(
        "{} = ANY({})",
        needle.sql_string(cfg),
        haystack.sql_string(cfg)
    )
}

fn join<F>(items: &[Expression], sep: &str, render: F) -> String
where
    F: Fn(&Expression) -> String,
{
    items.iter().map(render).collect::<Vec<_>>().join(sep)
}

fn join_group<F>(items: &[Expression], sep: &str, empty: &str, render: F) -> String
where
    F: Fn(&Expression) -> String,
{
    match items {
        [] => empty.to_owned(),
        [single] => render(single),
        _ => join(items, sep, render),
    }
}

fn paren_group<F>(items: &[Expression], sep: &str, empty: &str, render: F) -> String
where
    F: Fn(&Expression) -> String,
{
    match items {
        [] => empty.to_owned(),
        [single] => render(single),
        _ => format!("({})", join(items, sep, render)),
    }
}

fn quoted(s: &str) -> String {
    struct Quoted<'a>(&'a str);
    impl fmt::Display for Quoted<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_quoted(f, self.0)
        }
    }
    Quoted(s).to_string()
}

/// Single-quoted SQL string literal.
pub(crate) fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn object_var(field: &str) -> Expression {
        Expression::Variable(Variable::new(vec![
            INPUT.to_owned(),
            OBJECT.to_owned(),
            field.to_owned(),
        ]))
    }

    fn acl_var(field: &str, key: &str) -> Expression {
        Expression::Variable(Variable::new(vec![
            INPUT.to_owned(),
            OBJECT.to_owned(),
            field.to_owned(),
            key.to_owned(),
        ]))
    }

    fn eq(lhs: Expression, rhs: Expression) -> Expression {
        Expression::Equality {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            negated: false,
        }
    }

    #[test]
    fn renders_verbatim_sql() {
        let expr = Expression::Or(vec![
            eq(object_var("owner"), Expression::String("me".to_owned())),
            Expression::And(vec![
                Expression::Equality {
                    lhs: Box::new(object_var("org_owner")),
                    rhs: Box::new(Expression::String(String::new())),
                    negated: true,
                },
                Expression::Membership {
                    needle: Box::new(object_var("org_owner")),
                    haystack: Box::new(Expression::Set(vec![
                        Expression::String("a".to_owned()),
                        Expression::String("b".to_owned()),
                    ])),
                },
            ]),
        ]);
        assert_eq!(
            expr.sql_string(&SqlConfig::verbatim()),
            "(input.object.owner = 'me' OR (input.object.org_owner != '' AND \
             input.object.org_owner = ANY(ARRAY ['a', 'b'])))"
        );
    }

    #[test]
    fn single_child_groups_render_bare() {
        let expr = Expression::Or(vec![Expression::And(vec![Expression::Boolean(true)])]);
        assert_eq!(expr.sql_string(&SqlConfig::verbatim()), "true");
        assert_eq!(Expression::And(vec![]).sql_string(&SqlConfig::verbatim()), "true");
        assert_eq!(Expression::Or(vec![]).sql_string(&SqlConfig::verbatim()), "false");
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(
            Expression::String("o'brien".to_owned()).sql_string(&SqlConfig::verbatim()),
            "'o''brien'"
        );
        assert_eq!(
            Expression::String("say \"hi\"".to_owned()).rego_string(),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn renders_rego_text() {
        let expr = Expression::Membership {
            needle: Box::new(Expression::String("read".to_owned())),
            haystack: Box::new(acl_var("acl_user_list", "me")),
        };
        assert_eq!(
            expr.rego_string(),
            "internal.member_2(\"read\", input.object.acl_user_list.me)"
        );
    }

    #[test]
    fn eval_equality_and_membership() {
        let object = Object::new("workspace")
            .with_owner("me")
            .in_org("org-a")
            .with_acl_user_list(BTreeMap::from([("me".to_owned(), vec![Action::READ])]));

        assert!(eq(object_var("owner"), Expression::String("me".to_owned())).eval(&object));
        assert!(!eq(object_var("owner"), Expression::String("you".to_owned())).eval(&object));

        let in_orgs = Expression::Membership {
            needle: Box::new(object_var("org_owner")),
            haystack: Box::new(Expression::Set(vec![Expression::String("org-a".to_owned())])),
        };
        assert!(in_orgs.eval(&object));

        let acl = |action: &str, key: &str| Expression::Membership {
            needle: Box::new(Expression::String(action.to_owned())),
            haystack: Box::new(acl_var("acl_user_list", key)),
        };
        assert!(acl("read", "me").eval(&object));
        assert!(!acl("update", "me").eval(&object));
        assert!(!acl("read", "someone-else").eval(&object));
    }

    #[test]
    fn eval_undefined_is_false_for_both_polarities() {
        let object = Object::new("workspace");
        let unknown = object_var("color");
        let lit = Expression::String("red".to_owned());
        assert!(!eq(unknown.clone(), lit.clone()).eval(&object));
        assert!(
            !Expression::Equality {
                lhs: Box::new(unknown),
                rhs: Box::new(lit),
                negated: true,
            }
            .eval(&object)
        );
    }
}
