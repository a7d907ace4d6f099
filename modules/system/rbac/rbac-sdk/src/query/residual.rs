//! Raw partial-evaluation output.
//!
//! A residual is a disjunction of bodies; each body is a conjunction of
//! expressions over terms. This mirrors the shape rule engines emit before
//! any interpretation, and is what [`super::compile`] consumes.

use std::fmt;

use serde::Serialize;

/// Operator names understood by the compiler.
pub mod ops {
    pub const EQ: &str = "eq";
    pub const EQUAL: &str = "equal";
    pub const NEQ: &str = "neq";
    pub const MEMBER: &str = "internal.member_2";
}

/// Root variable of every input reference.
pub const INPUT: &str = "input";

/// Field of the input holding the object.
pub const OBJECT: &str = "object";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PartialQueries {
    pub queries: Vec<Body>,
    /// Auxiliary rule definitions the residual still depends on.
    pub support: Vec<SupportRule>,
}

impl PartialQueries {
    /// A residual with one empty (always true) query.
    #[must_use]
    pub fn always_true() -> Self {
        Self {
            queries: vec![Body::default()],
            support: Vec::new(),
        }
    }

    /// A residual with no queries at all.
    #[must_use]
    pub fn always_false() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_always_true(&self) -> bool {
        self.support.is_empty() && self.queries.iter().any(Body::is_empty)
    }
}

impl fmt::Display for PartialQueries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, query) in self.queries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{query}")?;
        }
        Ok(())
    }
}

/// Conjunction of expressions. Empty means true.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Body(pub Vec<Expr>);

impl Body {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.0, "; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportRule {
    pub name: String,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr {
    Call { operator: String, operands: Vec<Term> },
    Term(Term),
}

impl Expr {
    #[must_use]
    pub fn call(operator: &str, operands: Vec<Term>) -> Self {
        Self::Call {
            operator: operator.to_owned(),
            operands,
        }
    }

    #[must_use]
    pub fn eq(lhs: Term, rhs: Term) -> Self {
        Self::call(ops::EQ, vec![lhs, rhs])
    }

    #[must_use]
    pub fn neq(lhs: Term, rhs: Term) -> Self {
        Self::call(ops::NEQ, vec![lhs, rhs])
    }

    #[must_use]
    pub fn member(needle: Term, haystack: Term) -> Self {
        Self::call(ops::MEMBER, vec![needle, haystack])
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => write!(f, "{term}"),
            Self::Call { operator, operands } => {
                let infix = match operator.as_str() {
                    ops::EQ => Some("="),
                    ops::EQUAL => Some("=="),
                    ops::NEQ => Some("!="),
                    _ => None,
                };
                match (infix, operands.as_slice()) {
                    (Some(sym), [lhs, rhs]) => write!(f, "{lhs} {sym} {rhs}"),
                    _ => {
                        write!(f, "{operator}(")?;
                        write_joined(f, operands, ", ")?;
                        f.write_str(")")
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Term {
    Boolean(bool),
    String(String),
    Number(i64),
    Var(String),
    /// A variable followed by path segments, e.g. `input.object.owner`.
    Ref(Vec<Term>),
    Set(Vec<Term>),
    Array(Vec<Term>),
}

impl Term {
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// `input.object.<field>`
    #[must_use]
    pub fn object_field(field: &str) -> Self {
        Self::Ref(vec![
            Self::Var(INPUT.to_owned()),
            Self::string(OBJECT),
            Self::string(field),
        ])
    }

    /// `input.object.<field>[<key>]`
    #[must_use]
    pub fn object_entry(field: &str, key: &str) -> Self {
        Self::Ref(vec![
            Self::Var(INPUT.to_owned()),
            Self::string(OBJECT),
            Self::string(field),
            Self::string(key),
        ])
    }

    /// Set of string literals.
    #[must_use]
    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(values.into_iter().map(Self::string).collect())
    }

    /// Name of the term kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Var(_) => "var",
            Self::Ref(_) => "ref",
            Self::Set(_) => "set",
            Self::Array(_) => "array",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => write_quoted(f, s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Var(name) => f.write_str(name),
            Self::Ref(parts) => write_ref(f, parts),
            Self::Set(items) if items.is_empty() => f.write_str("set()"),
            Self::Set(items) => {
                f.write_str("{")?;
                write_joined(f, items, ", ")?;
                f.write_str("}")
            }
            Self::Array(items) => {
                f.write_str("[")?;
                write_joined(f, items, ", ")?;
                f.write_str("]")
            }
        }
    }
}

fn write_ref(f: &mut fmt::Formatter<'_>, parts: &[Term]) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        match part {
            Term::Var(name) if i == 0 => f.write_str(name)?,
            Term::String(seg) if i > 0 && is_identifier(seg) => write!(f, ".{seg}")?,
            other => write!(f, "[{other}]")?,
        }
    }
    Ok(())
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
