//! Residual-to-expression compiler.
//!
//! Fail-closed: anything outside the supported operator and term set is an
//! error, never silently dropped, because a dropped conjunct would widen the
//! set of rows a SQL predicate admits.

use crate::error::CompileError;

use super::ast::{Expression, Variable};
use super::residual::{Body, Expr, PartialQueries, Term, ops};

/// Compile a residual into an [`Expression`].
///
/// - no queries compiles to `false`
/// - any empty query compiles to `true`
/// - otherwise the result is an `Or` of one `And` per query
///
/// # Errors
/// Returns [`CompileError`] if the residual carries support rules, uses an
/// unsupported operator or term, or has a non-boolean standalone term.
pub fn compile(partial: &PartialQueries) -> Result<Expression, CompileError> {
    compile_queries(partial).inspect_err(|e| {
        tracing::warn!(
            error = %e,
            queries = partial.queries.len(),
            "residual could not be compiled, denying"
        );
    })
}

fn compile_queries(partial: &PartialQueries) -> Result<Expression, CompileError> {
    if !partial.support.is_empty() {
        return Err(CompileError::UnsupportedSupportRules(partial.support.len()));
    }
    if partial.queries.is_empty() {
        return Ok(Expression::Boolean(false));
    }
    if partial.queries.iter().any(Body::is_empty) {
        return Ok(Expression::Boolean(true));
    }
    let bodies = partial
        .queries
        .iter()
        .map(compile_body)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expression::Or(bodies))
}

fn compile_body(body: &Body) -> Result<Expression, CompileError> {
    let exprs = body
        .0
        .iter()
        .map(compile_expr)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expression::And(exprs))
}

fn compile_expr(expr: &Expr) -> Result<Expression, CompileError> {
    match expr {
        Expr::Term(Term::Boolean(b)) => Ok(Expression::Boolean(*b)),
        Expr::Term(other) => Err(CompileError::NonBooleanTerm(other.to_string())),
        Expr::Call { operator, operands } => match operator.as_str() {
            ops::EQ | ops::EQUAL => equality(operator, operands, false),
            ops::NEQ => equality(operator, operands, true),
            ops::MEMBER => {
                let [needle, haystack] = binary(operator, operands)?;
                Ok(Expression::Membership {
                    needle: Box::new(compile_term(needle)?),
                    haystack: Box::new(compile_term(haystack)?),
                })
            }
            _ => Err(CompileError::UnsupportedOperator(operator.clone())),
        },
    }
}

fn equality(operator: &str, operands: &[Term], negated: bool) -> Result<Expression, CompileError> {
    let [lhs, rhs] = binary(operator, operands)?;
    Ok(Expression::Equality {
        lhs: Box::new(compile_term(lhs)?),
        rhs: Box::new(compile_term(rhs)?),
        negated,
    })
}

fn binary<'a>(operator: &str, operands: &'a [Term]) -> Result<[&'a Term; 2], CompileError> {
    match operands {
        [a, b] => Ok([a, b]),
        _ => Err(CompileError::WrongOperandCount {
            operator: operator.to_owned(),
            expected: 2,
            actual: operands.len(),
        }),
    }
}

fn compile_term(term: &Term) -> Result<Expression, CompileError> {
    match term {
        Term::Boolean(b) => Ok(Expression::Boolean(*b)),
        Term::String(s) => Ok(Expression::String(s.clone())),
        Term::Var(name) => Ok(Expression::Variable(Variable::new(vec![name.clone()]))),
        Term::Ref(parts) => compile_ref(term, parts),
        Term::Set(items) => Ok(Expression::Set(
            items
                .iter()
                .map(compile_term)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Term::Number(_) | Term::Array(_) => Err(CompileError::UnsupportedTerm(term.kind())),
    }
}

fn compile_ref(term: &Term, parts: &[Term]) -> Result<Expression, CompileError> {
    let Some((Term::Var(root), rest)) = parts.split_first() else {
        return Err(CompileError::InvalidReference(term.to_string()));
    };
    let mut path = Vec::with_capacity(parts.len());
    path.push(root.clone());
    for seg in rest {
        match seg {
            Term::String(s) => path.push(s.clone()),
            other => return Err(CompileError::UnsupportedTerm(other.kind())),
        }
    }
    Ok(Expression::Variable(Variable::new(path)))
}
