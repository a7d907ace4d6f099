//! Partial-evaluation residuals, their compiled form, and SQL rendering.

pub mod ast;
pub mod compiler;
pub mod residual;
pub mod sql;

pub use ast::{Expression, Variable};
pub use compiler::compile;
pub use residual::{Body, Expr, PartialQueries, SupportRule, Term};
pub use sql::{ColumnType, SqlColumn, SqlConfig};
