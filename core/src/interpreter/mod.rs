//! Pseudo-execution engine for Python and Java sources
//!
//! Lines are recognized by a per-dialect statement scanner and executed in a
//! single pass against a run-scoped [`Environment`]. The engine is not a
//! language implementation: it understands print statements, input sites,
//! assignments and a small expression grammar, and shows everything else as
//! written.

pub mod dialect;
pub mod env;
pub mod executor;
pub mod expressions;
pub mod statements;
pub mod values;

#[cfg(test)]
mod tests;

pub use dialect::Dialect;
pub use env::Environment;
pub use executor::{run_program, ExecError, ExecutionContext};
pub use expressions::{eval_expr, evaluate_interpolated, Evaluation, DIVISION_BY_ZERO};
pub use statements::{scan_lines, InputSite, Line, PrintEnd, Stmt, Stream};
pub use values::{Val, ValueError, ValueKind};
