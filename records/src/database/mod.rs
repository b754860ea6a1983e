//!
//! Query engine implementations.
//!

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryEngine;

#[cfg(feature = "postgres")]
pub use postgres::PgEngine;

use crate::engine::EngineError;
use crate::expr::{Expr, Lookup, Predicate};

/// Reject predicates no engine can evaluate, before anything is executed.
pub(crate) fn check_predicate(predicate: &Predicate) -> Result<(), EngineError> {
    match predicate {
        Predicate::And(clauses) | Predicate::Or(clauses) => {
            clauses.iter().try_for_each(check_predicate)
        }
        Predicate::Not(inner) => check_predicate(inner),
        Predicate::Compare { lookup, rhs, .. } => match lookup {
            Lookup::In if !rhs.is_array() => Err(EngineError::InvalidExpression(format!(
                "'in' lookup needs a list, got {}",
                rhs
            ))),
            Lookup::IsNull if !rhs.is_boolean() => Err(EngineError::InvalidExpression(format!(
                "'isnull' lookup needs a boolean, got {}",
                rhs
            ))),
            _ => Ok(()),
        },
    }
}

pub(crate) fn check_expr(expr: &Expr) -> Result<(), EngineError> {
    match expr {
        Expr::Concat(parts) if parts.is_empty() => Err(EngineError::InvalidExpression(
            "concatenation of nothing".to_string(),
        )),
        Expr::Concat(parts) => parts.iter().try_for_each(check_expr),
        Expr::Field(_) | Expr::Value(_) => Ok(()),
    }
}
