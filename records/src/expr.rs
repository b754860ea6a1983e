//!
//! Engine-evaluated expressions and predicates.
//!
//! These are opaque to record materialization: the augmenter passes them
//! straight through to the projection, and engines lower them.
//!

use crate::value::Value;

/// Separator for relation traversal in field paths, e.g. `orbits__name`.
pub const PATH_SEPARATOR: &str = "__";

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Reference to a column, possibly across relations.
    Field(String),
    /// Constant evaluated by the engine.
    Value(Value),
    /// String concatenation, skipping nulls.
    Concat(Vec<Expr>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Self::Concat(parts.into_iter().collect())
    }

    /// Visit every field path referenced by this expression.
    pub fn visit_fields<'a>(&'a self, visit: &mut dyn FnMut(&'a str)) {
        match self {
            Self::Field(path) => visit(path),
            Self::Value(_) => {}
            Self::Concat(parts) => {
                for part in parts {
                    part.visit_fields(visit);
                }
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Comparison applied by a filter, named after its path suffix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    Exact,
    Lt,
    Lte,
    Gt,
    Gte,
    IsNull,
    In,
    Contains,
}

impl Lookup {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "exact" => Some(Self::Exact),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "isnull" => Some(Self::IsNull),
            "in" => Some(Self::In),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::IsNull => "isnull",
            Self::In => "in",
            Self::Contains => "contains",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        lhs: Expr,
        lookup: Lookup,
        rhs: Value,
    },
}

impl Predicate {
    pub fn visit_fields<'a>(&'a self, visit: &mut dyn FnMut(&'a str)) {
        match self {
            Self::And(clauses) | Self::Or(clauses) => {
                for clause in clauses {
                    clause.visit_fields(visit);
                }
            }
            Self::Not(inner) => inner.visit_fields(visit),
            Self::Compare { lhs, .. } => lhs.visit_fields(visit),
        }
    }

    /// Conjunction of two optional predicates, flattening nested `And`s.
    pub fn and(lhs: Option<Predicate>, rhs: Predicate) -> Predicate {
        match (lhs, rhs) {
            (None, rhs) => rhs,
            (Some(Self::And(mut lhs)), Self::And(rhs)) => {
                lhs.extend(rhs);
                Self::And(lhs)
            }
            (Some(Self::And(mut lhs)), rhs) => {
                lhs.push(rhs);
                Self::And(lhs)
            }
            (Some(lhs), Self::And(rhs)) => Self::And(Some(lhs).into_iter().chain(rhs).collect()),
            (Some(lhs), rhs) => Self::And(vec![lhs, rhs]),
        }
    }
}
