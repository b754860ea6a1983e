//!
//! Projection: the columns and expressions requested from the engine.
//!

use crate::expr::{Expr, Predicate};

/// # Select
///
/// Everything an engine needs to produce raw rows for one query.
///
/// Raw rows produced for a select are positionally ordered as `extra`,
/// then `columns`, then `expressions`.
#[derive(Clone, Debug)]
pub struct Select {
    pub from: &'static str,

    /// Engine-level selections, always first in a row.
    pub extra: Vec<(String, Expr)>,

    /// Plain columns, in submission order.
    pub columns: Vec<String>,

    /// Engine-evaluated annotations, in submission order.
    pub expressions: Vec<(String, Expr)>,

    /// Where clause
    pub predicate: Option<Predicate>,
}

impl Select {
    /// Row layout: the name of every position in a raw row.
    pub fn row_names(&self) -> Vec<String> {
        self.extra
            .iter()
            .map(|(alias, _)| alias.clone())
            .chain(self.columns.iter().cloned())
            .chain(self.expressions.iter().map(|(alias, _)| alias.clone()))
            .collect()
    }
}

/// A select accepted by an engine. Immutable once built.
#[derive(Clone, Debug)]
pub struct ProjectionRequest {
    select: Select,
}

impl ProjectionRequest {
    /// Engines call this once a select has been validated.
    pub fn new(select: Select) -> Self {
        Self { select }
    }

    pub fn select(&self) -> &Select {
        &self.select
    }

    pub fn from(&self) -> &'static str {
        self.select.from
    }

    pub fn columns(&self) -> &[String] {
        &self.select.columns
    }

    pub fn expressions(&self) -> &[(String, Expr)] {
        &self.select.expressions
    }

    pub fn row_names(&self) -> Vec<String> {
        self.select.row_names()
    }
}

/// Columns and expressions collected while augmenting a `records()` call.
///
/// Columns are kept once, in first-seen order. Expressions are keyed by
/// alias; a later expression under the same alias replaces the earlier one.
#[derive(Clone, Debug, Default)]
pub struct Projection {
    columns: Vec<String>,
    expressions: Vec<(String, Expr)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_column(&mut self, column: impl Into<String>) -> bool {
        let column = column.into();
        if self.contains_column(&column) {
            return false;
        }
        self.columns.push(column);
        true
    }

    pub fn push_expression(&mut self, alias: impl Into<String>, expr: Expr) {
        let alias = alias.into();
        match self.expressions.iter_mut().find(|(existing, _)| *existing == alias) {
            Some((_, existing)) => *existing = expr,
            None => self.expressions.push((alias, expr)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.columns.retain(|column| column != name);
        self.expressions.retain(|(alias, _)| alias != name);
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.iter().any(|existing| existing == column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn expressions(&self) -> &[(String, Expr)] {
        &self.expressions
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<(String, Expr)>) {
        (self.columns, self.expressions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_deduplicated_in_order() {
        let mut projection = Projection::new();
        assert!(projection.push_column("one"));
        assert!(projection.push_column("id"));
        assert!(!projection.push_column("one"));
        assert_eq!(projection.columns(), ["one", "id"]);
    }

    #[test]
    fn expressions_replace_by_alias() {
        let mut projection = Projection::new();
        projection.push_expression("two", Expr::field("a"));
        projection.push_expression("three", Expr::field("b"));
        projection.push_expression("two", Expr::field("c"));
        assert_eq!(
            projection.expressions(),
            [
                ("two".to_string(), Expr::field("c")),
                ("three".to_string(), Expr::field("b"))
            ]
        );
    }

    #[test]
    fn row_layout_is_extra_columns_expressions() {
        let select = Select {
            from: "celestial",
            extra: vec![("lit".into(), Expr::value(1))],
            columns: vec!["id".into(), "name".into()],
            expressions: vec![("orbits_name".into(), Expr::field("orbits__name"))],
            predicate: None,
        };
        assert_eq!(
            select.row_names(),
            vec!["lit", "id", "name", "orbits_name"]
        );
    }
}
