//!
//! In-process query engine over rows held in memory.
//!
//! Tables are snapshotted when a request is executed; the cursor then scans,
//! filters and projects one row per poll. Rows inserted after execution are
//! not seen by that cursor.
//!

use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{check_expr, check_predicate};
use crate::catalog::Catalog;
use crate::engine::{Cursor, EngineError, FetchOptions, QueryEngine, RawRow};
use crate::expr::{Expr, Lookup, Predicate};
use crate::project::{ProjectionRequest, Select};
use crate::value::{concat_text, Mapping, Value};

type Tables = BTreeMap<String, Vec<Mapping>>;

pub struct MemoryEngine {
    catalog: Arc<Catalog>,
    tables: RwLock<Arc<Tables>>,
}

impl MemoryEngine {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            tables: RwLock::new(Arc::new(Tables::new())),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Insert a row into `table` and return its primary key.
    ///
    /// Columns not given are null. A missing or null primary key is assigned
    /// the next integer.
    pub fn insert(&self, table: &str, row: Value) -> Result<Value, EngineError> {
        let def = self.catalog.get(table)?;
        let mut values = match row {
            Value::Object(values) => values,
            other => {
                return Err(EngineError::InvalidExpression(format!(
                    "cannot insert {} into '{}'",
                    other, table
                )))
            }
        };

        if let Some(unknown) = values.keys().find(|key| !def.has_column(key)) {
            return Err(EngineError::UnknownField {
                entity: table.to_string(),
                field: unknown.clone(),
            });
        }

        let mut guard = self.tables.write();
        let rows = Arc::make_mut(&mut *guard)
            .entry(def.name.clone())
            .or_default();

        let pk = match values.remove(&def.primary_key) {
            Some(pk) if !pk.is_null() => pk,
            _ => {
                let max = rows
                    .iter()
                    .filter_map(|row| row.get(&def.primary_key).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0);
                Value::from(max + 1)
            }
        };

        let mut stored = Mapping::new();
        for column in &def.columns {
            let value = if *column == def.primary_key {
                pk.clone()
            } else {
                values.remove(column).unwrap_or(Value::Null)
            };
            stored.insert(column.clone(), value);
        }
        rows.push(stored);

        Ok(pk)
    }

    /// Number of rows stored in `table`.
    pub fn count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl QueryEngine for MemoryEngine {
    fn build_projection(&self, select: Select) -> Result<ProjectionRequest, EngineError> {
        let select = self.catalog.prepare(select)?;
        for (_, expr) in select.extra.iter().chain(&select.expressions) {
            check_expr(expr)?;
        }
        if let Some(predicate) = &select.predicate {
            check_predicate(predicate)?;
        }
        Ok(ProjectionRequest::new(select))
    }

    async fn execute(
        &self,
        request: &ProjectionRequest,
        _options: &FetchOptions,
    ) -> Result<Box<dyn Cursor>, EngineError> {
        let tables = self.tables.read().clone();
        log::debug!(
            "scanning '{}' ({} rows)",
            request.from(),
            tables.get(request.from()).map_or(0, Vec::len)
        );

        Ok(Box::new(MemoryCursor {
            catalog: self.catalog.clone(),
            tables,
            select: request.select().clone(),
            position: 0,
        }))
    }
}

struct MemoryCursor {
    catalog: Arc<Catalog>,
    tables: Arc<Tables>,
    select: Select,
    position: usize,
}

#[async_trait]
impl Cursor for MemoryCursor {
    async fn next_row(&mut self) -> Result<Option<RawRow>, EngineError> {
        let rows = match self.tables.get(self.select.from) {
            Some(rows) => rows,
            None => return Ok(None),
        };

        while let Some(row) = rows.get(self.position) {
            self.position += 1;

            let scope = Scope {
                catalog: &self.catalog,
                tables: &self.tables,
                from: self.select.from,
                row,
            };

            if let Some(predicate) = &self.select.predicate {
                if !scope.test(predicate)? {
                    continue;
                }
            }

            return scope.project(&self.select).map(Some);
        }

        Ok(None)
    }
}

/// One row of the scanned table, with access to related tables.
struct Scope<'a> {
    catalog: &'a Catalog,
    tables: &'a Tables,
    from: &'a str,
    row: &'a Mapping,
}

impl<'a> Scope<'a> {
    /// Follow a field path over relations. A null or dangling foreign key
    /// yields null, like a left join.
    fn field(&self, path: &str) -> Result<Value, EngineError> {
        let resolved = self.catalog.resolve_path(self.from, path)?;

        let mut row: &'a Mapping = self.row;
        for hop in &resolved.hops {
            let key = match row.get(&hop.relation.column) {
                Some(key) if !key.is_null() => key,
                _ => return Ok(Value::Null),
            };

            let tables: &'a Tables = self.tables;
            let target = tables.get(&hop.to.name).and_then(|rows| {
                rows.iter().find(|candidate| {
                    candidate
                        .get(&hop.to.primary_key)
                        .map_or(false, |pk| equal(pk, key))
                })
            });

            match target {
                Some(target) => row = target,
                None => return Ok(Value::Null),
            }
        }

        Ok(row.get(resolved.column).cloned().unwrap_or(Value::Null))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, EngineError> {
        match expr {
            Expr::Field(path) => self.field(path),
            Expr::Value(value) => Ok(value.clone()),
            Expr::Concat(parts) => {
                let mut text = String::new();
                for part in parts {
                    if let Some(piece) = concat_text(&self.eval(part)?) {
                        text.push_str(&piece);
                    }
                }
                Ok(Value::String(text))
            }
        }
    }

    fn test(&self, predicate: &Predicate) -> Result<bool, EngineError> {
        match predicate {
            Predicate::And(clauses) => {
                for clause in clauses {
                    if !self.test(clause)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(clauses) => {
                for clause in clauses {
                    if self.test(clause)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(inner) => Ok(!self.test(inner)?),
            Predicate::Compare { lhs, lookup, rhs } => Ok(compare(&self.eval(lhs)?, *lookup, rhs)),
        }
    }

    /// Values in raw row order: extra, columns, expressions.
    fn project(&self, select: &Select) -> Result<RawRow, EngineError> {
        let mut values =
            Vec::with_capacity(select.extra.len() + select.columns.len() + select.expressions.len());

        for (_, expr) in &select.extra {
            values.push(self.eval(expr)?);
        }
        for column in &select.columns {
            values.push(self.field(column)?);
        }
        for (_, expr) in &select.expressions {
            values.push(self.eval(expr)?);
        }

        Ok(RawRow::new(values))
    }
}

fn order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(lhs), Value::Number(rhs)) => match (lhs.as_i64(), rhs.as_i64()) {
            (Some(lhs), Some(rhs)) => Some(lhs.cmp(&rhs)),
            _ => lhs.as_f64()?.partial_cmp(&rhs.as_f64()?),
        },
        (Value::String(lhs), Value::String(rhs)) => Some(lhs.cmp(rhs)),
        (Value::Bool(lhs), Value::Bool(rhs)) => Some(lhs.cmp(rhs)),
        _ => None,
    }
}

fn equal(lhs: &Value, rhs: &Value) -> bool {
    order(lhs, rhs).map_or(lhs == rhs, Ordering::is_eq)
}

/// SQL-like comparison: null compares unequal to everything.
fn compare(lhs: &Value, lookup: Lookup, rhs: &Value) -> bool {
    if lhs.is_null() && lookup != Lookup::IsNull {
        return rhs.is_null() && lookup == Lookup::Exact;
    }

    match lookup {
        Lookup::Exact => equal(lhs, rhs),
        Lookup::Lt => order(lhs, rhs) == Some(Ordering::Less),
        Lookup::Lte => order(lhs, rhs).map_or(false, Ordering::is_le),
        Lookup::Gt => order(lhs, rhs) == Some(Ordering::Greater),
        Lookup::Gte => order(lhs, rhs).map_or(false, Ordering::is_ge),
        Lookup::IsNull => lhs.is_null() == rhs.as_bool().unwrap_or(true),
        Lookup::In => rhs
            .as_array()
            .map_or(false, |candidates| candidates.iter().any(|c| equal(lhs, c))),
        Lookup::Contains => match (lhs, rhs) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| equal(item, needle)),
            _ => false,
        },
    }
}
