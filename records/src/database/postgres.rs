//!
//! Postgres engine on top of `sqlx`.
//!
//! A request is rendered into one `SELECT`, joining every relation its
//! field paths traverse. Rows are streamed through a server-side cursor
//! inside a transaction, `chunk_size` rows per round-trip. Dropping the
//! cursor before exhaustion rolls that transaction back.
//!

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, Transaction, TypeInfo};
use std::collections::VecDeque;
use std::sync::Arc;

use super::{check_expr, check_predicate};
use crate::builder::{Param, QueryBuilder};
use crate::catalog::{Catalog, Hop};
use crate::engine::{Cursor, EngineError, FetchOptions, QueryEngine, RawRow};
use crate::expr::{Expr, Lookup, Predicate};
use crate::project::{ProjectionRequest, Select};
use crate::value::Value;

const CURSOR_NAME: &str = "records_cursor";

pub struct PgEngine {
    pool: PgPool,
    catalog: Arc<Catalog>,
}

impl PgEngine {
    pub fn new(pool: PgPool, catalog: Catalog) -> Self {
        Self {
            pool,
            catalog: Arc::new(catalog),
        }
    }

    pub async fn connect(url: &str, catalog: Catalog) -> Result<Self, EngineError> {
        let pool = PgPoolOptions::new().connect(url).await?;
        Ok(Self::new(pool, catalog))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryEngine for PgEngine {
    fn build_projection(&self, select: Select) -> Result<ProjectionRequest, EngineError> {
        let select = self.catalog.prepare(select)?;
        for (_, expr) in select.extra.iter().chain(&select.expressions) {
            check_expr(expr)?;
        }
        if let Some(predicate) = &select.predicate {
            check_predicate(predicate)?;
        }

        // Anything that renders here renders again at execution.
        render(&self.catalog, &select)?;

        Ok(ProjectionRequest::new(select))
    }

    async fn execute(
        &self,
        request: &ProjectionRequest,
        options: &FetchOptions,
    ) -> Result<Box<dyn Cursor>, EngineError> {
        let statement = render(&self.catalog, request.select())?;
        log::debug!("{}", statement.sql);

        let declare = format!(
            "DECLARE {} NO SCROLL CURSOR FOR {}",
            CURSOR_NAME, statement.sql
        );

        let mut tx = self.pool.begin().await?;
        bind(sqlx::query(&declare), &statement.params)
            .execute(&mut tx)
            .await?;

        Ok(Box::new(PgCursor {
            tx: Some(tx),
            fetch: format!("FETCH {} FROM {}", options.chunk_size, CURSOR_NAME),
            buffer: VecDeque::new(),
        }))
    }
}

struct PgCursor {
    /// `None` once the cursor is exhausted and the transaction committed.
    tx: Option<Transaction<'static, Postgres>>,
    fetch: String,
    buffer: VecDeque<RawRow>,
}

#[async_trait]
impl Cursor for PgCursor {
    async fn next_row(&mut self) -> Result<Option<RawRow>, EngineError> {
        if let Some(row) = self.buffer.pop_front() {
            return Ok(Some(row));
        }

        let tx = match self.tx.as_mut() {
            Some(tx) => tx,
            None => return Ok(None),
        };

        let rows = sqlx::query(&self.fetch).fetch_all(&mut *tx).await?;
        log::trace!("fetched {} rows from {}", rows.len(), CURSOR_NAME);

        if rows.is_empty() {
            if let Some(mut tx) = self.tx.take() {
                sqlx::query(&format!("CLOSE {}", CURSOR_NAME))
                    .execute(&mut tx)
                    .await?;
                tx.commit().await?;
            }
            return Ok(None);
        }

        for row in &rows {
            self.buffer.push_back(decode_row(row)?);
        }

        Ok(self.buffer.pop_front())
    }
}

fn bind<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Param],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Param::Bool(value) => query.bind(*value),
            Param::Int(value) => query.bind(*value),
            Param::Float(value) => query.bind(*value),
            Param::Text(value) => query.bind(value.as_str()),
            Param::IntArray(values) => query.bind(values.clone()),
            Param::TextArray(values) => query.bind(values.clone()),
            Param::Json(value) => query.bind(sqlx::types::Json(value.clone())),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> Result<RawRow, EngineError> {
    row.columns()
        .iter()
        .map(|column| decode(row, column.ordinal(), column.type_info().name()))
        .collect::<Result<Vec<_>, _>>()
        .map(RawRow::new)
}

fn decode(row: &PgRow, index: usize, type_name: &str) -> Result<Value, EngineError> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(Value::from),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::String)
        }
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(index)?
            .map(|uuid| Value::String(uuid.to_string())),
        other => return Err(EngineError::UnsupportedType(other.to_string())),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Rendered SQL with its parameters in placeholder order.
#[derive(Debug)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

struct Join {
    prefix: String,
    parent: String,
    table: String,
    primary_key: String,
    foreign_key: String,
}

/// Left joins needed by a select, one per distinct relation path prefix.
#[derive(Default)]
struct Joins {
    joins: Vec<Join>,
}

impl Joins {
    fn register(&mut self, hops: &[Hop<'_>]) {
        for hop in hops {
            if self.joins.iter().any(|join| join.prefix == hop.prefix) {
                continue;
            }
            let parent = match hop.prefix.rsplit_once(crate::expr::PATH_SEPARATOR) {
                Some((parent, _)) => self.alias(parent),
                None => ROOT_ALIAS.to_string(),
            };
            self.joins.push(Join {
                prefix: hop.prefix.clone(),
                parent,
                table: hop.to.name.clone(),
                primary_key: hop.to.primary_key.clone(),
                foreign_key: hop.relation.column.clone(),
            });
        }
    }

    fn alias(&self, prefix: &str) -> String {
        match self.joins.iter().position(|join| join.prefix == prefix) {
            Some(position) => format!("t{}", position + 1),
            None => ROOT_ALIAS.to_string(),
        }
    }
}

const ROOT_ALIAS: &str = "t0";

struct Ctx<'a> {
    catalog: &'a Catalog,
    from: &'a str,
    joins: Joins,
}

pub(crate) fn render(catalog: &Catalog, select: &Select) -> Result<Statement, EngineError> {
    let mut paths: Vec<&str> = select.columns.iter().map(String::as_str).collect();
    for (_, expr) in select.extra.iter().chain(&select.expressions) {
        expr.visit_fields(&mut |path| paths.push(path));
    }
    if let Some(predicate) = &select.predicate {
        predicate.visit_fields(&mut |path| paths.push(path));
    }

    let mut joins = Joins::default();
    for path in paths {
        joins.register(&catalog.resolve_path(select.from, path)?.hops);
    }

    let ctx = Ctx {
        catalog,
        from: select.from,
        joins,
    };
    let mut builder = QueryBuilder::new();

    builder.push("SELECT");
    builder.indent();
    let mut first = true;
    for (alias, expr) in &select.extra {
        ctx.separate(&mut builder, &mut first);
        ctx.write_expr(&mut builder, expr)?;
        ctx.write_alias(&mut builder, alias);
    }
    for column in &select.columns {
        ctx.separate(&mut builder, &mut first);
        ctx.write_field(&mut builder, column)?;
        ctx.write_alias(&mut builder, column);
    }
    for (alias, expr) in &select.expressions {
        ctx.separate(&mut builder, &mut first);
        ctx.write_expr(&mut builder, expr)?;
        ctx.write_alias(&mut builder, alias);
    }
    builder.outdent();

    builder.newline();
    builder.push("FROM ");
    builder.push_ident(&catalog.get(select.from)?.name);
    builder.push(" ");
    builder.push(ROOT_ALIAS);

    for (position, join) in ctx.joins.joins.iter().enumerate() {
        let alias = format!("t{}", position + 1);
        builder.newline();
        builder.push("LEFT JOIN ");
        builder.push_ident(&join.table);
        builder.push(&format!(" {} ON {}.", alias, alias));
        builder.push_ident(&join.primary_key);
        builder.push(&format!(" = {}.", join.parent));
        builder.push_ident(&join.foreign_key);
    }

    if let Some(predicate) = &select.predicate {
        builder.newline();
        builder.push("WHERE");
        builder.indent();
        builder.newline();
        ctx.write_predicate(&mut builder, predicate)?;
        builder.outdent();
    }

    let (sql, params) = builder.build();
    Ok(Statement { sql, params })
}

impl<'a> Ctx<'a> {
    fn separate(&self, builder: &mut QueryBuilder, first: &mut bool) {
        if !*first {
            builder.push(",");
        }
        *first = false;
        builder.newline();
    }

    fn write_alias(&self, builder: &mut QueryBuilder, alias: &str) {
        builder.push(" AS ");
        builder.push_ident(alias);
    }

    fn write_field(&self, builder: &mut QueryBuilder, path: &str) -> Result<(), EngineError> {
        let resolved = self.catalog.resolve_path(self.from, path)?;
        let alias = match resolved.hops.last() {
            Some(hop) => self.joins.alias(&hop.prefix),
            None => ROOT_ALIAS.to_string(),
        };
        builder.push(&alias);
        builder.push(".");
        builder.push_ident(resolved.column);
        Ok(())
    }

    fn write_value(&self, builder: &mut QueryBuilder, value: &Value) -> Result<(), EngineError> {
        if value.is_null() {
            builder.push("NULL");
        } else {
            builder.push_param(Param::from_value(value)?);
        }
        Ok(())
    }

    fn write_expr(&self, builder: &mut QueryBuilder, expr: &Expr) -> Result<(), EngineError> {
        match expr {
            Expr::Field(path) => self.write_field(builder, path),
            Expr::Value(value) => self.write_value(builder, value),
            Expr::Concat(parts) => {
                builder.push("concat(");
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        builder.push(", ");
                    }
                    self.write_expr(builder, part)?;
                }
                builder.push(")");
                Ok(())
            }
        }
    }

    fn write_junction(
        &self,
        builder: &mut QueryBuilder,
        clauses: &[Predicate],
        operator: &str,
        empty: &str,
    ) -> Result<(), EngineError> {
        if clauses.is_empty() {
            builder.push(empty);
            return Ok(());
        }
        for (index, clause) in clauses.iter().enumerate() {
            if index > 0 {
                builder.push(operator);
            }
            builder.push("(");
            self.write_predicate(builder, clause)?;
            builder.push(")");
        }
        Ok(())
    }

    fn write_predicate(
        &self,
        builder: &mut QueryBuilder,
        predicate: &Predicate,
    ) -> Result<(), EngineError> {
        match predicate {
            Predicate::And(clauses) => self.write_junction(builder, clauses, " AND ", "TRUE"),
            Predicate::Or(clauses) => self.write_junction(builder, clauses, " OR ", "FALSE"),
            Predicate::Not(inner) => {
                builder.push("NOT (");
                self.write_predicate(builder, inner)?;
                builder.push(")");
                Ok(())
            }
            Predicate::Compare { lhs, lookup, rhs } => self.write_compare(builder, lhs, *lookup, rhs),
        }
    }

    fn write_compare(
        &self,
        builder: &mut QueryBuilder,
        lhs: &Expr,
        lookup: Lookup,
        rhs: &Value,
    ) -> Result<(), EngineError> {
        let operator = match lookup {
            Lookup::IsNull => {
                self.write_expr(builder, lhs)?;
                builder.push(match rhs.as_bool() {
                    Some(false) => " IS NOT NULL",
                    _ => " IS NULL",
                });
                return Ok(());
            }
            Lookup::Exact if rhs.is_null() => {
                self.write_expr(builder, lhs)?;
                builder.push(" IS NULL");
                return Ok(());
            }
            Lookup::In if rhs.as_array().map_or(false, Vec::is_empty) => {
                builder.push("FALSE");
                return Ok(());
            }
            Lookup::In => {
                let param = Param::from_value(rhs)?;
                if !param.is_array() {
                    return Err(EngineError::InvalidExpression(format!(
                        "'in' lookup needs a list of integers or strings, got {}",
                        rhs
                    )));
                }
                self.write_expr(builder, lhs)?;
                builder.push(" = ANY(");
                builder.push_param(param);
                builder.push(")");
                return Ok(());
            }
            Lookup::Contains => {
                builder.push("strpos(CAST(");
                self.write_expr(builder, lhs)?;
                builder.push(" AS text), ");
                builder.push_param(Param::Text(match rhs {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                }));
                builder.push(") > 0");
                return Ok(());
            }
            Lookup::Exact => " = ",
            Lookup::Lt => " < ",
            Lookup::Lte => " <= ",
            Lookup::Gt => " > ",
            Lookup::Gte => " >= ",
        };

        self.write_expr(builder, lhs)?;
        builder.push(operator);
        self.write_value(builder, rhs)
    }
}
