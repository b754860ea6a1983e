//!
//! The query engine boundary.
//!
//! An engine turns a [`Select`] into a validated [`ProjectionRequest`] and
//! later executes that request, handing out raw rows through a [`Cursor`].
//! Rows are positional; their layout is given by
//! [`ProjectionRequest::row_names`].
//!

use async_trait::async_trait;

use crate::project::{ProjectionRequest, Select};
use crate::value::Value;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Cannot resolve keyword '{field}' into field of '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("'{0}' is projected more than once")]
    DuplicateName(String),

    #[error("Row has {actual} values, projection expects {expected}")]
    RowArity { expected: usize, actual: usize },

    #[error("Unsupported column type '{0}'")]
    UnsupportedType(String),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One row as produced by an engine, in projection order.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRow(Vec<Value>);

impl RawRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for RawRow {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Knobs for executing a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchOptions {
    /// Rows an engine may buffer per round-trip.
    pub chunk_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

/// Forward-only source of raw rows.
#[async_trait]
pub trait Cursor: Send {
    /// The next raw row, or `None` once exhausted.
    async fn next_row(&mut self) -> Result<Option<RawRow>, EngineError>;
}

#[async_trait]
pub trait QueryEngine: Send + Sync + 'static {
    /// Validate a select and freeze it into a request.
    ///
    /// Field paths that do not resolve are reported here, before anything
    /// is executed.
    fn build_projection(&self, select: Select) -> Result<ProjectionRequest, EngineError>;

    /// Start executing a request. No row is materialized before the
    /// returned cursor is polled.
    async fn execute(
        &self,
        request: &ProjectionRequest,
        options: &FetchOptions,
    ) -> Result<Box<dyn Cursor>, EngineError>;
}

/// A cursor over rows that are already in memory.
pub struct VecCursor {
    rows: std::vec::IntoIter<RawRow>,
}

impl VecCursor {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

#[async_trait]
impl Cursor for VecCursor {
    async fn next_row(&mut self) -> Result<Option<RawRow>, EngineError> {
        Ok(self.rows.next())
    }
}
