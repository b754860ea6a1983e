//!
//! Typed records on top of a relational query engine.
//!
//! ```text
//! records(handler, fields.., key = resolver..)
//!        |
//!        v
//!    augment ----> ProjectionRequest ----> QueryEngine ----> Cursor
//!        |                                                     |
//!        v                                                 raw rows
//!  ResolverSet + Handler --------------> Materializer <--------'
//!                                            |
//!                                            v
//!                                          Record
//! ```
//!
//! A call to [`QuerySet::records`] reconciles explicitly requested fields,
//! columns wanted by resolvers and the fields a [`RecordHandler`] requires
//! into one projection. Iterating the returned [`RecordStream`] pulls raw rows
//! from the engine one at a time and runs them through resolvers before the
//! handler builds the output record.
//!

extern crate self as records;

#[cfg(feature = "derive")]
pub use records_macros::*;

pub mod augment;
pub mod catalog;
pub mod database;
pub mod engine;
pub mod expr;
pub mod filter;
pub mod handler;
pub mod prelude;
pub mod project;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod stream;
pub mod value;

#[cfg(feature = "postgres")]
mod builder;
mod materialize;

pub use augment::{FieldSpec, Records};
pub use handler::{Handler, Record, RecordDict, RecordFn, RecordHandler, RecordStruct};
pub use materialize::ResolverSet;
pub use query::QuerySet;
pub use registry::HandlerRegistry;
pub use resolver::FieldResolver;
pub use stream::RecordStream;

/// A queryable entity type, i.e. something rows are fetched for.
///
/// The type itself is used as the identity key for default record handlers
/// in the [`HandlerRegistry`].
pub trait Entity: Send + Sync + 'static {
    /// Name of the table in the engine's catalog.
    fn table() -> &'static str;

    /// Start a query over this entity.
    fn objects(engine: std::sync::Arc<dyn engine::QueryEngine>) -> QuerySet<Self>
    where
        Self: Sized,
    {
        QuerySet::new(engine)
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// No record handler could be resolved, or the handler's target type is malformed.
    #[error("Record class definition error: {0}")]
    ClassDefinition(String),

    /// Building the projection or a record instance failed.
    #[error("Record instance error: {message}")]
    Instance {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid resolver: {0}")]
    InvalidResolver(&'static str),

    /// Error raised inside a resolver callback, passed through untouched.
    #[error(transparent)]
    Resolver(BoxError),

    #[error("Fetch error: {0}")]
    Fetch(#[source] engine::EngineError),
}

impl RecordError {
    pub(crate) fn instance(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Instance {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn is_class_definition(&self) -> bool {
        matches!(self, Self::ClassDefinition(_))
    }

    pub fn is_instance(&self) -> bool {
        matches!(self, Self::Instance { .. })
    }
}

pub type RecordResult<T> = Result<T, RecordError>;
