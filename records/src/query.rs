//!
//! Query sets: an entity, a predicate and the settings `records()` runs with.
//!

use std::marker::PhantomData;
use std::sync::Arc;

use crate::augment::{augment, Augmented, Records};
use crate::engine::{FetchOptions, QueryEngine};
use crate::expr::{Expr, Predicate};
use crate::filter::Filter;
use crate::handler::{resolve_handler, BoundHandler, Handler, RecordHandler};
use crate::materialize::Materializer;
use crate::project::Select;
use crate::registry::HandlerRegistry;
use crate::stream::RecordStream;
use crate::{Entity, RecordError, RecordResult};

/// A lazily evaluated query over entity `E`.
///
/// Refinement methods return a new query set; the original is unchanged.
pub struct QuerySet<E> {
    engine: Arc<dyn QueryEngine>,
    registry: Option<Arc<HandlerRegistry>>,
    predicate: Option<Predicate>,
    extra: Vec<(String, Expr)>,
    bound: Option<BoundHandler>,
    options: FetchOptions,
    entity: PhantomData<fn() -> E>,
}

impl<E> Clone for QuerySet<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            registry: self.registry.clone(),
            predicate: self.predicate.clone(),
            extra: self.extra.clone(),
            bound: self.bound.clone(),
            options: self.options.clone(),
            entity: PhantomData,
        }
    }
}

impl<E: Entity> QuerySet<E> {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self {
            engine,
            registry: None,
            predicate: None,
            extra: vec![],
            bound: None,
            options: FetchOptions::default(),
            entity: PhantomData,
        }
    }

    /// Look up entity default handlers in `registry` instead of the global one.
    pub fn with_registry(&self, registry: Arc<HandlerRegistry>) -> Self {
        let mut query = self.clone();
        query.registry = Some(registry);
        query
    }

    /// Add an engine-level selection. Extra selections come first in raw rows.
    pub fn extra(&self, alias: impl Into<String>, expr: Expr) -> Self {
        let mut query = self.clone();
        query.extra.push((alias.into(), expr));
        query
    }

    pub fn chunk_size(&self, chunk_size: usize) -> Self {
        let mut query = self.clone();
        query.options.chunk_size = chunk_size.max(1);
        query
    }

    /// Bind a default handler to this query and every query derived from it.
    pub fn record_into<H: RecordHandler>(&self, handler: H) -> Self {
        self.record_into_handler::<H::Record>(Arc::new(handler))
    }

    pub fn record_into_handler<R: 'static>(&self, handler: Handler<R>) -> Self {
        let mut query = self.clone();
        query.bound = Some(BoundHandler::new(handler));
        query
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    ///
    /// Build a lazy stream of records.
    ///
    /// The handler comes from `args`, else from [`QuerySet::record_into`],
    /// else from the entity's registered default. Handler and projection
    /// errors are reported here; rows are only fetched once the stream is
    /// polled.
    ///
    pub fn records<R: 'static>(&self, mut args: Records<R>) -> RecordResult<RecordStream<R>> {
        let entity_default = match &self.registry {
            Some(registry) => registry.lookup::<E>(),
            None => HandlerRegistry::global().lookup::<E>(),
        };

        let (handler, source) = resolve_handler(
            args.take_handler(),
            self.bound.as_ref(),
            entity_default.as_ref(),
        )?;

        log::debug!(
            "records() on '{}': {:?} handler for {}",
            E::table(),
            source,
            std::any::type_name::<R>()
        );

        let Augmented {
            projection,
            resolvers,
        } = augment(args, handler.as_ref())?;

        let (columns, expressions) = projection.into_parts();
        let select = Select {
            from: E::table(),
            extra: self.extra.clone(),
            columns,
            expressions,
            predicate: self.predicate.clone(),
        };

        let request = self
            .engine
            .build_projection(select)
            .map_err(|err| RecordError::instance("Error with calculated values", err))?;

        let names = request.row_names();
        log::debug!("records() on '{}': projecting {:?}", E::table(), names);

        let materializer = Materializer::new(E::table(), names, resolvers, handler);

        Ok(RecordStream::new(
            self.engine.clone(),
            request,
            self.options.clone(),
            materializer,
        ))
    }
}

impl<E: Entity> Filter for QuerySet<E> {
    fn filter_by(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(Predicate::and(self.predicate.take(), predicate));
        self
    }
}

impl<E: Entity> std::fmt::Debug for QuerySet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("entity", &E::table())
            .field("predicate", &self.predicate)
            .field("extra", &self.extra)
            .field("bound", &self.bound)
            .field("options", &self.options)
            .finish()
    }
}
