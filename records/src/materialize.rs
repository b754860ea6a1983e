//!
//! Turning raw rows into records.
//!
//! Each row goes through four states:
//!
//! ```text
//! Fetched -> PerFieldResolved -> PostProcessed -> Constructed
//! ```
//!

use crate::engine::{EngineError, RawRow};
use crate::handler::Handler;
use crate::resolver::{FieldResolver, Pass};
use crate::value::{Mapping, Value};
use crate::{RecordError, RecordResult};

/// Resolvers of one `records()` call, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ResolverSet {
    entries: Vec<(String, FieldResolver)>,
    skipped: Vec<String>,
}

impl ResolverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resolver for `key`, replacing an existing one in place.
    pub fn insert(&mut self, key: impl Into<String>, resolver: FieldResolver) {
        let key = key.into();
        self.skipped.retain(|skipped| *skipped != key);
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, existing)) => *existing = resolver,
            None => self.entries.push((key, resolver)),
        }
    }

    /// Mark `key` as skipped: it is removed from the final mapping.
    pub fn skip(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.entries.retain(|(existing, _)| *existing != key);
        if !self.skipped.contains(&key) {
            self.skipped.push(key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    pub fn is_skipped(&self, key: &str) -> bool {
        self.skipped.iter().any(|skipped| skipped == key)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.skipped.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldResolver)> {
        self.entries
            .iter()
            .map(|(key, resolver)| (key.as_str(), resolver))
    }

    pub fn per_field(&self) -> impl Iterator<Item = (&str, &FieldResolver)> {
        self.iter()
            .filter(|(_, resolver)| resolver.pass() == Pass::PerField)
    }

    pub fn post_processors(&self) -> impl Iterator<Item = &FieldResolver> {
        self.iter()
            .map(|(_, resolver)| resolver)
            .filter(|resolver| resolver.pass() == Pass::PostProcess)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.skipped.is_empty()
    }
}

/// Per-query row transform, shared by every row of a stream.
pub(crate) struct Materializer<R> {
    entity: &'static str,
    names: Vec<String>,
    resolvers: ResolverSet,
    handler: Handler<R>,
}

impl<R: 'static> Materializer<R> {
    pub fn new(
        entity: &'static str,
        names: Vec<String>,
        resolvers: ResolverSet,
        handler: Handler<R>,
    ) -> Self {
        Self {
            entity,
            names,
            resolvers,
            handler,
        }
    }

    pub fn resolvers(&self) -> &ResolverSet {
        &self.resolvers
    }

    pub fn materialize(&self, row: RawRow) -> RecordResult<R> {
        let mapping = self.fetched(row)?;
        let mapping = self.resolve_fields(mapping)?;
        let mut mapping = self.post_process(mapping)?;

        mapping.retain(|key, _| !self.resolvers.is_skipped(key));

        log::trace!("materializing '{}' record with {} keys", self.entity, mapping.len());

        self.handler
            .create(mapping)
            .map_err(|err| RecordError::instance("Error creating record instance", err))
    }

    /// Name the positional values of a raw row.
    fn fetched(&self, row: RawRow) -> RecordResult<Mapping> {
        if row.len() != self.names.len() {
            return Err(RecordError::instance(
                "Raw row does not match the projection",
                EngineError::RowArity {
                    expected: self.names.len(),
                    actual: row.len(),
                },
            ));
        }

        Ok(self.names.iter().cloned().zip(row.into_values()).collect())
    }

    /// Apply per-field resolvers in declaration order over one working
    /// mapping; a resolver sees the output of resolvers declared before it.
    fn resolve_fields(&self, mut mapping: Mapping) -> RecordResult<Mapping> {
        for (key, resolver) in self.resolvers.per_field() {
            let row = Value::Object(std::mem::take(&mut mapping));
            let value = resolver.resolve(&row);
            if let Value::Object(resolved) = row {
                mapping = resolved;
            }
            mapping.insert(key.to_string(), value?);
        }
        Ok(mapping)
    }

    /// Run post-processors in declaration order. A replacement mapping
    /// becomes the input of the next post-processor.
    fn post_process(&self, mut mapping: Mapping) -> RecordResult<Mapping> {
        for processor in self.resolvers.post_processors() {
            if let Some(replacement) = processor.post_process(&mapping)? {
                mapping = replacement;
            }
        }
        Ok(mapping)
    }
}
