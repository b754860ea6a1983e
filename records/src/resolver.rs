//!
//! Field resolvers: computed fields that are not plain columns.
//!
//! A resolver is attached to an output key in a `records()` call. Per-field
//! resolvers compute the value for their key from the fetched row, while
//! post-processors get to rewrite the whole row mapping once all per-field
//! resolvers are done.
//!

use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;
use crate::value::{Mapping, Value};
use crate::{BoxError, RecordError, RecordResult};

type ValueFn = dyn Fn(&Value) -> Result<Value, BoxError> + Send + Sync;
type MappingFn = dyn Fn(&Mapping) -> Result<Option<Mapping>, BoxError> + Send + Sync;

#[derive(Clone)]
pub enum FieldResolver {
    /// Always resolves to the same value.
    Fixed(Value),
    /// Resolves by calling a function with the current input.
    Mapped(Callback),
    /// Like `Mapped`, but a null input resolves to null without calling.
    MappedIfPresent(Callback),
    /// Reads another key of the input, optionally resolving it further.
    Referenced(Reference),
    /// Removes the key from both projection and output.
    Skip,
    /// Rewrites the whole row mapping after per-field resolution.
    PostProcess(PostProcessor),
}

/// When a resolver runs during materialization.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pass {
    PerField,
    PostProcess,
    Excluded,
}

/// What a resolver adds to the projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Contribution<'a> {
    Column(&'a str),
    Annotation(&'a str, &'a Expr),
}

impl FieldResolver {
    pub fn pass(&self) -> Pass {
        match self {
            Self::Skip => Pass::Excluded,
            Self::PostProcess(_) => Pass::PostProcess,
            _ => Pass::PerField,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    pub fn contributes_column(&self) -> Option<Contribution<'_>> {
        match self {
            Self::Referenced(reference) => Some(reference.contribution()),
            _ => None,
        }
    }

    /// Compute a value from `input`.
    ///
    /// At the top level `input` is the whole row as an object; inside a
    /// `Referenced` resolver it is the referenced value.
    pub fn resolve(&self, input: &Value) -> RecordResult<Value> {
        match self {
            Self::Fixed(value) => Ok(value.clone()),
            Self::Mapped(callback) => callback.call(input),
            Self::MappedIfPresent(callback) => {
                if input.is_null() {
                    Ok(Value::Null)
                } else {
                    callback.call(input)
                }
            }
            Self::Referenced(reference) => reference.resolve(input),
            Self::Skip => Err(RecordError::InvalidResolver("Skip never resolves a value")),
            Self::PostProcess(_) => Err(RecordError::InvalidResolver(
                "PostProcess rewrites the row instead of resolving a value",
            )),
        }
    }

    /// Rewrite the row mapping. `None` leaves it unchanged.
    pub fn post_process(&self, mapping: &Mapping) -> RecordResult<Option<Mapping>> {
        match self {
            Self::PostProcess(processor) => processor.call(mapping),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Mapped(_) => f.write_str("Mapped(..)"),
            Self::MappedIfPresent(_) => f.write_str("MappedIfPresent(..)"),
            Self::Referenced(reference) => f.debug_tuple("Referenced").field(reference).finish(),
            Self::Skip => f.write_str("Skip"),
            Self::PostProcess(_) => f.write_str("PostProcess(..)"),
        }
    }
}

#[derive(Clone)]
pub struct Callback(Arc<ValueFn>);

impl Callback {
    fn call(&self, input: &Value) -> RecordResult<Value> {
        (self.0)(input).map_err(RecordError::Resolver)
    }
}

#[derive(Clone)]
pub struct PostProcessor(Arc<MappingFn>);

impl PostProcessor {
    fn call(&self, mapping: &Mapping) -> RecordResult<Option<Mapping>> {
        (self.0)(mapping).map_err(RecordError::Resolver)
    }
}

#[derive(Clone, Debug)]
pub struct Reference {
    source: Source,
    inner: Option<Box<FieldResolver>>,
}

#[derive(Clone, Debug)]
enum Source {
    Column(String),
    Annotation(String, Expr),
}

impl Reference {
    pub fn key(&self) -> &str {
        match &self.source {
            Source::Column(key) => key,
            Source::Annotation(alias, _) => alias,
        }
    }

    pub fn inner(&self) -> Option<&FieldResolver> {
        self.inner.as_deref()
    }

    fn contribution(&self) -> Contribution<'_> {
        match &self.source {
            Source::Column(key) => Contribution::Column(key),
            Source::Annotation(alias, expr) => Contribution::Annotation(alias, expr),
        }
    }

    fn resolve(&self, input: &Value) -> RecordResult<Value> {
        let value = input.get(self.key()).cloned().unwrap_or(Value::Null);
        match &self.inner {
            Some(inner) => inner.resolve(&value),
            None => Ok(value),
        }
    }
}

pub fn fixed(value: impl Into<Value>) -> FieldResolver {
    FieldResolver::Fixed(value.into())
}

pub fn mapped<F, V>(func: F) -> FieldResolver
where
    F: Fn(&Value) -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    FieldResolver::Mapped(infallible(func))
}

pub fn try_mapped<F, V, E>(func: F) -> FieldResolver
where
    F: Fn(&Value) -> Result<V, E> + Send + Sync + 'static,
    V: Into<Value>,
    E: Into<BoxError>,
{
    FieldResolver::Mapped(fallible(func))
}

pub fn mapped_if_present<F, V>(func: F) -> FieldResolver
where
    F: Fn(&Value) -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    FieldResolver::MappedIfPresent(infallible(func))
}

/// Redirect the value of column `key` as-is.
pub fn referenced(key: impl Into<String>) -> RecordResult<FieldResolver> {
    reference(Source::Column(non_empty(key.into())?), None)
}

/// Read column `key` and pass it through `func`, unless it is null.
pub fn referenced_with<F, V>(key: impl Into<String>, func: F) -> RecordResult<FieldResolver>
where
    F: Fn(&Value) -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    referenced_via(key, mapped_if_present(func))
}

/// Read column `key` and resolve it further with `inner`.
pub fn referenced_via(
    key: impl Into<String>,
    inner: FieldResolver,
) -> RecordResult<FieldResolver> {
    reference(Source::Column(non_empty(key.into())?), Some(inner))
}

/// Reference an engine-evaluated expression projected under `alias`.
pub fn referenced_expr(
    alias: impl Into<String>,
    expr: Expr,
    inner: Option<FieldResolver>,
) -> RecordResult<FieldResolver> {
    reference(Source::Annotation(non_empty(alias.into())?, expr), inner)
}

pub fn skip() -> FieldResolver {
    FieldResolver::Skip
}

/// Rewrite the whole row mapping. Returning `None` keeps the mapping as it was.
pub fn post_process<F>(func: F) -> FieldResolver
where
    F: Fn(&Mapping) -> Option<Mapping> + Send + Sync + 'static,
{
    FieldResolver::PostProcess(PostProcessor(Arc::new(
        move |mapping: &Mapping| -> Result<Option<Mapping>, BoxError> { Ok(func(mapping)) },
    )))
}

pub fn try_post_process<F, E>(func: F) -> FieldResolver
where
    F: Fn(&Mapping) -> Result<Option<Mapping>, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    FieldResolver::PostProcess(PostProcessor(Arc::new(
        move |mapping: &Mapping| -> Result<Option<Mapping>, BoxError> {
            func(mapping).map_err(Into::into)
        },
    )))
}

fn infallible<F, V>(func: F) -> Callback
where
    F: Fn(&Value) -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    Callback(Arc::new(move |input: &Value| -> Result<Value, BoxError> {
        Ok(func(input).into())
    }))
}

fn fallible<F, V, E>(func: F) -> Callback
where
    F: Fn(&Value) -> Result<V, E> + Send + Sync + 'static,
    V: Into<Value>,
    E: Into<BoxError>,
{
    Callback(Arc::new(move |input: &Value| -> Result<Value, BoxError> {
        func(input).map(Into::into).map_err(Into::into)
    }))
}

fn reference(source: Source, inner: Option<FieldResolver>) -> RecordResult<FieldResolver> {
    if let Some(inner) = &inner {
        if inner.pass() != Pass::PerField {
            return Err(RecordError::InvalidResolver(
                "a referenced value can only be resolved by a per-field resolver",
            ));
        }
    }

    Ok(FieldResolver::Referenced(Reference {
        source,
        inner: inner.map(Box::new),
    }))
}

fn non_empty(key: String) -> RecordResult<String> {
    if key.is_empty() {
        Err(RecordError::InvalidResolver(
            "referenced source key must not be empty",
        ))
    } else {
        Ok(key)
    }
}
