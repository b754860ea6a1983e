//!
//! Record handlers describe how a record type is built from a row mapping.
//!
//! Usually one of the pre-built handlers fits: [`RecordDict`] for open
//! key-value output, [`RecordStruct`] for structs deriving [`Record`], or
//! [`RecordFn`] for anything with a hand-written constructor.
//!

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::value::{Mapping, Value};
use crate::{BoxError, RecordError, RecordResult};

/// Capability interface over a target record type.
pub trait RecordHandler: Send + Sync + 'static {
    type Record;

    /// Construct a record instance from the final row mapping.
    fn create(&self, mapping: Mapping) -> Result<Self::Record, BoxError>;

    /// All field names the record type recognizes.
    ///
    /// An empty list means the record is _open_ and accepts any key.
    fn field_names(&self) -> RecordResult<Vec<String>>;

    /// Fields that must be projected when not explicitly supplied or resolved.
    fn required_fields(&self) -> RecordResult<Vec<String>> {
        self.field_names()
    }
}

pub type Handler<R> = Arc<dyn RecordHandler<Record = R>>;

/// A struct record type with a fixed set of fields.
///
/// Implement it with `#[derive(Record)]`.
pub trait Record: DeserializeOwned + Send + 'static {
    const FIELDS: &'static [&'static str];

    /// Factory for the default handler of this type.
    fn handler() -> Handler<Self>
    where
        Self: Sized,
    {
        Arc::new(RecordStruct::<Self>::new())
    }
}

/// Handler producing an open mapping type, by default [`Mapping`].
pub struct RecordDict<M = Mapping> {
    mapping: PhantomData<fn() -> M>,
}

impl<M> RecordDict<M> {
    pub fn new() -> Self {
        Self {
            mapping: PhantomData,
        }
    }
}

impl<M> Default for RecordDict<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> RecordHandler for RecordDict<M>
where
    M: FromIterator<(String, Value)> + 'static,
{
    type Record = M;

    fn create(&self, mapping: Mapping) -> Result<M, BoxError> {
        Ok(mapping.into_iter().collect())
    }

    fn field_names(&self) -> RecordResult<Vec<String>> {
        Ok(vec![])
    }
}

/// Closed handler for [`Record`] structs.
///
/// Keys the struct does not declare are dropped before construction.
pub struct RecordStruct<T> {
    record: PhantomData<fn() -> T>,
}

impl<T: Record> RecordStruct<T> {
    pub fn new() -> Self {
        Self {
            record: PhantomData,
        }
    }
}

impl<T: Record> Default for RecordStruct<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordHandler for RecordStruct<T> {
    type Record = T;

    fn create(&self, mapping: Mapping) -> Result<T, BoxError> {
        let declared = mapping.len();
        let fields: Mapping = mapping
            .into_iter()
            .filter(|(key, _)| T::FIELDS.contains(&key.as_str()))
            .collect();

        if fields.len() < declared {
            log::trace!(
                "{} dropped {} unrecognized keys",
                std::any::type_name::<T>(),
                declared - fields.len()
            );
        }

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    fn field_names(&self) -> RecordResult<Vec<String>> {
        if T::FIELDS.is_empty() {
            return Err(RecordError::ClassDefinition(format!(
                "Field names not found on {}",
                std::any::type_name::<T>()
            )));
        }

        Ok(T::FIELDS.iter().map(|field| field.to_string()).collect())
    }
}

/// Closed handler around a constructor function.
pub struct RecordFn<R, F> {
    fields: Vec<String>,
    func: F,
    record: PhantomData<fn() -> R>,
}

impl<R, F> RecordFn<R, F>
where
    F: Fn(Mapping) -> Result<R, BoxError>,
{
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>, func: F) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            func,
            record: PhantomData,
        }
    }
}

impl<R, F> RecordHandler for RecordFn<R, F>
where
    R: 'static,
    F: Fn(Mapping) -> Result<R, BoxError> + Send + Sync + 'static,
{
    type Record = R;

    fn create(&self, mapping: Mapping) -> Result<R, BoxError> {
        let mapping = if self.fields.is_empty() {
            mapping
        } else {
            mapping
                .into_iter()
                .filter(|(key, _)| self.fields.contains(key))
                .collect()
        };
        (self.func)(mapping)
    }

    fn field_names(&self) -> RecordResult<Vec<String>> {
        Ok(self.fields.clone())
    }
}

/// A type-erased handler, as bound to a query or registered for an entity.
#[derive(Clone)]
pub struct BoundHandler {
    handler: Arc<dyn Any + Send + Sync>,
    record_type: &'static str,
}

impl BoundHandler {
    pub fn new<R: 'static>(handler: Handler<R>) -> Self {
        Self {
            handler: Arc::new(handler),
            record_type: std::any::type_name::<R>(),
        }
    }

    pub fn record_type(&self) -> &'static str {
        self.record_type
    }

    pub fn downcast<R: 'static>(&self) -> Option<Handler<R>> {
        self.handler.downcast_ref::<Handler<R>>().cloned()
    }
}

impl std::fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoundHandler({})", self.record_type)
    }
}

/// Where the handler of a `records()` call came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandlerSource {
    Explicit,
    Query,
    Entity,
}

/// Pick the handler for a `records()` call: the explicit argument, else the
/// handler bound to the query, else the entity type's default.
pub fn resolve_handler<R: 'static>(
    explicit: Option<Handler<R>>,
    query: Option<&BoundHandler>,
    entity: Option<&BoundHandler>,
) -> RecordResult<(Handler<R>, HandlerSource)> {
    if let Some(handler) = explicit {
        return Ok((handler, HandlerSource::Explicit));
    }

    let (bound, source) = match (query, entity) {
        (Some(bound), _) => (bound, HandlerSource::Query),
        (None, Some(bound)) => (bound, HandlerSource::Entity),
        (None, None) => {
            return Err(RecordError::ClassDefinition(
                "Trying records() on a query without destination record handler".to_string(),
            ))
        }
    };

    match bound.downcast::<R>() {
        Some(handler) => Ok((handler, source)),
        None => Err(RecordError::ClassDefinition(format!(
            "{:?} handler produces {}, but {} was requested",
            source,
            bound.record_type(),
            std::any::type_name::<R>()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize, PartialEq, crate::Record)]
    struct Entity {
        id: i64,
        name: Option<String>,
    }

    #[derive(Deserialize, crate::Record)]
    struct Empty {}

    fn mapping(value: Value) -> Mapping {
        match value {
            Value::Object(mapping) => mapping,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn dict_is_open_and_keeps_all_keys() {
        let handler = RecordDict::<BTreeMap<String, Value>>::new();
        assert!(handler.field_names().unwrap().is_empty());
        assert!(handler.required_fields().unwrap().is_empty());

        let out = handler
            .create(mapping(json!({"a": 1, "anything": "goes"})))
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out["anything"], json!("goes"));
    }

    #[test]
    fn struct_drops_unrecognized_keys() {
        let handler = RecordStruct::<Entity>::new();
        assert_eq!(handler.field_names().unwrap(), vec!["id", "name"]);
        assert_eq!(handler.required_fields().unwrap(), vec!["id", "name"]);

        let out = handler
            .create(mapping(json!({"id": 1, "name": "Sol", "orbits_id": null})))
            .unwrap();
        assert_eq!(
            out,
            Entity {
                id: 1,
                name: Some("Sol".into())
            }
        );
    }

    #[test]
    fn struct_construction_failure_is_reported() {
        let handler = RecordStruct::<Entity>::new();
        assert!(handler.create(mapping(json!({"name": "no id"}))).is_err());
    }

    #[test]
    fn struct_without_fields_is_malformed() {
        let handler = RecordStruct::<Empty>::new();
        assert!(handler.field_names().unwrap_err().is_class_definition());
    }

    #[test]
    fn record_fn_filters_declared_fields() {
        let handler = RecordFn::new(vec!["id"], |m: Mapping| -> Result<usize, BoxError> {
            Ok(m.len())
        });
        assert_eq!(handler.create(mapping(json!({"id": 1, "x": 2}))).unwrap(), 1);
    }

    #[test]
    fn resolution_order() {
        let dict: Handler<Mapping> = Arc::new(RecordDict::<Mapping>::new());
        let query = BoundHandler::new::<Mapping>(Arc::new(RecordDict::<Mapping>::new()));
        let entity = BoundHandler::new::<Mapping>(Arc::new(RecordDict::<Mapping>::new()));

        let (_, source) = resolve_handler(Some(dict), Some(&query), Some(&entity)).unwrap();
        assert_eq!(source, HandlerSource::Explicit);

        let (_, source) = resolve_handler::<Mapping>(None, Some(&query), Some(&entity)).unwrap();
        assert_eq!(source, HandlerSource::Query);

        let (_, source) = resolve_handler::<Mapping>(None, None, Some(&entity)).unwrap();
        assert_eq!(source, HandlerSource::Entity);

        match resolve_handler::<Mapping>(None, None, None) {
            Err(err) => assert!(err.is_class_definition()),
            Ok((_, source)) => panic!("resolved a {:?} handler", source),
        }
    }

    #[test]
    fn resolution_checks_record_type() {
        let query = BoundHandler::new::<Entity>(Entity::handler());
        match resolve_handler::<Mapping>(None, Some(&query), None) {
            Err(err) => assert!(err.is_class_definition()),
            Ok((_, source)) => panic!("resolved a {:?} handler", source),
        }
        assert!(resolve_handler::<Entity>(None, Some(&query), None).is_ok());
    }
}
