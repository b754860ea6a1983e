//!
//! Arguments of a `records()` call, and their reconciliation into one
//! projection plus the resolvers to apply after fetch.
//!

use std::sync::Arc;

use crate::expr::Expr;
use crate::handler::{Handler, Record, RecordHandler};
use crate::materialize::ResolverSet;
use crate::project::Projection;
use crate::resolver::{Contribution, FieldResolver};
use crate::value::Value;
use crate::RecordResult;

/// The value given for a keyword key of a `records()` call.
#[derive(Clone, Debug)]
pub enum FieldSpec {
    Resolver(FieldResolver),
    /// Evaluated by the engine and projected under the key.
    Expr(Expr),
    /// Projected verbatim as a constant.
    Literal(Value),
    /// Ignored. Handy for conditionally omitted keys.
    Omit,
}

impl From<FieldResolver> for FieldSpec {
    fn from(resolver: FieldResolver) -> Self {
        Self::Resolver(resolver)
    }
}

impl From<Expr> for FieldSpec {
    fn from(expr: Expr) -> Self {
        Self::Expr(expr)
    }
}

impl From<Value> for FieldSpec {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl<T: Into<FieldSpec>> From<Option<T>> for FieldSpec {
    fn from(spec: Option<T>) -> Self {
        spec.map(Into::into).unwrap_or(Self::Omit)
    }
}

///
/// Arguments of a `records()` call.
///
/// ```ignore
/// let stream = celestials.records(
///     Records::of::<SpaceRock>()
///         .field("celestial_type")
///         .set("id", fixed(Value::Null))
///         .set("orbits_name", Expr::field("orbits__name"))
///         .set("is_moon", mapped(is_moon)),
/// )?;
/// ```
///
pub struct Records<R> {
    handler: Option<Handler<R>>,
    fields: Vec<String>,
    keywords: Vec<(String, FieldSpec)>,
}

impl<R: 'static> Records<R> {
    /// Arguments without an explicit handler; the query's or the entity's
    /// default handler is used.
    pub fn new() -> Self {
        Self {
            handler: None,
            fields: vec![],
            keywords: vec![],
        }
    }

    /// Arguments with an explicit handler.
    pub fn with<H>(handler: H) -> Self
    where
        H: RecordHandler<Record = R>,
    {
        Self::new().handler(Arc::new(handler))
    }

    pub fn handler(mut self, handler: Handler<R>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Request a plain field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn fields(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields.extend(names.into_iter().map(Into::into));
        self
    }

    /// Assign a resolver, expression or literal to `key`.
    ///
    /// Keys keep the position of their first assignment; assigning a key
    /// again replaces its value.
    pub fn set(mut self, key: impl Into<String>, spec: impl Into<FieldSpec>) -> Self {
        let key = key.into();
        let spec = spec.into();
        match self.keywords.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, existing)) => *existing = spec,
            None => self.keywords.push((key, spec)),
        }
        self
    }

    pub(crate) fn take_handler(&mut self) -> Option<Handler<R>> {
        self.handler.take()
    }
}

impl Records<()> {
    /// Arguments with the default handler of record type `T`.
    pub fn of<T: Record>() -> Records<T> {
        Records::new().handler(T::handler())
    }
}

impl<R: 'static> Default for Records<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Projection and resolvers computed from `records()` arguments.
#[derive(Debug)]
pub struct Augmented {
    pub projection: Projection,
    pub resolvers: ResolverSet,
}

/// Reconcile explicit fields, keyword specs and the handler's required
/// fields into one projection.
///
/// Required fields not explicitly named by a field or keyword are appended
/// to the plain columns. Resolvers go into the resolver set, adding their
/// source column or annotation when they have one. Expressions and literals
/// are projected under their key. Skipped keys never reach the projection.
pub fn augment<R: 'static>(
    args: Records<R>,
    handler: &dyn RecordHandler<Record = R>,
) -> RecordResult<Augmented> {
    let Records {
        fields, keywords, ..
    } = args;

    let required = handler.required_fields()?;

    let mut projection = Projection::new();
    for field in &fields {
        projection.push_column(field.as_str());
    }
    for field in required {
        let named = fields.contains(&field) || keywords.iter().any(|(key, _)| *key == field);
        if !named {
            projection.push_column(field);
        }
    }

    let mut resolvers = ResolverSet::new();
    let mut contributed = vec![];
    for (key, spec) in keywords {
        match spec {
            FieldSpec::Resolver(resolver) => {
                match resolver.contributes_column() {
                    Some(Contribution::Column(column)) => {
                        projection.push_column(column);
                        contributed.push(column.to_string());
                    }
                    Some(Contribution::Annotation(alias, expr)) => {
                        projection.push_expression(alias, expr.clone());
                        contributed.push(alias.to_string());
                    }
                    None => {}
                }
                if resolver.is_skip() {
                    resolvers.skip(key);
                } else {
                    resolvers.insert(key, resolver);
                }
            }
            FieldSpec::Expr(expr) => projection.push_expression(key, expr),
            FieldSpec::Literal(value) => {
                log::warn!("records(): projecting literal {} as constant '{}'", value, key);
                projection.push_expression(key, Expr::Value(value));
            }
            FieldSpec::Omit => {}
        }
    }

    // A resolver's source stays projected even when its key is skipped.
    for key in resolvers.skipped() {
        if !contributed.iter().any(|column| column == key) {
            projection.remove(key);
        }
    }

    Ok(Augmented {
        projection,
        resolvers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{RecordDict, RecordStruct};
    use crate::resolver::*;
    use crate::value::Mapping;
    use serde::Deserialize;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Deserialize, crate::Record)]
    struct TestDataClass {
        id: i64,
        name: String,
        age: i64,
        street: String,
        parent: Option<Box<TestDataClass>>,
    }

    fn all_names(augmented: &Augmented) -> Vec<&str> {
        augmented
            .projection
            .columns()
            .iter()
            .map(String::as_str)
            .chain(
                augmented
                    .projection
                    .expressions()
                    .iter()
                    .map(|(alias, _)| alias.as_str()),
            )
            .collect()
    }

    #[test]
    fn records_basic() {
        let args = Records::<TestDataClass>::new()
            .field("one")
            .set("two", Expr::field("field"))
            .set("full_name", mapped(|entry| entry["name"].clone()))
            .set(
                "street",
                referenced_with("street_id", |pk| format!("referenced: {}", pk)).unwrap(),
            )
            .set("ignored", None::<FieldResolver>)
            .set("fixed", fixed(1))
            .set("parent", skip())
            .set(
                "post_process",
                post_process(|entry| {
                    let mut entry = entry.clone();
                    entry.insert("new".into(), json!("field"));
                    Some(entry)
                }),
            );

        let augmented = augment(args, &RecordStruct::<TestDataClass>::new()).unwrap();
        let names = all_names(&augmented);

        for expected in ["one", "two", "id", "name", "age", "street_id"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        for unexpected in ["full_name", "street", "ignored", "fixed", "parent", "post_process"] {
            assert!(!names.contains(&unexpected), "unexpected {}", unexpected);
        }

        let resolvers = &augmented.resolvers;
        for key in ["full_name", "street", "fixed", "post_process"] {
            assert!(resolvers.contains(key), "resolver {} missing", key);
        }
        assert!(!resolvers.contains("ignored"));
        assert!(!resolvers.contains("parent"));
        assert!(resolvers.is_skipped("parent"));
        for key in ["one", "two", "id", "name", "age", "street_id"] {
            assert!(!resolvers.contains(key));
        }
    }

    #[test]
    fn explicit_fields_come_first() {
        let args = Records::<TestDataClass>::new().field("one").field("age");
        let augmented = augment(args, &RecordStruct::<TestDataClass>::new()).unwrap();
        assert_eq!(
            augmented.projection.columns(),
            ["one", "age", "id", "name", "street", "parent"]
        );
    }

    #[test]
    fn skip_removes_explicit_field() {
        let args = Records::<Mapping>::new()
            .fields(["id", "parent"])
            .set("parent", skip());
        let augmented = augment(args, &RecordDict::<Mapping>::new()).unwrap();
        assert_eq!(augmented.projection.columns(), ["id"]);
    }

    #[test]
    fn skip_keeps_columns_other_resolvers_read() {
        let args = Records::<Mapping>::new()
            .field("name")
            .set("celestial_id", skip())
            .set("street", referenced("celestial_id").unwrap());
        let augmented = augment(args, &RecordDict::<Mapping>::new()).unwrap();
        assert_eq!(augmented.projection.columns(), ["name", "celestial_id"]);
        assert!(augmented.resolvers.is_skipped("celestial_id"));
        assert!(augmented.resolvers.contains("street"));
    }

    #[test]
    fn of_uses_the_record_handler() {
        let mut args = Records::of::<TestDataClass>();
        assert!(args.take_handler().is_some());
    }

    #[test]
    fn open_handler_requires_nothing() {
        let augmented = augment(Records::<Mapping>::new(), &RecordDict::<Mapping>::new()).unwrap();
        assert!(augmented.projection.columns().is_empty());
        assert!(augmented.resolvers.is_empty());
    }

    #[test]
    fn literal_and_annotation_contribute_expressions() {
        let args = Records::<Mapping>::new()
            .set("answer", json!(42))
            .set(
                "orbits",
                referenced_expr("orbits_name", Expr::field("orbits__name"), None).unwrap(),
            );
        let augmented = augment(args, &RecordDict::<Mapping>::new()).unwrap();
        assert_eq!(
            augmented.projection.expressions(),
            [
                ("answer".to_string(), Expr::Value(json!(42))),
                ("orbits_name".to_string(), Expr::field("orbits__name")),
            ]
        );
        assert!(augmented.projection.columns().is_empty());
    }

    #[test]
    fn resolver_column_not_duplicated() {
        let args = Records::<Mapping>::new()
            .field("street_id")
            .set("street", referenced("street_id").unwrap());
        let augmented = augment(args, &RecordDict::<Mapping>::new()).unwrap();
        assert_eq!(augmented.projection.columns(), ["street_id"]);
    }

    #[test]
    fn reassigning_a_key_keeps_its_position() {
        let args = Records::<Mapping>::new()
            .set("a", fixed(1))
            .set("b", fixed(2))
            .set("a", fixed(3));
        let augmented = augment(args, &RecordDict::<Mapping>::new()).unwrap();
        let keys: Vec<_> = augmented.resolvers.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["a", "b"]);
    }
}
