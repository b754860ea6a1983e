use records::prelude::*;
use records::{BoxError, HandlerRegistry};
use serde::Deserialize;
use std::sync::Arc;

mod common;

use common::{create_sol, Celestial};

#[derive(Debug, Deserialize, PartialEq, Record)]
struct Named {
    name: String,
}

#[derive(Deserialize, Record)]
struct Nothing {}

#[derive(Entity)]
#[entity("celestial")]
struct Registered;

#[tokio::test]
async fn no_handler_is_a_class_definition_error() {
    let galaxy = create_sol();

    let err = galaxy
        .celestials()
        .with_registry(Arc::new(HandlerRegistry::new()))
        .records(Records::<Mapping>::new())
        .unwrap_err();

    assert!(err.is_class_definition(), "{}", err);
}

#[tokio::test]
async fn bound_handler_sticks_to_derived_queries() -> RecordResult<()> {
    let galaxy = create_sol();

    let query = galaxy
        .celestials()
        .with_registry(Arc::new(HandlerRegistry::new()))
        .record_into(RecordStruct::<Named>::new());

    let derived = query.clone().filter("celestial_type", common::STAR);
    let sun = derived.records(Records::new())?.first().await?;
    assert_eq!(sun, Some(Named { name: "Sol".into() }));

    let all = query.records(Records::<Named>::new())?.try_collect().await?;
    assert_eq!(all.len(), galaxy.bodies().len());

    Ok(())
}

#[tokio::test]
async fn explicit_handler_overrides_bound_one() -> RecordResult<()> {
    let galaxy = create_sol();

    let query = galaxy.celestials().record_into(RecordStruct::<Named>::new());

    let names = query
        .records(Records::with(RecordFn::new(
            vec!["name"],
            |mapping: Mapping| -> Result<String, BoxError> {
                Ok(mapping["name"].as_str().unwrap_or_default().to_string())
            },
        )))?
        .try_collect()
        .await?;

    assert_eq!(names[0], "Sol");
    assert_eq!(names.len(), 18);

    Ok(())
}

#[tokio::test]
async fn bound_handler_of_another_record_type() {
    let galaxy = create_sol();

    let err = galaxy
        .celestials()
        .record_into(RecordStruct::<Named>::new())
        .records(Records::<Mapping>::new())
        .unwrap_err();

    assert!(err.is_class_definition(), "{}", err);
}

#[tokio::test]
async fn entity_default_from_registry() -> RecordResult<()> {
    let galaxy = create_sol();

    let registry = Arc::new(HandlerRegistry::new());
    registry.register_default::<Celestial, _>(RecordDict::<Mapping>::new());

    let records: Vec<Mapping> = galaxy
        .celestials()
        .with_registry(registry.clone())
        .filter("name", "Terra")
        .records(Records::new().field("name").field("size"))?
        .try_collect()
        .await?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 2);
    assert_eq!(records[0]["name"], Value::from("Terra"));

    // A query-bound handler wins over the entity default.
    let named: Vec<Named> = galaxy
        .celestials()
        .with_registry(registry.clone())
        .record_into(RecordStruct::<Named>::new())
        .filter("name", "Terra")
        .records(Records::new())?
        .try_collect()
        .await?;
    assert_eq!(named, vec![Named { name: "Terra".into() }]);

    assert!(registry.unregister::<Celestial>());
    let err = galaxy
        .celestials()
        .with_registry(registry)
        .records(Records::<Mapping>::new())
        .unwrap_err();
    assert!(err.is_class_definition());

    Ok(())
}

#[tokio::test]
async fn entity_default_from_global_registry() -> RecordResult<()> {
    let galaxy = create_sol();

    HandlerRegistry::global().register_default::<Registered, _>(RecordStruct::<Named>::new());

    let moons = Registered::objects(galaxy.engine.clone())
        .filter("orbits__name", "Jupiter")
        .records(Records::<Named>::new())?
        .try_collect()
        .await?;

    let names: Vec<&str> = moons.iter().map(|moon| moon.name.as_str()).collect();
    assert_eq!(names, vec!["Io", "Europa", "Ganymede", "Callisto"]);

    Ok(())
}

#[tokio::test]
async fn record_without_fields_is_malformed() {
    let galaxy = create_sol();

    let err = galaxy
        .celestials()
        .records(Records::of::<Nothing>())
        .unwrap_err();

    assert!(err.is_class_definition(), "{}", err);
}

#[tokio::test]
async fn closed_handler_ignores_extra_keys() -> RecordResult<()> {
    let galaxy = create_sol();

    let named = galaxy
        .celestials()
        .filter("celestial_type", common::STAR)
        .records(
            Records::of::<Named>()
                .field("size")
                .set("doubled", mapped(|row| row["size"].as_f64().unwrap_or(0.0) * 2.0)),
        )?
        .try_collect()
        .await?;

    assert_eq!(named, vec![Named { name: "Sol".into() }]);

    Ok(())
}
