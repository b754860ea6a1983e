#![allow(dead_code)]

use records::catalog::{Catalog, TableDef};
use records::database::MemoryEngine;
use records::prelude::*;
use records::QuerySet;
use serde_json::json;
use std::sync::Arc;

#[derive(Entity)]
#[entity("celestial")]
pub struct Celestial;

#[derive(Entity)]
#[entity("spaceport")]
pub struct Spaceport;

#[derive(Entity)]
pub struct Person;

pub const STAR: i64 = 1;
pub const PLANET: i64 = 2;
pub const PLANETOID: i64 = 3;
pub const ASTEROID: i64 = 4;

pub fn catalog() -> Catalog {
    Catalog::new()
        .table(
            TableDef::new("celestial")
                .column("name")
                .column("celestial_type")
                .column("weight")
                .column("size")
                .relation("orbits", "orbits_id", "celestial"),
        )
        .table(
            TableDef::new("spaceport")
                .column("name")
                .relation("celestial", "celestial_id", "celestial"),
        )
        .table(
            TableDef::new("person")
                .column("first_name")
                .column("last_name")
                .column("age")
                .relation("origin", "origin_id", "celestial"),
        )
}

/// Celestial body as inserted by the fixture.
#[derive(Clone, Debug)]
pub struct Body {
    pub id: i64,
    pub name: &'static str,
    pub celestial_type: i64,
    pub orbits: Option<i64>,
}

impl Body {
    pub fn is_moon(&self, galaxy: &Galaxy) -> bool {
        let orbited = self.orbits.and_then(|id| galaxy.body(id));
        (PLANET..=ASTEROID).contains(&self.celestial_type)
            && orbited.map_or(false, |orbited| {
                (PLANET..=ASTEROID).contains(&orbited.celestial_type)
            })
    }
}

pub struct Galaxy {
    pub engine: Arc<MemoryEngine>,
    pub sun: Body,
    pub planets: Vec<Body>,
    pub moons: Vec<Body>,
    pub spaceports: Vec<i64>,
}

impl Galaxy {
    pub fn celestials(&self) -> QuerySet<Celestial> {
        Celestial::objects(self.engine.clone())
    }

    pub fn spaceports(&self) -> QuerySet<Spaceport> {
        Spaceport::objects(self.engine.clone())
    }

    /// Every celestial in insertion order.
    pub fn bodies(&self) -> Vec<&Body> {
        std::iter::once(&self.sun)
            .chain(&self.planets)
            .chain(&self.moons)
            .collect()
    }

    pub fn body(&self, id: i64) -> Option<&Body> {
        self.bodies().into_iter().find(|body| body.id == id)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn insert_body(
    engine: &MemoryEngine,
    name: &'static str,
    celestial_type: i64,
    orbits: Option<&Body>,
    size: f64,
) -> Body {
    let orbits = orbits.map(|body| body.id);
    let id = engine
        .insert(
            "celestial",
            json!({
                "name": name,
                "celestial_type": celestial_type,
                "orbits_id": orbits,
                "weight": 0.0,
                "size": size,
            }),
        )
        .unwrap()
        .as_i64()
        .unwrap();

    Body {
        id,
        name,
        celestial_type,
        orbits,
    }
}

/// One star, 9 bodies orbiting it, 8 moons and 4 spaceports.
pub fn create_sol() -> Galaxy {
    init_logging();

    let engine = Arc::new(MemoryEngine::new(catalog()));
    let sun = insert_body(&engine, "Sol", STAR, None, 100.0);

    let planets: Vec<Body> = [
        ("Mercur", PLANET, 2.4),
        ("Venus", PLANET, 6.0),
        ("Terra", PLANET, 6.4),
        ("Mars", PLANET, 3.4),
        ("Jupiter", PLANET, 69.9),
        ("Saturn", PLANET, 58.2),
        ("Uranus", PLANET, 25.4),
        ("Neptune", PLANET, 24.6),
        ("Pluto", PLANETOID, 1.1),
    ]
    .into_iter()
    .map(|(name, celestial_type, size)| insert_body(&engine, name, celestial_type, Some(&sun), size))
    .collect();

    let moons: Vec<Body> = [
        ("Luna", PLANETOID, 2, 1.7),
        ("Phobos", ASTEROID, 3, 0.006),
        ("Deimos", ASTEROID, 3, 0.011),
        ("Io", PLANETOID, 4, 1.8),
        ("Europa", PLANETOID, 4, 1.5),
        ("Ganymede", PLANETOID, 4, 2.6),
        ("Callisto", PLANETOID, 4, 2.4),
        ("Charon", ASTEROID, 8, 0.6),
    ]
    .into_iter()
    .map(|(name, celestial_type, planet, size)| {
        insert_body(&engine, name, celestial_type, Some(&planets[planet]), size)
    })
    .collect();

    let spaceports = [
        ("Houston IPS", planets[2].id),
        ("Copernicus", moons[0].id),
        ("Utopia Planitia", planets[3].id),
        ("Ares Station", moons[2].id),
    ]
    .into_iter()
    .map(|(name, celestial)| {
        engine
            .insert("spaceport", json!({"name": name, "celestial_id": celestial}))
            .unwrap()
            .as_i64()
            .unwrap()
    })
    .collect();

    Galaxy {
        engine,
        sun,
        planets,
        moons,
        spaceports,
    }
}
