//! Component types and helpers shared by the integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::path::Path;

use engine_component::{
    Component, ConstructError, Entity, EntityId, FieldReader, FieldType, FieldValue, Shape,
    ShapedComponent,
};
use engine_persistence::{EntityPersistence, PersistenceConfig};
use rusqlite::Connection;

#[derive(Debug, Clone, PartialEq)]
pub struct Physics {
    pub x: f32,
    pub y: f32,
    pub grounded: bool,
}

impl Component for Physics {
    fn shape_name(&self) -> &'static str {
        "Physics"
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.x.into(), self.y.into(), self.grounded.into()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShapedComponent for Physics {
    fn shape() -> Shape {
        Shape::new("Physics")
            .field("x", FieldType::F32)
            .field("y", FieldType::F32)
            .field("grounded", FieldType::Bool)
    }

    fn from_fields(_owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError> {
        let mut r = FieldReader::new("Physics", values);
        let physics = Physics {
            x: r.next_f32()?,
            y: r.next_f32()?,
            grounded: r.next_bool()?,
        };
        r.finish()?;
        Ok(physics)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Health {
    pub current: i32,
}

impl Component for Health {
    fn shape_name(&self) -> &'static str {
        "Health"
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.current.into()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShapedComponent for Health {
    fn shape() -> Shape {
        Shape::new("Health").field("current", FieldType::I32)
    }

    fn from_fields(_owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError> {
        let mut r = FieldReader::new("Health", values);
        let current = r.next_i32()?;
        r.finish()?;
        Ok(Health { current })
    }
}

/// One field of every supported type.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub flag: bool,
    pub small: i32,
    pub large: i64,
    pub single: f32,
    pub double: f64,
    pub initial: char,
    pub label: String,
}

impl Component for Sample {
    fn shape_name(&self) -> &'static str {
        "Sample"
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.flag.into(),
            self.small.into(),
            self.large.into(),
            self.single.into(),
            self.double.into(),
            self.initial.into(),
            self.label.clone().into(),
        ]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ShapedComponent for Sample {
    fn shape() -> Shape {
        Shape::new("Sample")
            .field("flag", FieldType::Bool)
            .field("small", FieldType::I32)
            .field("large", FieldType::I64)
            .field("single", FieldType::F32)
            .field("double", FieldType::F64)
            .field("initial", FieldType::Char)
            .field("label", FieldType::String)
    }

    fn from_fields(_owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError> {
        let mut r = FieldReader::new("Sample", values);
        let sample = Sample {
            flag: r.next_bool()?,
            small: r.next_i32()?,
            large: r.next_i64()?,
            single: r.next_f32()?,
            double: r.next_f64()?,
            initial: r.next_char()?,
            label: r.next_string()?,
        };
        r.finish()?;
        Ok(sample)
    }
}

/// An engine with `Physics`, `Health` and `Sample` registered.
pub fn engine(config: PersistenceConfig) -> EntityPersistence {
    let mut engine = EntityPersistence::new(config);
    engine.register::<Physics>().unwrap();
    engine.register::<Health>().unwrap();
    engine.register::<Sample>().unwrap();
    engine
}

/// [`engine`] attached to a fresh in-memory database.
pub fn in_memory() -> EntityPersistence {
    let mut engine = engine(PersistenceConfig::default());
    engine.attach(Connection::open_in_memory().unwrap());
    engine
}

/// [`engine`] attached to the database file at `path`.
pub fn on_disk(path: &Path) -> EntityPersistence {
    let mut engine = engine(PersistenceConfig::default().with_database_path(path));
    engine.open().unwrap();
    engine
}

/// Load every stored entity.
pub fn load_all(engine: &mut EntityPersistence) -> Vec<Entity> {
    let count = engine.begin_loading().unwrap();
    (0..count)
        .map(|_| {
            let mut entity = Entity::new();
            engine.load_entity(&mut entity).unwrap();
            entity
        })
        .collect()
}

pub fn count_rows(engine: &EntityPersistence, table: &str) -> i64 {
    engine
        .connection()
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| r.get(0))
        .unwrap()
}
