//! # engine_component
//!
//! The "C" in ECS — defines what a component is, how its fields are typed,
//! and how an entity holds components in memory.
//!
//! This crate provides:
//!
//! - [`Component`] trait — the object-safe contract all component data satisfies.
//! - [`ShapedComponent`] — a component type that describes its [`Shape`] and
//!   can be rebuilt from field values.
//! - [`EntityId`] — `u64` persistent identifiers, `0` meaning "unsaved".
//! - [`Entity`] — an in-memory entity record holding boxed components.
//! - [`FieldType`] / [`FieldValue`] / [`FieldReader`] — the primitive field set.

pub mod component;
pub mod entity;
pub mod field;

pub use component::{Component, FieldDef, Shape, ShapedComponent};
pub use entity::{Entity, EntityId};
pub use field::{ConstructError, FieldReader, FieldType, FieldValue};
