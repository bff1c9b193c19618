//! Component type registry: the ordered set of shapes the engine persists.
//!
//! Registration order is iteration order for load, save, delete and import,
//! so it must be the same across runs that share a database. Each entry pairs
//! the shape with its constructor and the statement text derived from it;
//! all three are resolved when the shape is registered, so a shape that
//! cannot be persisted fails at startup rather than mid-load.
//!
//! The registry freezes the first time the engine touches storage. Shapes
//! cannot be removed.

use engine_component::{Component, ConstructError, EntityId, FieldValue, Shape, ShapedComponent};
use tracing::debug;

use crate::datatype::DatatypeRegistry;
use crate::error::PersistError;
use crate::schema::ShapeSql;

/// Builds a component instance from coerced field values.
pub type Constructor = fn(EntityId, Vec<FieldValue>) -> Result<Box<dyn Component>, ConstructError>;

/// A registered shape.
#[derive(Debug, Clone)]
pub struct ShapeEntry {
    pub shape: Shape,
    pub sql: ShapeSql,
    pub construct: Constructor,
}

impl ShapeEntry {
    /// The shape name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shape.name
    }
}

fn construct_boxed<T: ShapedComponent>(
    owner: EntityId,
    values: Vec<FieldValue>,
) -> Result<Box<dyn Component>, ConstructError> {
    T::from_fields(owner, values).map(|c| Box::new(c) as Box<dyn Component>)
}

/// The ordered set of persisted shapes.
#[derive(Debug, Default)]
pub struct ComponentTypeRegistry {
    entries: Vec<ShapeEntry>,
    frozen: bool,
}

impl ComponentTypeRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a [`ShapedComponent`] type.
    ///
    /// # Errors
    ///
    /// See [`ComponentTypeRegistry::register_shape`].
    pub fn register<T: ShapedComponent>(
        &mut self,
        datatypes: &DatatypeRegistry,
    ) -> Result<(), PersistError> {
        self.register_shape(T::shape(), construct_boxed::<T>, datatypes)
    }

    /// Register a shape with an explicit constructor.
    ///
    /// # Errors
    ///
    /// - [`PersistError::RegistryFrozen`] once loading or saving has begun.
    /// - [`PersistError::DuplicateShape`] if the name is taken (ignoring case).
    /// - [`PersistError::InvalidIdentifier`] / [`PersistError::UnsupportedFieldType`]
    ///   if the shape cannot be mapped to a table.
    pub fn register_shape(
        &mut self,
        shape: Shape,
        construct: Constructor,
        datatypes: &DatatypeRegistry,
    ) -> Result<(), PersistError> {
        if self.frozen {
            return Err(PersistError::RegistryFrozen(shape.name));
        }
        if self.get(&shape.name).is_some() {
            return Err(PersistError::DuplicateShape(shape.name));
        }
        let sql = ShapeSql::derive(&shape, datatypes)?;
        debug!(shape = %shape, "registered component shape");
        self.entries.push(ShapeEntry {
            shape,
            sql,
            construct,
        });
        Ok(())
    }

    /// Reject further registrations.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Look up an entry by shape name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ShapeEntry> {
        self.entries.iter().find(|e| e.shape.is_named(name))
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ShapeEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
