//! Component marshaller: converts between one shape's table row and a
//! component instance.
//!
//! Loading a component is three steps: count the rows for the entity (zero
//! means the component is simply absent), fetch the row and coerce every
//! column to its native type in declared order, then hand the values to the
//! shape's constructor. Writing goes the other way, binding each field as a
//! parameter after coercing it to its stored representation.

use engine_component::{Component, EntityId, FieldValue};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::datatype::DatatypeRegistry;
use crate::error::PersistError;
use crate::registry::ShapeEntry;

/// Storage representation of an entity id. Rowids are positive `i64`s.
pub(crate) fn sql_id(id: EntityId) -> i64 {
    id.id() as i64
}

/// How a component row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowWrite {
    Inserted,
    Updated,
}

/// Marshals components of registered shapes over one connection.
pub struct Marshaller<'a> {
    conn: &'a Connection,
    datatypes: &'a DatatypeRegistry,
}

impl<'a> Marshaller<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection, datatypes: &'a DatatypeRegistry) -> Self {
        Self { conn, datatypes }
    }

    /// Number of rows in the shape's table for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Storage`] if the query fails.
    pub fn row_count(&self, id: EntityId, entry: &ShapeEntry) -> Result<i64, PersistError> {
        self.conn
            .query_row(&entry.sql.count, [sql_id(id)], |row| row.get(0))
            .map_err(PersistError::storage(format!("counting {} rows", entry.name())))
    }

    /// Fetch and coerce the shape's row for `id`.
    ///
    /// # Errors
    ///
    /// - [`PersistError::Storage`] if the row cannot be read.
    /// - [`PersistError::Coercion`] if a column does not fit its field type.
    pub fn fetch(&self, id: EntityId, entry: &ShapeEntry) -> Result<Vec<FieldValue>, PersistError> {
        let shape = &entry.shape;
        let stored: Vec<Value> = self
            .conn
            .query_row(&entry.sql.select, [sql_id(id)], |row| {
                (0..shape.len()).map(|i| row.get::<_, Value>(i)).collect()
            })
            .map_err(PersistError::storage(format!("reading {} row", entry.name())))?;

        shape
            .fields
            .iter()
            .zip(stored)
            .map(|(field, value)| {
                self.datatypes
                    .coerce(&shape.name, &field.name, field.ty, value)
            })
            .collect()
    }

    /// Load the component of `entry`'s shape for `id`.
    ///
    /// Returns `Ok(None)` when the entity has no row for the shape.
    ///
    /// # Errors
    ///
    /// - [`PersistError::Storage`] if counting or fetching fails.
    /// - [`PersistError::Coercion`] if a stored value does not fit.
    /// - [`PersistError::NoConstructor`] / [`PersistError::ArgumentMismatch`]
    ///   if the constructor rejects the values.
    pub fn try_load(
        &self,
        id: EntityId,
        entry: &ShapeEntry,
    ) -> Result<Option<Box<dyn Component>>, PersistError> {
        if self.row_count(id, entry)? == 0 {
            return Ok(None);
        }
        debug!(entity = %id, shape = entry.name(), "loading component");
        let values = self.fetch(id, entry)?;
        let component = (entry.construct)(id, values)?;
        Ok(Some(component))
    }

    /// Coerce `component`'s fields to stored values, checking them against the shape.
    ///
    /// # Errors
    ///
    /// - [`PersistError::ArgumentMismatch`] if the field count or a field type
    ///   differs from the shape.
    /// - [`PersistError::UnsupportedFieldType`] if a type is unregistered.
    pub fn storage_values(
        &self,
        entry: &ShapeEntry,
        component: &dyn Component,
    ) -> Result<Vec<Value>, PersistError> {
        let shape = &entry.shape;
        let values = component.field_values();
        if values.len() != shape.len() {
            return Err(PersistError::ArgumentMismatch {
                shape: shape.name.clone(),
                detail: format!("expected {} fields, got {}", shape.len(), values.len()),
            });
        }
        shape
            .fields
            .iter()
            .zip(&values)
            .map(|(field, value)| {
                if value.field_type() != field.ty {
                    return Err(PersistError::ArgumentMismatch {
                        shape: shape.name.clone(),
                        detail: format!(
                            "field '{}' declared {}, got {}",
                            field.name,
                            field.ty,
                            value.field_type()
                        ),
                    });
                }
                self.datatypes.to_storage(&shape.name, &field.name, value)
            })
            .collect()
    }

    /// Insert a row for `component` under `id`.
    ///
    /// # Errors
    ///
    /// See [`Marshaller::storage_values`]; also [`PersistError::Storage`].
    pub fn insert(
        &self,
        id: EntityId,
        entry: &ShapeEntry,
        component: &dyn Component,
    ) -> Result<(), PersistError> {
        let values = self.storage_values(entry, component)?;
        let params = std::iter::once(Value::Integer(sql_id(id))).chain(values);
        self.conn
            .execute(&entry.sql.insert, params_from_iter(params))
            .map_err(PersistError::storage(format!("inserting {} row", entry.name())))?;
        Ok(())
    }

    /// Update the fields of the existing row for `id`.
    ///
    /// Returns `false` if there was no row to update.
    ///
    /// # Errors
    ///
    /// See [`Marshaller::insert`].
    pub fn update(
        &self,
        id: EntityId,
        entry: &ShapeEntry,
        component: &dyn Component,
    ) -> Result<bool, PersistError> {
        let values = self.storage_values(entry, component)?;
        let params = std::iter::once(Value::Integer(sql_id(id))).chain(values);
        let changed = self
            .conn
            .execute(&entry.sql.update, params_from_iter(params))
            .map_err(PersistError::storage(format!("updating {} row", entry.name())))?;
        Ok(changed > 0)
    }

    /// Update the row for `id`, inserting it if the component is new.
    ///
    /// # Errors
    ///
    /// See [`Marshaller::insert`].
    pub fn upsert(
        &self,
        id: EntityId,
        entry: &ShapeEntry,
        component: &dyn Component,
    ) -> Result<RowWrite, PersistError> {
        if self.update(id, entry, component)? {
            Ok(RowWrite::Updated)
        } else {
            self.insert(id, entry, component)?;
            Ok(RowWrite::Inserted)
        }
    }

    /// Delete the shape's row for `id`. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Storage`] if the delete fails.
    pub fn delete(&self, id: EntityId, entry: &ShapeEntry) -> Result<usize, PersistError> {
        self.conn
            .execute(&entry.sql.delete, [sql_id(id)])
            .map_err(PersistError::storage(format!("deleting {} row", entry.name())))
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use engine_component::{ConstructError, FieldReader, FieldType, Shape, ShapedComponent};

    use super::*;
    use crate::registry::ComponentTypeRegistry;

    #[derive(Debug, Clone, PartialEq)]
    struct Physics {
        x: f32,
        y: f32,
        grounded: bool,
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
            let p = Physics {
                x: r.next_f32()?,
                y: r.next_f32()?,
                grounded: r.next_bool()?,
            };
            r.finish()?;
            Ok(p)
        }
    }

    /// A component whose values disagree with its declared shape.
    #[derive(Debug)]
    struct Liar;

    impl Component for Liar {
        fn shape_name(&self) -> &'static str {
            "Physics"
        }

        fn field_values(&self) -> Vec<FieldValue> {
            vec![FieldValue::I32(1), FieldValue::F32(0.0), FieldValue::Bool(false)]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn setup() -> (Connection, DatatypeRegistry, ComponentTypeRegistry) {
        let datatypes = DatatypeRegistry::with_defaults();
        let mut registry = ComponentTypeRegistry::new();
        registry.register::<Physics>(&datatypes).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&registry.get("Physics").unwrap().sql.create)
            .unwrap();
        (conn, datatypes, registry)
    }

    #[test]
    fn test_absent_row_yields_none() {
        let (conn, datatypes, registry) = setup();
        let marshaller = Marshaller::new(&conn, &datatypes);
        let loaded = marshaller
            .try_load(EntityId(5), registry.get("Physics").unwrap())
            .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_insert_then_load() {
        let (conn, datatypes, registry) = setup();
        let entry = registry.get("Physics").unwrap();
        let marshaller = Marshaller::new(&conn, &datatypes);
        let physics = Physics {
            x: 1.5,
            y: -2.25,
            grounded: true,
        };
        marshaller.insert(EntityId(1), entry, &physics).unwrap();

        let grounded: i64 = conn
            .query_row("SELECT grounded FROM Physics WHERE entityId = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(grounded, 1);

        let loaded = marshaller.try_load(EntityId(1), entry).unwrap().unwrap();
        assert_eq!(loaded.as_any().downcast_ref::<Physics>(), Some(&physics));
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let (conn, datatypes, registry) = setup();
        let entry = registry.get("Physics").unwrap();
        let marshaller = Marshaller::new(&conn, &datatypes);
        let mut physics = Physics {
            x: 0.0,
            y: 0.0,
            grounded: false,
        };
        assert_eq!(
            marshaller.upsert(EntityId(2), entry, &physics).unwrap(),
            RowWrite::Inserted
        );
        physics.x = 4.0;
        assert_eq!(
            marshaller.upsert(EntityId(2), entry, &physics).unwrap(),
            RowWrite::Updated
        );
        assert_eq!(marshaller.row_count(EntityId(2), entry).unwrap(), 1);
        assert_eq!(marshaller.fetch(EntityId(2), entry).unwrap()[0], FieldValue::F32(4.0));
    }

    #[test]
    fn test_mismatched_values_write_nothing() {
        let (conn, datatypes, registry) = setup();
        let entry = registry.get("Physics").unwrap();
        let marshaller = Marshaller::new(&conn, &datatypes);
        let err = marshaller.insert(EntityId(3), entry, &Liar).unwrap_err();
        assert!(matches!(err, PersistError::ArgumentMismatch { .. }));
        assert_eq!(marshaller.row_count(EntityId(3), entry).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_column_is_a_coercion_error() {
        let (conn, datatypes, registry) = setup();
        let entry = registry.get("Physics").unwrap();
        conn.execute(
            "INSERT INTO Physics (entityId, x, y, grounded) VALUES (9, 'left', 0.0, 0)",
            [],
        )
        .unwrap();
        let marshaller = Marshaller::new(&conn, &datatypes);
        let err = marshaller.try_load(EntityId(9), entry).unwrap_err();
        assert!(matches!(err, PersistError::Coercion { ref field, .. } if field == "x"));
    }

    #[test]
    fn test_missing_table_is_a_storage_fault() {
        let datatypes = DatatypeRegistry::with_defaults();
        let mut registry = ComponentTypeRegistry::new();
        registry.register::<Physics>(&datatypes).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        let marshaller = Marshaller::new(&conn, &datatypes);
        let err = marshaller
            .try_load(EntityId(1), registry.get("Physics").unwrap())
            .unwrap_err();
        assert!(err.is_storage_fault());
    }

    #[test]
    fn test_delete_removes_row() {
        let (conn, datatypes, registry) = setup();
        let entry = registry.get("Physics").unwrap();
        let marshaller = Marshaller::new(&conn, &datatypes);
        let physics = Physics {
            x: 1.0,
            y: 1.0,
            grounded: false,
        };
        marshaller.insert(EntityId(4), entry, &physics).unwrap();
        assert_eq!(marshaller.delete(EntityId(4), entry).unwrap(), 1);
        assert_eq!(marshaller.delete(EntityId(4), entry).unwrap(), 0);
    }
}
