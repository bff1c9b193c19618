//! Datatype registry: native field types to storage column types.
//!
//! Each entry names the SQLite column type used for a [`FieldType`] and the
//! two coercions between the native value and the stored [`Value`]:
//!
//! | native | column | stored as |
//! |---|---|---|
//! | `bool` | `INTEGER` | `0` / `1` |
//! | `i32`, `i64` | `INTEGER` | integer |
//! | `f32` | `REAL` | widened to `f64`, narrowed on read |
//! | `f64` | `REAL` | `f64` |
//! | `char`, `String` | `TEXT` | text |
//!
//! A field type with no entry makes every shape that uses it un-persistable.

use std::collections::HashMap;

use engine_component::{FieldType, FieldValue};
use rusqlite::types::Value;

use crate::error::{CoerceError, PersistError};

/// Coerce a stored value to its native representation.
pub type ToNative = fn(Value) -> Result<FieldValue, CoerceError>;

/// Coerce a native value to its stored representation.
pub type ToStorage = fn(&FieldValue) -> Result<Value, CoerceError>;

/// One registry entry.
#[derive(Debug, Clone, Copy)]
pub struct Datatype {
    /// SQLite column type name.
    pub column: &'static str,
    pub to_native: ToNative,
    pub to_storage: ToStorage,
}

/// Maps [`FieldType`]s to column types and coercion rules.
#[derive(Debug, Clone)]
pub struct DatatypeRegistry {
    types: HashMap<FieldType, Datatype>,
}

impl DatatypeRegistry {
    /// A registry with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// A registry covering every [`FieldType`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(FieldType::Bool, "INTEGER", bool_to_native, bool_to_storage);
        registry.register(FieldType::I32, "INTEGER", i32_to_native, int_to_storage);
        registry.register(FieldType::I64, "INTEGER", i64_to_native, int_to_storage);
        registry.register(FieldType::F32, "REAL", f32_to_native, float_to_storage);
        registry.register(FieldType::F64, "REAL", f64_to_native, float_to_storage);
        registry.register(FieldType::Char, "TEXT", char_to_native, text_to_storage);
        registry.register(FieldType::String, "TEXT", string_to_native, text_to_storage);
        registry
    }

    /// Add or replace the entry for `ty`.
    pub fn register(
        &mut self,
        ty: FieldType,
        column: &'static str,
        to_native: ToNative,
        to_storage: ToStorage,
    ) {
        self.types.insert(
            ty,
            Datatype {
                column,
                to_native,
                to_storage,
            },
        );
    }

    /// The column type for `ty`, or `None` if unregistered.
    #[must_use]
    pub fn column_type_for(&self, ty: FieldType) -> Option<&'static str> {
        self.types.get(&ty).map(|d| d.column)
    }

    /// Coerce a stored value to the native representation of `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnsupportedFieldType`] if `ty` is unregistered
    /// and [`PersistError::Coercion`] if the value does not fit.
    pub fn coerce(
        &self,
        shape: &str,
        field: &str,
        ty: FieldType,
        stored: Value,
    ) -> Result<FieldValue, PersistError> {
        let datatype = self.lookup(shape, field, ty)?;
        (datatype.to_native)(stored).map_err(|source| PersistError::Coercion {
            shape: shape.to_string(),
            field: field.to_string(),
            source,
        })
    }

    /// Coerce a native value to its stored representation.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnsupportedFieldType`] if the value's type is
    /// unregistered.
    pub fn to_storage(
        &self,
        shape: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<Value, PersistError> {
        let datatype = self.lookup(shape, field, value.field_type())?;
        (datatype.to_storage)(value).map_err(|source| PersistError::Coercion {
            shape: shape.to_string(),
            field: field.to_string(),
            source,
        })
    }

    fn lookup(&self, shape: &str, field: &str, ty: FieldType) -> Result<&Datatype, PersistError> {
        self.types
            .get(&ty)
            .ok_or_else(|| PersistError::UnsupportedFieldType {
                shape: shape.to_string(),
                field: field.to_string(),
                ty,
            })
    }
}

impl Default for DatatypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => format!("INTEGER {i}"),
        Value::Real(r) => format!("REAL {r}"),
        Value::Text(t) => format!("TEXT {t:?}"),
        Value::Blob(b) => format!("BLOB ({} bytes)", b.len()),
    }
}

fn bool_to_native(stored: Value) -> Result<FieldValue, CoerceError> {
    match stored {
        Value::Integer(i) => Ok(FieldValue::Bool(i != 0)),
        other => Err(CoerceError::new(FieldType::Bool, describe(&other))),
    }
}

fn bool_to_storage(value: &FieldValue) -> Result<Value, CoerceError> {
    match value {
        FieldValue::Bool(b) => Ok(Value::Integer(i64::from(*b))),
        other => Err(CoerceError::new(FieldType::Bool, format!("{other:?}"))),
    }
}

fn i32_to_native(stored: Value) -> Result<FieldValue, CoerceError> {
    match stored {
        Value::Integer(i) => i32::try_from(i)
            .map(FieldValue::I32)
            .map_err(|_| CoerceError::new(FieldType::I32, format!("out-of-range INTEGER {i}"))),
        other => Err(CoerceError::new(FieldType::I32, describe(&other))),
    }
}

fn i64_to_native(stored: Value) -> Result<FieldValue, CoerceError> {
    match stored {
        Value::Integer(i) => Ok(FieldValue::I64(i)),
        other => Err(CoerceError::new(FieldType::I64, describe(&other))),
    }
}

fn int_to_storage(value: &FieldValue) -> Result<Value, CoerceError> {
    match value {
        FieldValue::I32(i) => Ok(Value::Integer(i64::from(*i))),
        FieldValue::I64(i) => Ok(Value::Integer(*i)),
        other => Err(CoerceError::new(other.field_type(), format!("{other:?}"))),
    }
}

// REAL columns hold f64; integers can appear when a float was written as a
// whole number by another tool.
fn stored_f64(stored: &Value) -> Option<f64> {
    match *stored {
        Value::Real(r) => Some(r),
        Value::Integer(i) => Some(i as f64),
        _ => None,
    }
}

fn f32_to_native(stored: Value) -> Result<FieldValue, CoerceError> {
    stored_f64(&stored)
        .map(|d| FieldValue::F32(d as f32))
        .ok_or_else(|| CoerceError::new(FieldType::F32, describe(&stored)))
}

fn f64_to_native(stored: Value) -> Result<FieldValue, CoerceError> {
    stored_f64(&stored)
        .map(FieldValue::F64)
        .ok_or_else(|| CoerceError::new(FieldType::F64, describe(&stored)))
}

fn float_to_storage(value: &FieldValue) -> Result<Value, CoerceError> {
    match value {
        FieldValue::F32(f) => Ok(Value::Real(f64::from(*f))),
        FieldValue::F64(d) => Ok(Value::Real(*d)),
        other => Err(CoerceError::new(other.field_type(), format!("{other:?}"))),
    }
}

fn char_to_native(stored: Value) -> Result<FieldValue, CoerceError> {
    if let Value::Text(ref text) = stored {
        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(FieldValue::Char(c));
        }
    }
    Err(CoerceError::new(FieldType::Char, describe(&stored)))
}

fn string_to_native(stored: Value) -> Result<FieldValue, CoerceError> {
    match stored {
        Value::Text(text) => Ok(FieldValue::String(text)),
        other => Err(CoerceError::new(FieldType::String, describe(&other))),
    }
}

fn text_to_storage(value: &FieldValue) -> Result<Value, CoerceError> {
    match value {
        FieldValue::Char(c) => Ok(Value::Text(c.to_string())),
        FieldValue::String(s) => Ok(Value::Text(s.clone())),
        other => Err(CoerceError::new(other.field_type(), format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: FieldValue) -> FieldValue {
        let registry = DatatypeRegistry::with_defaults();
        let ty = value.field_type();
        let stored = registry.to_storage("Shape", "field", &value).unwrap();
        registry.coerce("Shape", "field", ty, stored).unwrap()
    }

    #[test]
    fn test_defaults_cover_every_field_type() {
        let registry = DatatypeRegistry::with_defaults();
        for ty in FieldType::ALL {
            assert!(registry.column_type_for(ty).is_some(), "{ty} missing");
        }
        assert_eq!(registry.column_type_for(FieldType::Bool), Some("INTEGER"));
        assert_eq!(registry.column_type_for(FieldType::F32), Some("REAL"));
        assert_eq!(registry.column_type_for(FieldType::String), Some("TEXT"));
    }

    #[test]
    fn test_bool_is_stored_as_zero_or_one() {
        let registry = DatatypeRegistry::with_defaults();
        assert_eq!(
            registry.to_storage("P", "g", &FieldValue::Bool(true)).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            registry.to_storage("P", "g", &FieldValue::Bool(false)).unwrap(),
            Value::Integer(0)
        );
        assert_eq!(
            registry.coerce("P", "g", FieldType::Bool, Value::Integer(1)).unwrap(),
            FieldValue::Bool(true)
        );
    }

    #[test]
    fn test_f32_boundaries_survive_widening() {
        for v in [f32::MIN, f32::MAX, f32::MIN_POSITIVE, -0.0, 1.5, -2.25] {
            assert_eq!(roundtrip(FieldValue::F32(v)), FieldValue::F32(v));
        }
    }

    #[test]
    fn test_f32_accepts_integer_storage() {
        let registry = DatatypeRegistry::with_defaults();
        assert_eq!(
            registry.coerce("P", "x", FieldType::F32, Value::Integer(3)).unwrap(),
            FieldValue::F32(3.0)
        );
    }

    #[test]
    fn test_i32_rejects_out_of_range() {
        let registry = DatatypeRegistry::with_defaults();
        let err = registry
            .coerce("W", "heat", FieldType::I32, Value::Integer(i64::MAX))
            .unwrap_err();
        assert!(matches!(err, PersistError::Coercion { .. }));
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(roundtrip(FieldValue::Char('é')), FieldValue::Char('é'));
        let registry = DatatypeRegistry::with_defaults();
        assert!(registry
            .coerce("N", "c", FieldType::Char, Value::Text("ab".into()))
            .is_err());
    }

    #[test]
    fn test_null_is_not_coerced() {
        let registry = DatatypeRegistry::with_defaults();
        for ty in FieldType::ALL {
            assert!(registry.coerce("S", "f", ty, Value::Null).is_err());
        }
    }

    #[test]
    fn test_unregistered_type_is_unsupported() {
        let mut registry = DatatypeRegistry::empty();
        registry.register(FieldType::I32, "INTEGER", i32_to_native, int_to_storage);
        let err = registry
            .to_storage("Weapon", "heat", &FieldValue::F32(1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            PersistError::UnsupportedFieldType { ty: FieldType::F32, .. }
        ));
        assert_eq!(registry.column_type_for(FieldType::F32), None);
    }
}
