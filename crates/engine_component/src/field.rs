//! Primitive field types and values.
//!
//! A component is a flat record of primitive fields. [`FieldType`] names the
//! closed set of primitives a field may have, [`FieldValue`] carries one value
//! of that set, and [`FieldReader`] hands a list of values back to a typed
//! constructor one position at a time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The primitive type of a single component field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    /// `bool`
    Bool,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `char`
    Char,
    /// `String`
    String,
}

impl FieldType {
    /// Every supported field type.
    pub const ALL: [FieldType; 7] = [
        FieldType::Bool,
        FieldType::I32,
        FieldType::I64,
        FieldType::F32,
        FieldType::F64,
        FieldType::Char,
        FieldType::String,
    ];

    /// The native type name, as written in Rust source.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::I32 => "i32",
            FieldType::I64 => "i64",
            FieldType::F32 => "f32",
            FieldType::F64 => "f64",
            FieldType::Char => "char",
            FieldType::String => "String",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single native field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
}

impl FieldValue {
    /// The [`FieldType`] of this value.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::I32(_) => FieldType::I32,
            FieldValue::I64(_) => FieldType::I64,
            FieldValue::F32(_) => FieldType::F32,
            FieldValue::F64(_) => FieldType::F64,
            FieldValue::Char(_) => FieldType::Char,
            FieldValue::String(_) => FieldType::String,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::I32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::I64(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::F32(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::F64(v)
    }
}

impl From<char> for FieldValue {
    fn from(v: char) -> Self {
        FieldValue::Char(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

/// Errors raised while constructing a component from field values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructError {
    /// No constructor is registered for the named shape.
    #[error("no constructor registered for shape '{0}'")]
    NoConstructor(String),

    /// The supplied values do not match the constructor's parameters.
    #[error("argument mismatch for shape '{shape}': {detail}")]
    ArgumentMismatch {
        /// The shape being constructed.
        shape: String,
        /// What went wrong.
        detail: String,
    },
}

impl ConstructError {
    /// Shorthand for an [`ConstructError::ArgumentMismatch`].
    #[must_use]
    pub fn mismatch(shape: impl Into<String>, detail: impl Into<String>) -> Self {
        ConstructError::ArgumentMismatch {
            shape: shape.into(),
            detail: detail.into(),
        }
    }
}

/// Positional reader over the coerced values handed to a constructor.
///
/// Each `next_*` call consumes one value and checks its type.
///
/// ```rust
/// use engine_component::{FieldReader, FieldValue};
///
/// let mut reader = FieldReader::new("Physics", vec![FieldValue::F32(1.5), FieldValue::Bool(true)]);
/// assert_eq!(reader.next_f32().unwrap(), 1.5);
/// assert!(reader.next_bool().unwrap());
/// reader.finish().unwrap();
/// ```
#[derive(Debug)]
pub struct FieldReader {
    shape: String,
    values: std::vec::IntoIter<FieldValue>,
    position: usize,
}

macro_rules! reader_method {
    ($name:ident, $variant:ident, $ty:ty) => {
        #[doc = concat!("Consume the next value as `", stringify!($ty), "`.")]
        ///
        /// # Errors
        ///
        /// Returns [`ConstructError::ArgumentMismatch`] if no value remains or
        /// the value has a different type.
        pub fn $name(&mut self) -> Result<$ty, ConstructError> {
            match self.take(FieldType::$variant)? {
                FieldValue::$variant(v) => Ok(v),
                other => Err(self.wrong_type(FieldType::$variant, &other)),
            }
        }
    };
}

impl FieldReader {
    /// Create a reader over `values` for the named shape.
    #[must_use]
    pub fn new(shape: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Self {
            shape: shape.into(),
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Number of values not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    reader_method!(next_bool, Bool, bool);
    reader_method!(next_i32, I32, i32);
    reader_method!(next_i64, I64, i64);
    reader_method!(next_f32, F32, f32);
    reader_method!(next_f64, F64, f64);
    reader_method!(next_char, Char, char);
    reader_method!(next_string, String, String);

    /// Check that every value was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructError::ArgumentMismatch`] if values remain.
    pub fn finish(self) -> Result<(), ConstructError> {
        let leftover = self.remaining();
        if leftover == 0 {
            Ok(())
        } else {
            Err(ConstructError::mismatch(
                self.shape,
                format!(
                    "expected {} arguments, got {}",
                    self.position,
                    self.position + leftover
                ),
            ))
        }
    }

    fn take(&mut self, expected: FieldType) -> Result<FieldValue, ConstructError> {
        let position = self.position;
        self.position += 1;
        self.values.next().ok_or_else(|| {
            ConstructError::mismatch(
                self.shape.clone(),
                format!("missing argument {position} ({expected})"),
            )
        })
    }

    fn wrong_type(&self, expected: FieldType, found: &FieldValue) -> ConstructError {
        ConstructError::mismatch(
            self.shape.clone(),
            format!(
                "argument {} expected {expected}, found {}",
                self.position - 1,
                found.field_type()
            ),
        )
    }
}
