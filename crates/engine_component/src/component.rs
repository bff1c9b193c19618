//! Core [`Component`] trait and the [`Shape`] descriptor.
//!
//! Every piece of data attached to an entity implements [`Component`]. The
//! trait is object-safe so a container can hold `Box<dyn Component>` values
//! of many kinds side by side.
//!
//! ## Shapes
//!
//! A [`Shape`] is the explicit field schema of one kind of component: a name
//! and an ordered list of primitive fields. The field order is fixed for the
//! life of a database, because it defines the column order of the shape's
//! table. Component types describe themselves by implementing
//! [`ShapedComponent`], which pairs the shape with a typed constructor.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::field::{ConstructError, FieldType, FieldValue};

/// One field of a [`Shape`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field (and column) name.
    pub name: String,
    /// Primitive type of the field.
    pub ty: FieldType,
}

/// The field schema of one kind of component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    /// Shape name, also the table name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
}

impl Shape {
    /// Start a shape with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` for a shape without fields (a tag).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if `name` refers to this shape, ignoring ASCII case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", field.name, field.ty)?;
        }
        f.write_str("}")
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use std::any::Any;
/// use engine_component::{Component, FieldValue};
///
/// #[derive(Debug)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn shape_name(&self) -> &'static str { "Health" }
///     fn field_values(&self) -> Vec<FieldValue> {
///         vec![self.current.into(), self.max.into()]
///     }
///     fn as_any(&self) -> &dyn Any { self }
/// }
/// ```
pub trait Component: Any + Send + Sync + fmt::Debug {
    /// Name of the shape this component is an instance of.
    fn shape_name(&self) -> &'static str;

    /// Current field values, in the shape's declared order.
    fn field_values(&self) -> Vec<FieldValue>;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// A component type that knows its own [`Shape`] and how to build itself
/// from coerced field values.
pub trait ShapedComponent: Component + Sized {
    /// The shape descriptor. Must agree with [`Component::shape_name`] and
    /// [`Component::field_values`].
    fn shape() -> Shape;

    /// Build an instance owned by `owner` from values in declared order.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructError::ArgumentMismatch`] if `values` does not fit
    /// the shape.
    fn from_fields(owner: EntityId, values: Vec<FieldValue>) -> Result<Self, ConstructError>;
}
