//! Entity identifiers and the in-memory entity record.
//!
//! An [`EntityId`] is a `u64` assigned by storage the first time an entity is
//! saved. Until then the entity carries [`EntityId::UNSAVED`].

use serde::{Deserialize, Serialize};

use crate::component::Component;

/// A persistent entity identifier.
///
/// `0` is the sentinel for "not yet persisted". An entity moves from the
/// sentinel to a storage-assigned identifier exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The "not yet persisted" sentinel.
    pub const UNSAVED: EntityId = EntityId(0);

    /// Create an identifier from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` once storage has assigned this identifier.
    #[must_use]
    pub const fn is_saved(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// An in-memory entity: its persistent id and the components attached to it.
///
/// At most one component per shape name is attached at a time; shape names
/// compare without regard to ASCII case.
#[derive(Debug, Default)]
pub struct Entity {
    id: EntityId,
    components: Vec<Box<dyn Component>>,
}

impl Default for EntityId {
    fn default() -> Self {
        Self::UNSAVED
    }
}

impl Entity {
    /// A blank entity: no id, no components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attach.
    #[must_use]
    pub fn with(mut self, component: impl Component) -> Self {
        self.attach(Box::new(component));
        self
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Overwrite the persistent id.
    pub fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Attach a component, replacing any existing instance of the same shape.
    ///
    /// Returns the replaced instance, if any.
    pub fn attach(&mut self, component: Box<dyn Component>) -> Option<Box<dyn Component>> {
        let replaced = self.remove(component.shape_name());
        self.components.push(component);
        replaced
    }

    /// Remove the component of the named shape.
    pub fn remove(&mut self, shape: &str) -> Option<Box<dyn Component>> {
        let pos = self
            .components
            .iter()
            .position(|c| c.shape_name().eq_ignore_ascii_case(shape))?;
        Some(self.components.remove(pos))
    }

    /// The component of the named shape, if attached.
    #[must_use]
    pub fn get(&self, shape: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.shape_name().eq_ignore_ascii_case(shape))
            .map(|c| c.as_ref())
    }

    /// The first attached component of concrete type `T`.
    #[must_use]
    pub fn get_as<T: Component>(&self) -> Option<&T> {
        self.components
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    /// Returns `true` if a component of the named shape is attached.
    #[must_use]
    pub fn has(&self, shape: &str) -> bool {
        self.get(shape).is_some()
    }

    /// All attached components, in attachment order.
    pub fn components(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(|c| c.as_ref())
    }

    /// Number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::field::FieldValue;

    #[derive(Debug)]
    struct Tag(&'static str);

    impl Component for Tag {
        fn shape_name(&self) -> &'static str {
            self.0
        }

        fn field_values(&self) -> Vec<FieldValue> {
            Vec::new()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_entity_id_creation() {
        let e = EntityId::from_raw(42);
        assert_eq!(e.id(), 42);
        assert!(e.is_saved());
    }

    #[test]
    fn test_entity_id_sentinel() {
        assert!(!EntityId::UNSAVED.is_saved());
        assert_eq!(EntityId::default(), EntityId::UNSAVED);
        assert_eq!(Entity::new().id(), EntityId::UNSAVED);
    }

    #[test]
    fn test_attach_replaces_same_shape() {
        let mut entity = Entity::new().with(Tag("Player"));
        let replaced = entity.attach(Box::new(Tag("player")));
        assert!(replaced.is_some());
        assert_eq!(entity.component_count(), 1);
    }

    #[test]
    fn test_remove_and_lookup_ignore_case() {
        let mut entity = Entity::new().with(Tag("Player")).with(Tag("Enemy"));
        assert!(entity.has("PLAYER"));
        assert!(entity.remove("player").is_some());
        assert!(!entity.has("Player"));
        assert!(entity.get("enemy").is_some());
        assert!(entity.remove("player").is_none());
    }

    #[test]
    fn test_get_as_downcasts() {
        let entity = Entity::new().with(Tag("Player"));
        assert_eq!(entity.get_as::<Tag>().map(|t| t.0), Some("Player"));
    }

    #[test]
    fn test_entity_id_serialization_roundtrip() {
        let id = EntityId::from_raw(999);
        let json = serde_json::to_string(&id).unwrap();
        let restored: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
