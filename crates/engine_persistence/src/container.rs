//! The seams between the persistence core and the entity container.
//!
//! The core never owns entities. It reads and writes them through
//! [`PersistentEntity`], and the container reports recycled entities through
//! [`RecycleObserver`].

use engine_component::{Component, Entity, EntityId};

/// An entity as the persistence core sees it.
pub trait PersistentEntity {
    /// The persistent identifier ([`EntityId::UNSAVED`] until first save).
    fn entity_id(&self) -> EntityId;

    /// Record the identifier storage assigned.
    fn assign_id(&mut self, id: EntityId);

    /// Components currently attached.
    fn attached_components(&self) -> Vec<&dyn Component>;

    /// Attach a component, replacing any instance of the same shape.
    fn attach_component(&mut self, component: Box<dyn Component>);

    /// Remove the component of the named shape. Returns `true` if one was attached.
    fn remove_component(&mut self, shape: &str) -> bool;
}

/// Notified whenever the container recycles a persisted entity.
pub trait RecycleObserver {
    fn recycled(&mut self, id: EntityId);
}

impl PersistentEntity for Entity {
    fn entity_id(&self) -> EntityId {
        self.id()
    }

    fn assign_id(&mut self, id: EntityId) {
        self.set_id(id);
    }

    fn attached_components(&self) -> Vec<&dyn Component> {
        self.components().collect()
    }

    fn attach_component(&mut self, component: Box<dyn Component>) {
        self.attach(component);
    }

    fn remove_component(&mut self, shape: &str) -> bool {
        self.remove(shape).is_some()
    }
}
