//! The live world: the entity container the persistence engine serves.
//!
//! The [`World`] owns every live [`Entity`]. Despawning a persisted entity
//! notifies a [`RecycleObserver`] so its rows are deleted at the next save.

use engine_component::Entity;
use engine_persistence::{EntityPersistence, PersistError, RecycleObserver, SaveReport};
use tracing::info;

/// The live entities of one game session.
#[derive(Debug, Default)]
pub struct World {
    entities: Vec<Entity>,
}

impl World {
    /// Create a new empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, returning its index.
    pub fn spawn(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Remove the entity at `index`, telling `observer` about its id.
    ///
    /// Returns the removed entity, or `None` if `index` is out of range.
    pub fn despawn(&mut self, index: usize, observer: &mut dyn RecycleObserver) -> Option<Entity> {
        if index >= self.entities.len() {
            return None;
        }
        let entity = self.entities.remove(index);
        observer.recycled(entity.id());
        Some(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Replace the world's contents with every stored entity.
    ///
    /// # Errors
    ///
    /// Propagates the engine's load errors.
    pub fn load_from(&mut self, engine: &mut EntityPersistence) -> Result<usize, PersistError> {
        self.entities.clear();
        let count = engine.begin_loading()?;
        for _ in 0..count {
            let mut entity = Entity::new();
            engine.load_entity(&mut entity)?;
            self.entities.push(entity);
        }
        info!(entities = count, "world loaded");
        Ok(count)
    }

    /// Save every live entity.
    ///
    /// # Errors
    ///
    /// Propagates the engine's save errors.
    pub fn save_to(&mut self, engine: &mut EntityPersistence) -> Result<SaveReport, PersistError> {
        engine.save(self.entities.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use engine_component::EntityId;
    use engine_persistence::PersistenceConfig;

    use super::*;
    use crate::components::{Health, Nameplate, Physics, register_all};

    fn engine(config: PersistenceConfig) -> EntityPersistence {
        let mut engine = EntityPersistence::new(config);
        register_all(&mut engine).unwrap();
        engine
    }

    #[test]
    fn test_despawn_notifies_observer() {
        let mut engine = engine(PersistenceConfig::default());
        let mut world = World::new();
        let mut entity = Entity::new().with(Health::full(10));
        entity.set_id(EntityId(4));
        world.spawn(entity);

        assert!(world.despawn(0, &mut engine).is_some());
        assert!(world.is_empty());
        assert_eq!(engine.pending_deletions(), [EntityId(4)]);
        assert!(world.despawn(0, &mut engine).is_none());
    }

    #[test]
    fn test_save_then_load_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig::default().with_database_path(dir.path().join("w.db"));

        let mut engine = engine(config);
        engine.open().unwrap();
        let mut world = World::new();
        world.spawn(
            Entity::new()
                .with(Physics {
                    x: 3.0,
                    y: 4.0,
                    grounded: true,
                })
                .with(Nameplate {
                    label: "Scout".into(),
                    glyph: '@',
                }),
        );
        world.spawn(Entity::new().with(Health::full(50)));
        let report = world.save_to(&mut engine).unwrap();
        assert_eq!(report.inserted, 2);

        let mut restored = World::new();
        assert_eq!(restored.load_from(&mut engine).unwrap(), 2);
        let ids: Vec<_> = restored.entities().map(Entity::id).collect();
        assert_eq!(ids, [EntityId(1), EntityId(2)]);
        let first = restored.entities().next().unwrap();
        assert_eq!(first.get_as::<Nameplate>().map(|n| n.glyph), Some('@'));
        assert!(restored.entities().nth(1).unwrap().has("Health"));
    }
}
