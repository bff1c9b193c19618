//! Deferred deletion queue ("deathrow").
//!
//! Recycled entity ids are queued instead of being deleted on the spot, and
//! the queue is flushed at the start of the next save. Destructive writes
//! therefore only happen at save checkpoints: a crash between checkpoints
//! leaves the previous save intact.
//!
//! A flush deletes, per id and in queue order, every registered shape's row
//! and then the entity row. A failed delete is logged and the id is still
//! dropped from the queue.

use engine_component::EntityId;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::datatype::DatatypeRegistry;
use crate::marshal::{Marshaller, sql_id};
use crate::registry::ComponentTypeRegistry;
use crate::schema::DELETE_ENTITY;

/// Queue of entity ids awaiting deletion.
#[derive(Debug, Default)]
pub struct Deathrow {
    queue: Vec<EntityId>,
}

/// Outcome of one flush.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Executed {
    /// Ids drained from the queue, in queue order.
    pub ids: Vec<EntityId>,
    /// Entity rows actually removed.
    pub entities_deleted: usize,
    /// Statements that failed.
    pub failures: usize,
}

impl Executed {
    /// Returns `true` if `id` was on this flush's list.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }
}

impl Deathrow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `id` for deletion. Duplicates are kept.
    pub fn enqueue(&mut self, id: EntityId) {
        debug!(entity = %id, "entity queued for deletion");
        self.queue.push(id);
    }

    /// Queued ids, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[EntityId] {
        &self.queue
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Put ids from a flush whose transaction was rolled back back at the
    /// front of the queue.
    pub fn requeue(&mut self, ids: Vec<EntityId>) {
        let newer = std::mem::replace(&mut self.queue, ids);
        self.queue.extend(newer);
    }

    /// Delete every queued entity and its component rows, then clear the queue.
    pub fn drain_and_delete(
        &mut self,
        conn: &Connection,
        datatypes: &DatatypeRegistry,
        registry: &ComponentTypeRegistry,
    ) -> Executed {
        let ids = std::mem::take(&mut self.queue);
        let marshaller = Marshaller::new(conn, datatypes);
        let mut executed = Executed::default();

        for &id in &ids {
            debug!(entity = %id, "deleting entity");
            for entry in registry.iter() {
                if let Err(err) = marshaller.delete(id, entry) {
                    warn!(entity = %id, shape = entry.name(), error = %err, "component delete failed");
                    executed.failures += 1;
                }
            }
            match conn.execute(DELETE_ENTITY, [sql_id(id)]) {
                Ok(n) => executed.entities_deleted += n,
                Err(err) => {
                    warn!(entity = %id, error = %err, "entity delete failed");
                    executed.failures += 1;
                }
            }
        }

        if !ids.is_empty() {
            info!(
                queued = ids.len(),
                deleted = executed.entities_deleted,
                failures = executed.failures,
                "deathrow flushed"
            );
        }
        executed.ids = ids;
        executed
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{FieldType, Shape};

    use super::*;
    use crate::schema::CREATE_ENTITY_TABLE;

    fn setup() -> (Connection, DatatypeRegistry, ComponentTypeRegistry) {
        let datatypes = DatatypeRegistry::with_defaults();
        let mut registry = ComponentTypeRegistry::new();
        registry
            .register_shape(
                Shape::new("Health").field("hp", FieldType::I32),
                |_, _| Err(engine_component::ConstructError::NoConstructor("Health".into())),
                &datatypes,
            )
            .unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_ENTITY_TABLE).unwrap();
        conn.execute_batch(&registry.get("Health").unwrap().sql.create)
            .unwrap();
        for id in 1..=3 {
            conn.execute("INSERT INTO Entity (entityId) VALUES (?1)", [id])
                .unwrap();
            conn.execute("INSERT INTO Health (entityId, hp) VALUES (?1, 10)", [id])
                .unwrap();
        }
        (conn, datatypes, registry)
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_flush_removes_entity_and_component_rows() {
        let (conn, datatypes, registry) = setup();
        let mut deathrow = Deathrow::new();
        deathrow.enqueue(EntityId(2));

        let executed = deathrow.drain_and_delete(&conn, &datatypes, &registry);
        assert_eq!(executed.entities_deleted, 1);
        assert_eq!(executed.failures, 0);
        assert!(executed.contains(EntityId(2)));
        assert!(deathrow.is_empty());
        assert_eq!(count(&conn, "Entity"), 2);
        assert_eq!(count(&conn, "Health"), 2);
    }

    #[test]
    fn test_failures_still_clear_queue() {
        let (conn, datatypes, registry) = setup();
        conn.execute_batch("DROP TABLE Health").unwrap();
        let mut deathrow = Deathrow::new();
        deathrow.enqueue(EntityId(1));

        let executed = deathrow.drain_and_delete(&conn, &datatypes, &registry);
        assert_eq!(executed.failures, 1);
        assert_eq!(executed.entities_deleted, 1);
        assert!(deathrow.is_empty());
    }

    #[test]
    fn test_unknown_id_is_harmless() {
        let (conn, datatypes, registry) = setup();
        let mut deathrow = Deathrow::new();
        deathrow.enqueue(EntityId(99));
        let executed = deathrow.drain_and_delete(&conn, &datatypes, &registry);
        assert_eq!(executed.entities_deleted, 0);
        assert_eq!(count(&conn, "Entity"), 3);
    }

    #[test]
    fn test_requeue_puts_old_ids_first() {
        let mut deathrow = Deathrow::new();
        deathrow.enqueue(EntityId(3));
        deathrow.requeue(vec![EntityId(1), EntityId(2)]);
        assert_eq!(deathrow.pending(), [EntityId(1), EntityId(2), EntityId(3)]);
        assert_eq!(deathrow.len(), 3);
    }
}
