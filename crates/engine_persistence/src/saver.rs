//! Entity save sequencer.
//!
//! Writes one live entity at a time. An unsaved entity gets a new `Entity`
//! row and one inserted row per attached component; a saved entity has its
//! `Entity` row touched and each attached component's row updated (or
//! inserted if the component is new since the last save). Rows of
//! registered shapes that are no longer attached are removed. Entities whose
//! ids were deleted, in this save or an earlier one, are never written.
//!
//! Failures are local: a component that cannot be written is logged and
//! skipped, the rest of the entity and the rest of the save carry on.

use std::collections::HashSet;

use engine_component::{Component, EntityId};
use rusqlite::Connection;
use tracing::{debug, error, warn};

use crate::container::PersistentEntity;
use crate::datatype::DatatypeRegistry;
use crate::deathrow::Executed;
use crate::error::PersistError;
use crate::marshal::{Marshaller, RowWrite, sql_id};
use crate::registry::{ComponentTypeRegistry, ShapeEntry};
use crate::schema::{INSERT_ENTITY, INSERT_ENTITY_WITH_ID, TOUCH_ENTITY};

/// Counters for one save cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Entity rows removed by the deathrow flush.
    pub deleted: usize,
    /// Entities stored for the first time.
    pub inserted: usize,
    /// Previously stored entities updated.
    pub updated: usize,
    /// Entities not written (queued for deletion, or their row failed).
    pub skipped: usize,
    /// Component rows inserted or updated.
    pub components_written: usize,
    /// Component rows that failed to write.
    pub components_failed: usize,
    /// Rows removed for components no longer attached.
    pub components_pruned: usize,
}

/// Writes entities within one save transaction.
pub struct EntitySaver<'a> {
    conn: &'a Connection,
    registry: &'a ComponentTypeRegistry,
    marshaller: Marshaller<'a>,
    retired: Option<&'a HashSet<EntityId>>,
}

impl<'a> EntitySaver<'a> {
    #[must_use]
    pub fn new(
        conn: &'a Connection,
        datatypes: &'a DatatypeRegistry,
        registry: &'a ComponentTypeRegistry,
    ) -> Self {
        Self {
            conn,
            registry,
            marshaller: Marshaller::new(conn, datatypes),
            retired: None,
        }
    }

    /// Skip entities whose ids were deleted by an earlier save.
    #[must_use]
    pub fn retiring(mut self, retired: &'a HashSet<EntityId>) -> Self {
        self.retired = Some(retired);
        self
    }

    /// Store one entity.
    ///
    /// Returns the id storage assigned when the entity was inserted for the
    /// first time. The caller applies it once the transaction commits.
    pub fn store<E: PersistentEntity + ?Sized>(
        &self,
        entity: &E,
        condemned: &Executed,
        report: &mut SaveReport,
    ) -> Option<EntityId> {
        let id = entity.entity_id();
        if !id.is_saved() {
            return self.insert_entity(entity, report);
        }
        if condemned.contains(id) {
            debug!(entity = %id, "entity is queued for deletion; not saving");
            report.skipped += 1;
            return None;
        }
        if self.retired.is_some_and(|retired| retired.contains(&id)) {
            debug!(entity = %id, "entity was deleted by an earlier save; not saving");
            report.skipped += 1;
            return None;
        }
        self.update_entity(id, entity, report);
        None
    }

    fn insert_entity<E: PersistentEntity + ?Sized>(
        &self,
        entity: &E,
        report: &mut SaveReport,
    ) -> Option<EntityId> {
        if let Err(err) = self.conn.execute(INSERT_ENTITY, []) {
            warn!(error = %err, "inserting new entity failed");
            report.skipped += 1;
            return None;
        }
        let id = EntityId::from_raw(self.conn.last_insert_rowid() as u64);
        debug!(entity = %id, "assigned new id");

        for component in entity.attached_components() {
            let written = self.with_entry(id, component, |entry| {
                self.marshaller.insert(id, entry, component)
            });
            tally(written.is_some(), report);
        }
        report.inserted += 1;
        Some(id)
    }

    fn update_entity<E: PersistentEntity + ?Sized>(
        &self,
        id: EntityId,
        entity: &E,
        report: &mut SaveReport,
    ) {
        if let Err(err) = self.touch_entity(id) {
            warn!(entity = %id, error = %err, "updating entity row failed");
            report.skipped += 1;
            return;
        }

        let components = entity.attached_components();
        let mut attached = HashSet::new();
        for component in &components {
            let written = self.with_entry(id, *component, |entry| {
                self.marshaller.upsert(id, entry, *component)
            });
            if let Some(RowWrite::Inserted) = written {
                debug!(entity = %id, shape = component.shape_name(), "component is new since last save");
            }
            tally(written.is_some(), report);
            attached.insert(component.shape_name().to_ascii_lowercase());
        }

        for entry in self.registry.iter() {
            if attached.contains(&entry.name().to_ascii_lowercase()) {
                continue;
            }
            match self.marshaller.delete(id, entry) {
                Ok(n) => report.components_pruned += n,
                Err(err) => {
                    warn!(entity = %id, shape = entry.name(), error = %err, "pruning detached component failed");
                }
            }
        }
        report.updated += 1;
    }

    /// Bump the entity row's revision, re-creating the row if it is missing.
    ///
    /// A live id with no row comes from a world replaced by an import;
    /// deleted ids never reach this point.
    fn touch_entity(&self, id: EntityId) -> Result<(), PersistError> {
        let changed = self
            .conn
            .execute(TOUCH_ENTITY, [sql_id(id)])
            .map_err(PersistError::storage("updating entity row"))?;
        if changed == 0 {
            debug!(entity = %id, "entity row missing; re-inserting");
            self.conn
                .execute(INSERT_ENTITY_WITH_ID, [sql_id(id)])
                .map_err(PersistError::storage("re-inserting entity row"))?;
        }
        Ok(())
    }

    /// Resolve the component's registry entry and run `write` against it,
    /// logging any failure.
    fn with_entry<T>(
        &self,
        id: EntityId,
        component: &dyn Component,
        write: impl FnOnce(&ShapeEntry) -> Result<T, PersistError>,
    ) -> Option<T> {
        let shape = component.shape_name();
        let result = self
            .registry
            .get(shape)
            .ok_or_else(|| PersistError::UnknownShape(shape.to_string()))
            .and_then(write);
        match result {
            Ok(value) => Some(value),
            Err(err @ PersistError::Storage { .. }) => {
                warn!(entity = %id, shape, error = %err, "component write failed");
                None
            }
            Err(err) => {
                error!(entity = %id, shape, error = %err, "component cannot be persisted");
                None
            }
        }
    }
}

fn tally(written: bool, report: &mut SaveReport) {
    if written {
        report.components_written += 1;
    } else {
        report.components_failed += 1;
    }
}
