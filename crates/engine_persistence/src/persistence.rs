//! [`EntityPersistence`], the engine's single entry point for storage.
//!
//! It owns the registries, the active connection, the load session and the
//! deathrow, and sequences them: load sessions hand ids out one at a time,
//! saves flush the deathrow and then write every live entity inside one
//! transaction, and imports swap the whole world for another file's.

use std::collections::HashSet;
use std::path::Path;

use engine_component::{Component, EntityId, Shape, ShapedComponent};
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::config::{FaultPolicy, PersistenceConfig};
use crate::connection::{ConnectionSlot, open_database};
use crate::container::{PersistentEntity, RecycleObserver};
use crate::datatype::DatatypeRegistry;
use crate::deathrow::Deathrow;
use crate::error::PersistError;
use crate::import::{self, ImportReport};
use crate::loader::{LoadPhase, LoadSequencer};
use crate::marshal::Marshaller;
use crate::registry::{ComponentTypeRegistry, Constructor};
use crate::saver::{EntitySaver, SaveReport};
use crate::schema::create_tables;

/// Persists the entities of one game world.
#[derive(Debug)]
pub struct EntityPersistence {
    config: PersistenceConfig,
    datatypes: DatatypeRegistry,
    registry: ComponentTypeRegistry,
    connection: ConnectionSlot,
    loader: LoadSequencer,
    deathrow: Deathrow,
    // Ids deleted by a committed save on the active connection.
    retired: HashSet<EntityId>,
    // Connection generation whose tables have been created.
    tables_ready: Option<u64>,
}

impl Default for EntityPersistence {
    fn default() -> Self {
        Self::new(PersistenceConfig::default())
    }
}

impl EntityPersistence {
    /// Create an engine with the default datatype mappings and no connection.
    #[must_use]
    pub fn new(config: PersistenceConfig) -> Self {
        Self::with_datatypes(config, DatatypeRegistry::with_defaults())
    }

    /// Create an engine with custom datatype mappings.
    #[must_use]
    pub fn with_datatypes(config: PersistenceConfig, datatypes: DatatypeRegistry) -> Self {
        Self {
            config,
            datatypes,
            registry: ComponentTypeRegistry::new(),
            connection: ConnectionSlot::new(),
            loader: LoadSequencer::new(),
            deathrow: Deathrow::new(),
            retired: HashSet::new(),
            tables_ready: None,
        }
    }

    /// Register a component type. Registration order is table order.
    ///
    /// # Errors
    ///
    /// See [`ComponentTypeRegistry::register_shape`].
    pub fn register<T: ShapedComponent>(&mut self) -> Result<(), PersistError> {
        self.registry.register::<T>(&self.datatypes)
    }

    /// Register a shape with an explicit constructor.
    ///
    /// # Errors
    ///
    /// See [`ComponentTypeRegistry::register_shape`].
    pub fn register_shape(&mut self, shape: Shape, construct: Constructor) -> Result<(), PersistError> {
        self.registry.register_shape(shape, construct, &self.datatypes)
    }

    /// Make `connection` the active database, returning the previous one.
    ///
    /// Any load session is dropped and tables are set up again on next use.
    /// Ids deleted through the previous connection are forgotten.
    /// Must not be called while a save is running.
    pub fn attach(&mut self, connection: Connection) -> Option<Connection> {
        self.loader.reset();
        self.retired.clear();
        self.tables_ready = None;
        self.connection.attach(connection)
    }

    /// Remove the active database.
    pub fn detach(&mut self) -> Option<Connection> {
        self.loader.reset();
        self.retired.clear();
        self.tables_ready = None;
        self.connection.detach()
    }

    /// Open the configured database file and attach it.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Storage`] if the file cannot be opened.
    pub fn open(&mut self) -> Result<(), PersistError> {
        let connection = open_database(&self.config.database_path)?;
        self.attach(connection);
        Ok(())
    }

    /// Freeze the registry and create any missing tables.
    ///
    /// Runs implicitly before loading, saving and importing; runs the DDL
    /// once per attached connection.
    ///
    /// # Errors
    ///
    /// - [`PersistError::NoConnection`] if no database is attached.
    /// - [`PersistError::Storage`] if a table cannot be created.
    pub fn setup(&mut self) -> Result<(), PersistError> {
        let conn = self.connection.get()?;
        self.registry.freeze();
        let generation = self.connection.generation();
        if self.tables_ready == Some(generation) {
            return Ok(());
        }
        create_tables(conn, &self.registry)?;
        self.tables_ready = Some(generation);
        Ok(())
    }

    /// Start a load session, returning the number of stored entities.
    ///
    /// # Errors
    ///
    /// - [`PersistError::NoConnection`] if no database is attached.
    /// - [`PersistError::Storage`] if the ids cannot be read; the session is
    ///   then left not started.
    pub fn begin_loading(&mut self) -> Result<usize, PersistError> {
        self.loader.reset();
        self.setup()?;
        let conn = self.connection.get()?;
        self.loader.begin(conn)
    }

    /// Load the next stored entity into `entity`, which must be blank.
    ///
    /// Every registered shape is tried in registration order. A shape with
    /// no row is simply not attached. A row that cannot be turned into a
    /// component is logged and skipped. A storage fault follows the
    /// configured [`FaultPolicy`].
    ///
    /// # Errors
    ///
    /// - [`PersistError::LoadNotStarted`] before [`EntityPersistence::begin_loading`].
    /// - [`PersistError::AlreadyIdentified`] if `entity` already has an id.
    /// - [`PersistError::LoadExhausted`] once every stored entity was loaded.
    /// - [`PersistError::NoConnection`] if the database was detached.
    /// - [`PersistError::Storage`] on a fault under [`FaultPolicy::Abort`].
    pub fn load_entity<E: PersistentEntity + ?Sized>(
        &mut self,
        entity: &mut E,
    ) -> Result<EntityId, PersistError> {
        if self.loader.phase() == LoadPhase::NotStarted {
            return Err(PersistError::LoadNotStarted);
        }
        let current = entity.entity_id();
        if current.is_saved() {
            return Err(PersistError::AlreadyIdentified(current));
        }
        self.loader.ensure_available()?;
        let conn = self.connection.get()?;

        let id = self.loader.next_id()?;
        entity.assign_id(id);

        let marshaller = Marshaller::new(conn, &self.datatypes);
        let mut attached = 0;
        for entry in self.registry.iter() {
            let loaded = settle(
                self.config.fault_policy,
                id,
                entry.name(),
                marshaller.try_load(id, entry),
            )?;
            if let Some(component) = loaded {
                entity.attach_component(component);
                attached += 1;
            }
        }
        debug!(
            entity = %id,
            components = attached,
            remaining = self.loader.remaining(),
            "entity loaded"
        );
        Ok(id)
    }

    /// Replace the entity's instance of one shape with the stored one.
    ///
    /// Returns `true` if a stored component was attached. The current
    /// instance is removed either way.
    ///
    /// # Errors
    ///
    /// - [`PersistError::NotPersisted`] if `entity` has never been saved.
    /// - [`PersistError::UnknownShape`] if `shape` is not registered.
    /// - [`PersistError::NoConnection`] if no database is attached.
    /// - [`PersistError::Storage`] on a fault under [`FaultPolicy::Abort`].
    pub fn reload_component<E: PersistentEntity + ?Sized>(
        &mut self,
        entity: &mut E,
        shape: &str,
    ) -> Result<bool, PersistError> {
        let id = entity.entity_id();
        if !id.is_saved() {
            return Err(PersistError::NotPersisted);
        }
        self.setup()?;
        let conn = self.connection.get()?;
        let Some(entry) = self.registry.get(shape) else {
            return Err(PersistError::UnknownShape(shape.to_string()));
        };

        entity.remove_component(entry.name());
        let marshaller = Marshaller::new(conn, &self.datatypes);
        let loaded = settle(
            self.config.fault_policy,
            id,
            entry.name(),
            marshaller.try_load(id, entry),
        )?;
        match loaded {
            Some(component) => {
                debug!(entity = %id, shape = entry.name(), "component reloaded");
                entity.attach_component(component);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Load one stored component without touching any entity.
    ///
    /// Unlike [`EntityPersistence::load_entity`], every failure is returned.
    ///
    /// # Errors
    ///
    /// - [`PersistError::UnknownShape`] if `shape` is not registered.
    /// - Any error from [`Marshaller::try_load`].
    pub fn try_load(
        &self,
        id: EntityId,
        shape: &str,
    ) -> Result<Option<Box<dyn Component>>, PersistError> {
        let entry = self
            .registry
            .get(shape)
            .ok_or_else(|| PersistError::UnknownShape(shape.to_string()))?;
        let conn = self.connection.get()?;
        Marshaller::new(conn, &self.datatypes).try_load(id, entry)
    }

    /// Queue a recycled entity for deletion at the next save.
    ///
    /// Unsaved entities have nothing stored and are ignored.
    pub fn recycle(&mut self, id: EntityId) {
        if !id.is_saved() {
            debug!("recycled entity was never saved; nothing to delete");
            return;
        }
        self.deathrow.enqueue(id);
    }

    /// Save the live world.
    ///
    /// Queued deletions run first, then every entity in `entities` is
    /// written, all in one transaction. Entities inserted for the first time
    /// receive their ids once the transaction commits. Individual component
    /// failures are logged and counted in the report.
    ///
    /// A deleted id stays deleted: an entity still carrying it is skipped by
    /// this save and every later one on the same connection.
    ///
    /// # Errors
    ///
    /// - [`PersistError::NoConnection`] if no database is attached.
    /// - [`PersistError::Storage`] if the transaction cannot start or commit.
    ///   Nothing is written in that case and queued deletions are kept.
    pub fn save<'e, E, I>(&mut self, entities: I) -> Result<SaveReport, PersistError>
    where
        E: PersistentEntity + ?Sized + 'e,
        I: IntoIterator<Item = &'e mut E>,
    {
        self.setup()?;
        let conn = self.connection.get_mut()?;
        let tx = conn
            .transaction()
            .map_err(PersistError::storage("starting save transaction"))?;

        let executed = self
            .deathrow
            .drain_and_delete(&tx, &self.datatypes, &self.registry);
        let mut report = SaveReport {
            deleted: executed.entities_deleted,
            ..SaveReport::default()
        };

        let mut assigned = Vec::new();
        {
            let saver =
                EntitySaver::new(&tx, &self.datatypes, &self.registry).retiring(&self.retired);
            for entity in entities {
                if let Some(id) = saver.store(&*entity, &executed, &mut report) {
                    assigned.push((entity, id));
                }
            }
        }

        if let Err(err) = tx.commit() {
            error!(error = %err, "save commit failed; nothing was written");
            self.deathrow.requeue(executed.ids);
            return Err(PersistError::storage("committing save")(err));
        }
        self.retired.extend(executed.ids);
        for (entity, id) in assigned {
            entity.assign_id(id);
        }

        info!(
            deleted = report.deleted,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.components_failed,
            "world saved"
        );
        Ok(report)
    }

    /// Replace the stored world with the one in the file at `path`.
    ///
    /// Any load session is dropped. Queued and past deletions refer to the
    /// replaced world and are discarded.
    ///
    /// # Errors
    ///
    /// See [`import::import_world`]; also [`PersistError::NoConnection`].
    pub fn import_world(&mut self, path: impl AsRef<Path>) -> Result<ImportReport, PersistError> {
        let path = path.as_ref();
        self.setup()?;
        self.loader.reset();
        let conn = self.connection.get_mut()?;
        let report = import::import_world(conn, path, &self.config.import_alias, &self.registry)?;

        if !self.deathrow.is_empty() {
            warn!(
                discarded = self.deathrow.len(),
                "discarding queued deletions for the replaced world"
            );
            self.deathrow = Deathrow::new();
        }
        self.retired.clear();
        self.tables_ready = None;
        self.setup()?;
        Ok(report)
    }

    #[must_use]
    pub fn load_phase(&self) -> LoadPhase {
        self.loader.phase()
    }

    /// Ids queued for deletion at the next save.
    #[must_use]
    pub fn pending_deletions(&self) -> &[EntityId] {
        self.deathrow.pending()
    }

    #[must_use]
    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentTypeRegistry {
        &self.registry
    }

    #[must_use]
    pub fn datatypes(&self) -> &DatatypeRegistry {
        &self.datatypes
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_attached()
    }

    /// The active database handle.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::NoConnection`] if none is attached.
    pub fn connection(&self) -> Result<&Connection, PersistError> {
        self.connection.get()
    }
}

impl RecycleObserver for EntityPersistence {
    fn recycled(&mut self, id: EntityId) {
        self.recycle(id);
    }
}

/// Decide what one component load result means for the entity load.
fn settle(
    policy: FaultPolicy,
    id: EntityId,
    shape: &str,
    result: Result<Option<Box<dyn Component>>, PersistError>,
) -> Result<Option<Box<dyn Component>>, PersistError> {
    match result {
        Ok(loaded) => Ok(loaded),
        Err(err) if err.is_storage_fault() => match policy {
            FaultPolicy::Degrade => {
                warn!(entity = %id, shape, error = %err, "storage fault; treating component as absent");
                Ok(None)
            }
            FaultPolicy::Abort => Err(err),
        },
        Err(err) => {
            error!(entity = %id, shape, error = %err, "stored component could not be rebuilt");
            Ok(None)
        }
    }
}
