//! # engine_persistence
//!
//! Relational persistence for the entities of a game world.
//!
//! Each registered component shape maps to one table keyed by entity id, and
//! entities live in the `Entity` table. [`EntityPersistence`] sequences the
//! pieces:
//!
//! - [`datatype`] — native ↔ stored value mappings and coercions.
//! - [`registry`] — the ordered set of persisted shapes and their constructors.
//! - [`schema`] — identifiers, DDL and statement text derived from shapes.
//! - [`connection`] — the active database handle.
//! - [`loader`] — load sessions handing out stored ids one at a time.
//! - [`marshal`] — one shape's row ↔ one component instance.
//! - [`deathrow`] — recycled ids waiting for the next save.
//! - [`saver`] — writing live entities.
//! - [`import`] — replacing the world with another world file.
//! - [`container`] — the traits the entity container implements.
//! - [`config`] / [`error`] — configuration and the error taxonomy.

pub mod config;
pub mod connection;
pub mod container;
pub mod datatype;
pub mod deathrow;
pub mod error;
pub mod import;
pub mod loader;
pub mod marshal;
pub mod persistence;
pub mod registry;
pub mod saver;
pub mod schema;

pub use config::{FaultPolicy, PersistenceConfig};
pub use container::{PersistentEntity, RecycleObserver};
pub use datatype::DatatypeRegistry;
pub use error::{CoerceError, PersistError};
pub use import::ImportReport;
pub use loader::LoadPhase;
pub use persistence::EntityPersistence;
pub use registry::{ComponentTypeRegistry, Constructor};
pub use saver::SaveReport;
