//! Database connection lifecycle.
//!
//! The engine holds at most one live [`Connection`]. It is attached from
//! outside (on startup and on every profile switch); every storage operation
//! fails with [`PersistError::NoConnection`] until one is attached.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::PersistError;

/// Open (creating if needed) the database file at `path`.
///
/// # Errors
///
/// Returns [`PersistError::Storage`] if the file cannot be opened.
pub fn open_database(path: &Path) -> Result<Connection, PersistError> {
    info!(path = %path.display(), "opening world database");
    Connection::open(path).map_err(PersistError::storage(format!(
        "opening {}",
        path.display()
    )))
}

/// Holder for the active database handle.
#[derive(Debug, Default)]
pub struct ConnectionSlot {
    connection: Option<Connection>,
    // Bumped on every attach so dependants can tell the handle changed.
    generation: u64,
}

impl ConnectionSlot {
    /// An empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active handle, returning the previous one.
    pub fn attach(&mut self, connection: Connection) -> Option<Connection> {
        self.generation += 1;
        info!(generation = self.generation, "database connection attached");
        self.connection.replace(connection)
    }

    /// Remove and return the active handle.
    pub fn detach(&mut self) -> Option<Connection> {
        let previous = self.connection.take();
        if previous.is_some() {
            info!("database connection detached");
        }
        previous
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.connection.is_some()
    }

    /// Number of attaches so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The active handle.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::NoConnection`] if none is attached.
    pub fn get(&self) -> Result<&Connection, PersistError> {
        self.connection.as_ref().ok_or(PersistError::NoConnection)
    }

    /// The active handle, mutably (needed to open transactions).
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::NoConnection`] if none is attached.
    pub fn get_mut(&mut self) -> Result<&mut Connection, PersistError> {
        self.connection.as_mut().ok_or(PersistError::NoConnection)
    }
}
