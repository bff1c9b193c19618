//! Persistence configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "world.db";

/// The environment variable used to override the database path.
pub const DATABASE_PATH_ENV: &str = "ENGINE_DB_PATH";

/// Alias under which an imported world file is attached.
pub const DEFAULT_IMPORT_ALIAS: &str = "world";

/// What a load does when storage faults while reading one component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Log the fault and treat the component as absent.
    #[default]
    Degrade,
    /// Abort the entity load with the storage error.
    Abort,
}

/// Configuration for an [`EntityPersistence`](crate::EntityPersistence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Database file opened by [`EntityPersistence::open`](crate::EntityPersistence::open).
    pub database_path: PathBuf,
    /// Schema alias used while importing another world file.
    pub import_alias: String,
    /// Reaction to storage faults during component loads.
    pub fault_policy: FaultPolicy,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            import_alias: DEFAULT_IMPORT_ALIAS.to_string(),
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl PersistenceConfig {
    /// Defaults, with the database path taken from `ENGINE_DB_PATH` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(DATABASE_PATH_ENV) {
            Ok(path) if !path.is_empty() => config.with_database_path(path),
            _ => config,
        }
    }

    /// Override the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Override the import alias.
    #[must_use]
    pub fn with_import_alias(mut self, alias: impl Into<String>) -> Self {
        self.import_alias = alias.into();
        self
    }

    /// Override the fault policy.
    #[must_use]
    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }
}
