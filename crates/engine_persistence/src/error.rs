//! Persistence-layer error types.

use std::path::PathBuf;

use engine_component::{ConstructError, EntityId, FieldType};

/// A value read from storage could not be coerced to its native type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot coerce stored {found} to {expected}")]
pub struct CoerceError {
    /// The native type the field declares.
    pub expected: FieldType,
    /// Description of the stored value.
    pub found: String,
}

impl CoerceError {
    pub(crate) fn new(expected: FieldType, found: impl Into<String>) -> Self {
        Self {
            expected,
            found: found.into(),
        }
    }
}

/// Errors that can occur while persisting or restoring a world.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// An operation needed a database handle before one was attached.
    #[error("no database connection attached")]
    NoConnection,

    /// A storage call failed (connectivity, query or constraint failure).
    #[error("storage error while {context}: {source}")]
    Storage {
        /// What the engine was doing.
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A field's native type has no entry in the datatype registry.
    #[error("shape '{shape}' field '{field}' has unsupported type {ty}")]
    UnsupportedFieldType {
        shape: String,
        field: String,
        ty: FieldType,
    },

    /// A stored value did not coerce to the field's native type.
    #[error("shape '{shape}' field '{field}': {source}")]
    Coercion {
        shape: String,
        field: String,
        #[source]
        source: CoerceError,
    },

    /// No registered shape (and therefore no constructor) has this name.
    #[error("no constructor registered for shape '{0}'")]
    NoConstructor(String),

    /// Values did not match a shape's field list.
    #[error("argument mismatch for shape '{shape}': {detail}")]
    ArgumentMismatch { shape: String, detail: String },

    /// `load_entity` was handed an entity that already has an identifier.
    #[error("{0} is already identified and cannot be loaded")]
    AlreadyIdentified(EntityId),

    /// Every entity of the current load session has been handed out.
    #[error("load session exhausted")]
    LoadExhausted,

    /// `load_entity` was called before `begin_loading`.
    #[error("load session not started; call begin_loading first")]
    LoadNotStarted,

    /// An operation needed a persisted entity but got an unsaved one.
    #[error("entity has not been persisted yet")]
    NotPersisted,

    /// A shape was registered after loading or saving began.
    #[error("cannot register shape '{0}': registry is frozen")]
    RegistryFrozen(String),

    /// A shape with the same (case-insensitive) name is already registered.
    #[error("shape '{0}' is already registered")]
    DuplicateShape(String),

    /// A shape, field or alias name is not a plain SQL identifier or is reserved.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A component's shape is not registered with the engine.
    #[error("shape '{0}' is not registered")]
    UnknownShape(String),

    /// The world file named for import does not exist.
    #[error("world file not found: {}", .0.display())]
    WorldFileNotFound(PathBuf),
}

impl PersistError {
    /// Wrap a storage error with a description of the failed step.
    pub(crate) fn storage(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let context = context.into();
        move |source| PersistError::Storage { context, source }
    }

    /// Returns `true` for storage faults, as opposed to schema or protocol errors.
    #[must_use]
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, PersistError::Storage { .. })
    }

    /// Returns `true` for errors caused by calling operations out of sequence.
    #[must_use]
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            PersistError::AlreadyIdentified(_)
                | PersistError::LoadExhausted
                | PersistError::LoadNotStarted
                | PersistError::NotPersisted
                | PersistError::RegistryFrozen(_)
        )
    }
}

impl From<ConstructError> for PersistError {
    fn from(err: ConstructError) -> Self {
        match err {
            ConstructError::NoConstructor(shape) => PersistError::NoConstructor(shape),
            ConstructError::ArgumentMismatch { shape, detail } => {
                PersistError::ArgumentMismatch { shape, detail }
            }
        }
    }
}
