//! Table layout and statement text derived from component shapes.
//!
//! Every shape gets one table named after it. The first column is
//! `entityId`, the remaining columns follow the shape's fields in declared
//! order. Entities themselves live in the `Entity` table.
//!
//! Names are validated once at registration and always emitted quoted;
//! values are always bound as parameters.

use engine_component::Shape;
use rusqlite::Connection;
use tracing::debug;

use crate::datatype::DatatypeRegistry;
use crate::error::PersistError;
use crate::registry::ComponentTypeRegistry;

/// Name of the entity table.
pub const ENTITY_TABLE: &str = "Entity";

/// Name of the identifier column shared by every table.
pub const ENTITY_ID_COLUMN: &str = "entityId";

/// DDL for the entity table.
pub const CREATE_ENTITY_TABLE: &str = "CREATE TABLE IF NOT EXISTS \"Entity\" (\
     \"entityId\" INTEGER PRIMARY KEY AUTOINCREMENT, \
     \"revision\" INTEGER NOT NULL DEFAULT 0)";

pub(crate) const SELECT_ENTITY_IDS: &str =
    "SELECT \"entityId\" FROM \"Entity\" ORDER BY \"entityId\"";
pub(crate) const INSERT_ENTITY: &str = "INSERT INTO \"Entity\" DEFAULT VALUES";
pub(crate) const INSERT_ENTITY_WITH_ID: &str =
    "INSERT INTO \"Entity\" (\"entityId\", \"revision\") VALUES (?1, 1)";
pub(crate) const TOUCH_ENTITY: &str =
    "UPDATE \"Entity\" SET \"revision\" = \"revision\" + 1 WHERE \"entityId\" = ?1";
pub(crate) const DELETE_ENTITY: &str = "DELETE FROM \"Entity\" WHERE \"entityId\" = ?1";

/// Returns `true` for `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate `name` as an identifier, returning it quoted.
///
/// # Errors
///
/// Returns [`PersistError::InvalidIdentifier`] if `name` is not a plain identifier.
pub fn quoted(name: &str) -> Result<String, PersistError> {
    if is_identifier(name) {
        Ok(format!("\"{name}\""))
    } else {
        Err(PersistError::InvalidIdentifier(name.to_string()))
    }
}

/// Statement text for one shape's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeSql {
    /// Quoted table name.
    pub table: String,
    pub create: String,
    pub count: String,
    pub select: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

impl ShapeSql {
    /// Derive the statements for `shape`.
    ///
    /// # Errors
    ///
    /// - [`PersistError::InvalidIdentifier`] for a bad or reserved shape/field name.
    /// - [`PersistError::UnsupportedFieldType`] if a field type has no
    ///   column type in `datatypes`.
    pub fn derive(shape: &Shape, datatypes: &DatatypeRegistry) -> Result<Self, PersistError> {
        if shape.name.eq_ignore_ascii_case(ENTITY_TABLE) {
            return Err(PersistError::InvalidIdentifier(shape.name.clone()));
        }
        let table = quoted(&shape.name)?;

        let mut columns = Vec::with_capacity(shape.fields.len());
        let mut column_defs = vec![format!("\"{ENTITY_ID_COLUMN}\" INTEGER PRIMARY KEY")];
        for (i, field) in shape.fields.iter().enumerate() {
            if field.name.eq_ignore_ascii_case(ENTITY_ID_COLUMN)
                || shape.fields[..i]
                    .iter()
                    .any(|f| f.name.eq_ignore_ascii_case(&field.name))
            {
                return Err(PersistError::InvalidIdentifier(field.name.clone()));
            }
            let column = quoted(&field.name)?;
            let ty = datatypes.column_type_for(field.ty).ok_or_else(|| {
                PersistError::UnsupportedFieldType {
                    shape: shape.name.clone(),
                    field: field.name.clone(),
                    ty: field.ty,
                }
            })?;
            column_defs.push(format!("{column} {ty}"));
            columns.push(column);
        }

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            column_defs.join(", ")
        );
        let count = format!("SELECT COUNT(*) FROM {table} WHERE \"{ENTITY_ID_COLUMN}\" = ?1");

        let select = if columns.is_empty() {
            format!("SELECT \"{ENTITY_ID_COLUMN}\" FROM {table} WHERE \"{ENTITY_ID_COLUMN}\" = ?1")
        } else {
            format!(
                "SELECT {} FROM {table} WHERE \"{ENTITY_ID_COLUMN}\" = ?1",
                columns.join(", ")
            )
        };

        let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{i}")).collect();
        let mut insert_columns = vec![format!("\"{ENTITY_ID_COLUMN}\"")];
        insert_columns.extend(columns.iter().cloned());
        let insert = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            insert_columns.join(", "),
            placeholders.join(", ")
        );

        // A tag shape has nothing to set; the no-op assignment still reports
        // whether the row exists.
        let assignments = if columns.is_empty() {
            format!("\"{ENTITY_ID_COLUMN}\" = \"{ENTITY_ID_COLUMN}\"")
        } else {
            columns
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{c} = ?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let update = format!("UPDATE {table} SET {assignments} WHERE \"{ENTITY_ID_COLUMN}\" = ?1");
        let delete = format!("DELETE FROM {table} WHERE \"{ENTITY_ID_COLUMN}\" = ?1");

        Ok(Self {
            table,
            create,
            count,
            select,
            insert,
            update,
            delete,
        })
    }
}

/// Create the entity table and every registered shape's table if missing.
///
/// # Errors
///
/// Returns [`PersistError::Storage`] if a statement fails.
pub fn create_tables(conn: &Connection, registry: &ComponentTypeRegistry) -> Result<(), PersistError> {
    conn.execute_batch(CREATE_ENTITY_TABLE)
        .map_err(PersistError::storage("creating Entity table"))?;
    for entry in registry.iter() {
        conn.execute_batch(&entry.sql.create)
            .map_err(PersistError::storage(format!("creating {} table", entry.name())))?;
    }
    debug!(shapes = registry.len(), "tables ready");
    Ok(())
}
