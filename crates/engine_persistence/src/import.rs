//! Cross-database import.
//!
//! Replaces the active world with the contents of another world file: the
//! file is attached under an alias, then the `Entity` table and each
//! registered shape's table are dropped and rebuilt from the attached copy.
//! Tables the source lacks come back empty. Only entities with a positive id
//! are copied, and only component rows whose entity was copied. The alias is
//! detached whether or not the copy succeeds.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::PersistError;
use crate::registry::ComponentTypeRegistry;
use crate::schema::{CREATE_ENTITY_TABLE, ENTITY_ID_COLUMN, ENTITY_TABLE, quoted};

/// Outcome of an import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Entity rows copied.
    pub entities: usize,
    /// Shape tables copied from the source.
    pub tables_copied: usize,
    /// Shape tables the source did not have, recreated empty.
    pub tables_missing: usize,
}

/// Replace the world in `conn` with the world stored at `path`.
///
/// # Errors
///
/// - [`PersistError::WorldFileNotFound`] if `path` does not exist.
/// - [`PersistError::InvalidIdentifier`] if `alias` is not a plain identifier
///   or names the main schema.
/// - [`PersistError::Storage`] if attaching or copying fails. The copy runs
///   in one transaction, so a failure leaves the active world unchanged.
pub fn import_world(
    conn: &mut Connection,
    path: &Path,
    alias: &str,
    registry: &ComponentTypeRegistry,
) -> Result<ImportReport, PersistError> {
    if !path.is_file() {
        return Err(PersistError::WorldFileNotFound(path.to_path_buf()));
    }
    if alias.eq_ignore_ascii_case("main") || alias.eq_ignore_ascii_case("temp") {
        return Err(PersistError::InvalidIdentifier(alias.to_string()));
    }
    let schema = quoted(alias)?;

    let source = path.to_string_lossy().into_owned();
    conn.execute(&format!("ATTACH DATABASE ?1 AS {schema}"), [source.as_str()])
        .map_err(PersistError::storage(format!("attaching {}", path.display())))?;
    debug!(path = %path.display(), alias, "world file attached");

    let copied = copy_world(conn, &schema, registry);

    if let Err(err) = conn.execute(&format!("DETACH DATABASE {schema}"), []) {
        warn!(alias, error = %err, "detaching imported world failed");
    }

    let report = copied?;
    info!(
        path = %path.display(),
        entities = report.entities,
        tables_copied = report.tables_copied,
        tables_missing = report.tables_missing,
        "world imported"
    );
    Ok(report)
}

fn copy_world(
    conn: &mut Connection,
    schema: &str,
    registry: &ComponentTypeRegistry,
) -> Result<ImportReport, PersistError> {
    let tx = conn
        .transaction()
        .map_err(PersistError::storage("starting import transaction"))?;
    let mut report = ImportReport::default();

    // The entity table is rebuilt from its canonical definition so the
    // source's ids are kept and new ids continue after them.
    tx.execute_batch(&format!("DROP TABLE IF EXISTS main.\"{ENTITY_TABLE}\""))
        .map_err(PersistError::storage("dropping Entity table"))?;
    tx.execute_batch(CREATE_ENTITY_TABLE)
        .map_err(PersistError::storage("creating Entity table"))?;
    if source_has_table(&tx, schema, ENTITY_TABLE)? {
        report.entities = tx
            .execute(
                &format!(
                    "INSERT INTO main.\"{ENTITY_TABLE}\" (\"{ENTITY_ID_COLUMN}\") \
                     SELECT \"{ENTITY_ID_COLUMN}\" FROM {schema}.\"{ENTITY_TABLE}\" \
                     WHERE \"{ENTITY_ID_COLUMN}\" > 0"
                ),
                [],
            )
            .map_err(PersistError::storage("copying Entity rows"))?;
    } else {
        warn!("imported world has no Entity table; its components are not copied");
    }

    for entry in registry.iter() {
        let table = &entry.sql.table;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS main.{table}"))
            .map_err(PersistError::storage(format!("dropping {} table", entry.name())))?;
        if source_has_table(&tx, schema, entry.name())? {
            // Rows without a copied entity would be unreachable.
            tx.execute_batch(&format!(
                "CREATE TABLE main.{table} AS SELECT * FROM {schema}.{table} \
                 WHERE \"{ENTITY_ID_COLUMN}\" IN \
                 (SELECT \"{ENTITY_ID_COLUMN}\" FROM main.\"{ENTITY_TABLE}\")"
            ))
            .map_err(PersistError::storage(format!("copying {} table", entry.name())))?;
            report.tables_copied += 1;
        } else {
            debug!(shape = entry.name(), "imported world lacks table; recreating empty");
            tx.execute_batch(&entry.sql.create)
                .map_err(PersistError::storage(format!("creating {} table", entry.name())))?;
            report.tables_missing += 1;
        }
    }

    tx.commit()
        .map_err(PersistError::storage("committing import"))?;
    Ok(report)
}

fn source_has_table(conn: &Connection, schema: &str, table: &str) -> Result<bool, PersistError> {
    let count: i64 = conn
        .query_row(
            &format!(
                "SELECT COUNT(*) FROM {schema}.sqlite_master \
                 WHERE type = 'table' AND name = ?1 COLLATE NOCASE"
            ),
            [table],
            |row| row.get(0),
        )
        .map_err(PersistError::storage(format!("inspecting imported {table} table")))?;
    Ok(count > 0)
}
