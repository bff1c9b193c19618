//! Entity load sequencer.
//!
//! A load session starts with [`LoadSequencer::begin`], which reads every
//! entity id from storage, and then hands the ids out one at a time. The
//! cursor only moves forward, so no id is handed out twice in one session.
//!
//! ```text
//! NotStarted ──begin──▶ Populated ──next_id──▶ Loading ──…──▶ Exhausted
//! ```

use engine_component::EntityId;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::PersistError;
use crate::schema::SELECT_ENTITY_IDS;

/// Where a load session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// No ids have been read.
    NotStarted,
    /// Ids are read and none handed out yet.
    Populated,
    /// Some but not all ids handed out.
    Loading,
    /// Every id has been handed out.
    Exhausted,
}

#[derive(Debug)]
struct LoadCursor {
    ids: Vec<EntityId>,
    next: usize,
}

/// Hands out the stored entity ids of one load session.
#[derive(Debug, Default)]
pub struct LoadSequencer {
    cursor: Option<LoadCursor>,
}

impl LoadSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all entity ids and start a fresh session. Returns the count.
    ///
    /// On failure the sequencer is left in [`LoadPhase::NotStarted`].
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Storage`] if the ids cannot be read.
    pub fn begin(&mut self, conn: &Connection) -> Result<usize, PersistError> {
        self.cursor = None;
        let ids = read_entity_ids(conn)?;
        let count = ids.len();
        info!(count, "load session started");
        self.cursor = Some(LoadCursor { ids, next: 0 });
        Ok(count)
    }

    /// Check that an id can be handed out, without consuming it.
    ///
    /// # Errors
    ///
    /// - [`PersistError::LoadNotStarted`] before [`LoadSequencer::begin`].
    /// - [`PersistError::LoadExhausted`] once every id was handed out.
    pub fn ensure_available(&self) -> Result<(), PersistError> {
        match self.phase() {
            LoadPhase::NotStarted => Err(PersistError::LoadNotStarted),
            LoadPhase::Exhausted => Err(PersistError::LoadExhausted),
            LoadPhase::Populated | LoadPhase::Loading => Ok(()),
        }
    }

    /// Hand out the next id.
    ///
    /// # Errors
    ///
    /// See [`LoadSequencer::ensure_available`].
    pub fn next_id(&mut self) -> Result<EntityId, PersistError> {
        let cursor = self.cursor.as_mut().ok_or(PersistError::LoadNotStarted)?;
        let id = *cursor.ids.get(cursor.next).ok_or(PersistError::LoadExhausted)?;
        cursor.next += 1;
        Ok(id)
    }

    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        match &self.cursor {
            None => LoadPhase::NotStarted,
            Some(c) if c.next >= c.ids.len() => LoadPhase::Exhausted,
            Some(c) if c.next == 0 => LoadPhase::Populated,
            Some(_) => LoadPhase::Loading,
        }
    }

    /// Ids not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cursor
            .as_ref()
            .map_or(0, |c| c.ids.len().saturating_sub(c.next))
    }

    /// Drop the session, returning to [`LoadPhase::NotStarted`].
    pub fn reset(&mut self) {
        self.cursor = None;
    }
}

fn read_entity_ids(conn: &Connection) -> Result<Vec<EntityId>, PersistError> {
    let mut stmt = conn
        .prepare(SELECT_ENTITY_IDS)
        .map_err(PersistError::storage("preparing entity id query"))?;
    let raw = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(PersistError::storage("reading entity ids"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(PersistError::storage("reading entity ids"))?;

    // Ids at or below zero would read back as unsaved and be inserted again.
    let mut ids = Vec::with_capacity(raw.len());
    for id in raw {
        if id <= 0 {
            warn!(id, "ignoring stored entity with a non-positive id");
            continue;
        }
        ids.push(EntityId::from_raw(id as u64));
    }
    Ok(ids)
}
