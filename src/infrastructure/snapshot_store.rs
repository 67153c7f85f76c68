use crate::domain::session::SessionDraft;
use crate::infrastructure::error::CoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistence seam for the in-progress session draft. A single slot: saving
/// replaces whatever was there, clearing is idempotent.
pub trait SessionSnapshotStore: Send + Sync {
    fn save(&self, draft: &SessionDraft) -> Result<(), CoreError>;
    fn load(&self) -> Result<Option<SessionDraft>, CoreError>;
    fn clear(&self) -> Result<(), CoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    db_path: PathBuf,
}

impl SqliteSnapshotStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, CoreError> {
        Connection::open(&self.db_path).map_err(CoreError::from)
    }
}

impl SessionSnapshotStore for SqliteSnapshotStore {
    fn save(&self, draft: &SessionDraft) -> Result<(), CoreError> {
        let mut stamped = draft.clone();
        stamped.saved_at = Some(Utc::now());
        let payload = serde_json::to_string(&stamped)?;

        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO session_snapshot (id, payload, saved_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               saved_at = excluded.saved_at",
            params![
                payload,
                stamped
                    .saved_at
                    .map(|instant| instant.to_rfc3339())
                    .unwrap_or_default()
            ],
        )?;
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionDraft>, CoreError> {
        let connection = self.connect()?;
        let row: Option<String> = connection
            .query_row(
                "SELECT payload FROM session_snapshot WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = row else {
            return Ok(None);
        };
        let draft: SessionDraft = serde_json::from_str(&payload)?;
        Ok(Some(draft))
    }

    fn clear(&self) -> Result<(), CoreError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM session_snapshot WHERE id = 1", [])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    slot: Mutex<Option<SessionDraft>>,
}

impl SessionSnapshotStore for InMemorySnapshotStore {
    fn save(&self, draft: &SessionDraft) -> Result<(), CoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|error| CoreError::Validation(format!("snapshot lock poisoned: {error}")))?;
        let mut stamped = draft.clone();
        stamped.saved_at = Some(Utc::now());
        *slot = Some(stamped);
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionDraft>, CoreError> {
        let slot = self
            .slot
            .lock()
            .map_err(|error| CoreError::Validation(format!("snapshot lock poisoned: {error}")))?;
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<(), CoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|error| CoreError::Validation(format!("snapshot lock poisoned: {error}")))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ActivityKind;
    use crate::infrastructure::storage::initialize_database;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "nova-snapshot-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            std::fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    fn temp_db() -> (TempWorkspace, SqliteSnapshotStore) {
        let workspace = TempWorkspace::new();
        let db_path = workspace.path.join("nova.sqlite");
        initialize_database(&db_path).expect("initialize database");
        (workspace, SqliteSnapshotStore::new(db_path))
    }

    #[test]
    fn save_load_roundtrip_stamps_saved_at() {
        let (_workspace, store) = temp_db();
        let draft = SessionDraft::begin(ActivityKind::Work);
        store.save(&draft).expect("save");

        let loaded = store.load().expect("load").expect("snapshot present");
        assert!(loaded.saved_at.is_some());
        assert_eq!(loaded.phase, draft.phase);
        assert_eq!(loaded.activity_kind, draft.activity_kind);
    }

    #[test]
    fn save_replaces_the_single_slot() {
        let (_workspace, store) = temp_db();
        store
            .save(&SessionDraft::begin(ActivityKind::Work))
            .expect("first save");
        store
            .save(&SessionDraft::begin(ActivityKind::Break))
            .expect("second save");

        let loaded = store.load().expect("load").expect("snapshot present");
        assert_eq!(loaded.activity_kind, ActivityKind::Break);
    }

    #[test]
    fn clear_is_idempotent() {
        let (_workspace, store) = temp_db();
        store
            .save(&SessionDraft::begin(ActivityKind::Work))
            .expect("save");
        store.clear().expect("first clear");
        store.clear().expect("second clear");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn corrupt_payload_surfaces_as_error() {
        let (workspace, store) = temp_db();
        let connection =
            Connection::open(workspace.path.join("nova.sqlite")).expect("open database");
        connection
            .execute(
                "INSERT INTO session_snapshot (id, payload, saved_at) VALUES (1, 'not json', '')",
                [],
            )
            .expect("insert corrupt payload");

        assert!(store.load().is_err());
    }

    #[test]
    fn in_memory_store_mirrors_sqlite_semantics() {
        let store = InMemorySnapshotStore::default();
        assert!(store.load().expect("load").is_none());
        store
            .save(&SessionDraft::begin(ActivityKind::Work))
            .expect("save");
        assert!(store.load().expect("load").is_some());
        store.clear().expect("clear");
        store.clear().expect("clear again");
        assert!(store.load().expect("load").is_none());
    }
}
