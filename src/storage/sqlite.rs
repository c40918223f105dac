//! SQLite storage backend for workspace snapshots

use super::traits::{OpenStore, SnapshotStore, StorageError, StorageResult};
use crate::workspace::{Workspace, WorkspaceId};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed snapshot store
///
/// One row per workspace holding the whole snapshot as JSON. Thread-safe
/// via an internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS workspaces (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                snapshot_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_workspaces_name
                ON workspaces(name);

            -- Readers are not blocked while a snapshot is being written
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SnapshotStore for SqliteStore {
    fn save_workspace(&self, workspace: &Workspace) -> StorageResult<()> {
        let snapshot_json = serde_json::to_string(workspace)?;
        let updated_at = workspace.metadata.updated_at.unwrap_or_else(Utc::now).to_rfc3339();

        self.conn()?.execute(
            r#"
            INSERT INTO workspaces (id, name, snapshot_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                snapshot_json = excluded.snapshot_json,
                updated_at = excluded.updated_at
            "#,
            params![workspace.id.as_str(), workspace.name, snapshot_json, updated_at],
        )?;
        Ok(())
    }

    fn load_workspace(&self, id: &WorkspaceId) -> StorageResult<Option<Workspace>> {
        let snapshot_json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT snapshot_json FROM workspaces WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match snapshot_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn delete_workspace(&self, id: &WorkspaceId) -> StorageResult<bool> {
        let rows = self
            .conn()?
            .execute("DELETE FROM workspaces WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    fn list_workspaces(&self) -> StorageResult<Vec<WorkspaceId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM workspaces ORDER BY name, id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(WorkspaceId::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ObjectGraph, ObjectNode};
    use crate::workspace::{Command, Page, PageId};

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn create_test_workspace(name: &str) -> Workspace {
        let graph = ObjectGraph::with_root(ObjectNode::new("World", "setting").with_id("w"));
        Workspace::new(name)
            .apply(Command::AddPage {
                page: Page::object("World", graph).with_id("obj"),
            })
            .unwrap()
            .into_workspace()
            .unwrap()
    }

    #[test]
    fn test_save_and_load_workspace() {
        let store = create_test_store();
        let ws = create_test_workspace("novel");
        store.save_workspace(&ws).unwrap();

        let loaded = store.load_workspace(&ws.id).unwrap().unwrap();
        assert_eq!(loaded, ws);
        assert!(loaded.object_graph(&PageId::from("obj")).is_some());
    }

    #[test]
    fn test_load_missing_workspace() {
        let store = create_test_store();
        assert!(store.load_workspace(&WorkspaceId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_snapshot() {
        let store = create_test_store();
        let ws = create_test_workspace("novel");
        store.save_workspace(&ws).unwrap();

        let mut renamed = ws.clone();
        renamed.name = "renamed".into();
        store.save_workspace(&renamed).unwrap();

        assert_eq!(store.list_workspaces().unwrap().len(), 1);
        assert_eq!(store.load_workspace(&ws.id).unwrap().unwrap().name, "renamed");
    }

    #[test]
    fn test_list_workspaces_ordered_by_name() {
        let store = create_test_store();
        let b = create_test_workspace("beta");
        let a = create_test_workspace("alpha");
        store.save_workspace(&b).unwrap();
        store.save_workspace(&a).unwrap();

        assert_eq!(store.list_workspaces().unwrap(), vec![a.id, b.id]);
    }

    #[test]
    fn test_delete_workspace() {
        let store = create_test_store();
        let ws = create_test_workspace("novel");
        store.save_workspace(&ws).unwrap();

        assert!(store.delete_workspace(&ws.id).unwrap());
        assert!(!store.delete_workspace(&ws.id).unwrap());
        assert!(store.load_workspace(&ws.id).unwrap().is_none());
    }

    #[test]
    fn test_wal_mode_enabled_at_connection() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test-wal.db");
        let store = SqliteStore::open(&db_path).unwrap();

        let journal_mode: String = store
            .conn
            .lock()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();

        assert_eq!(journal_mode, "wal");
    }

    #[test]
    fn test_reopen_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("arbor.db");
        let ws = create_test_workspace("novel");
        {
            let store = SqliteStore::open(&db_path).unwrap();
            store.save_workspace(&ws).unwrap();
        }
        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.load_workspace(&ws.id).unwrap(), Some(ws));
    }
}
