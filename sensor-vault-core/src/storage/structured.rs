//! Structured store: the indexed `data_items` table plus session tables.
//!
//! Every operation opens its own connection and drops it before returning;
//! no handle is held between calls.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decode_body, EntryScan};
use crate::models::envelope::{CloudStatus, EncryptedEnvelope, EntryBody, EntrySource, StoredEntry};
use crate::models::error::VaultError;
use crate::models::registry::default_display_name;
use crate::traits::record::Payload;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS data_items (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        data_json TEXT NOT NULL,
        file_path TEXT,
        cloud_status TEXT NOT NULL DEFAULT 'local'
    );
    CREATE INDEX IF NOT EXISTS idx_data_items_type ON data_items(type);
    CREATE INDEX IF NOT EXISTS idx_data_items_created_at ON data_items(created_at);

    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        started_at INTEGER NOT NULL,
        ended_at INTEGER
    );
    CREATE TABLE IF NOT EXISTS session_items (
        session_id TEXT NOT NULL,
        item_id TEXT NOT NULL,
        PRIMARY KEY (session_id, item_id)
    );
";

const ENTRY_COLUMNS: &str = "id, type, created_at, data_json, file_path, cloud_status";

/// A capture session grouping items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: String,
    pub name: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
}

pub struct StructuredStore {
    db_path: PathBuf,
}

impl StructuredStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, VaultError> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    /// Insert one row for `envelope`. A duplicate id is a constraint fault.
    pub fn insert(&self, envelope: &EncryptedEnvelope, file_path: Option<&Path>) -> Result<(), VaultError> {
        let data_json = serde_json::to_string(envelope)
            .map_err(|e| VaultError::Persistence(format!("failed to serialize envelope: {}", e)))?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO data_items (id, type, created_at, data_json, file_path, cloud_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                envelope.id,
                envelope.kind,
                envelope.timestamp,
                data_json,
                file_path.map(|p| p.to_string_lossy().to_string()),
                CloudStatus::Local.as_str(),
            ],
        )?;
        log::debug!("inserted {} row {}", envelope.kind, envelope.id);
        Ok(())
    }

    /// Rows of `kind`, newest first; ties keep insertion order.
    pub fn list_by_type(&self, kind: &str) -> Result<EntryScan, VaultError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM data_items WHERE type = ?1 ORDER BY created_at DESC, rowid ASC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![kind], RawRow::from_row)?;

        let mut scan = EntryScan::default();
        for row in rows {
            let row = row?;
            match row.into_entry() {
                Ok(entry) => scan.entries.push(entry),
                Err((id, e)) => {
                    log::warn!("skipping unreadable {} row {}: {}", kind, id, e);
                    scan.skipped += 1;
                }
            }
        }
        Ok(scan)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<StoredEntry>, VaultError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM data_items WHERE id = ?1", ENTRY_COLUMNS),
                params![id],
                RawRow::from_row,
            )
            .optional()?;
        row.map(|r| r.into_entry().map_err(|(_, e)| e)).transpose()
    }

    /// Delete the row of `id` and its session links. Returns the removed
    /// entry so the caller can remove its file.
    pub fn delete(&self, id: &str) -> Result<Option<StoredEntry>, VaultError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let row = tx
            .query_row(
                &format!("SELECT {} FROM data_items WHERE id = ?1", ENTRY_COLUMNS),
                params![id],
                RawRow::from_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        tx.execute("DELETE FROM data_items WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM session_items WHERE item_id = ?1", params![id])?;
        tx.commit()?;

        // The row is gone either way; an unreadable body still reports its file.
        let fallback = StoredEntry {
            id: row.id.clone(),
            kind: row.kind.clone(),
            timestamp: row.created_at,
            display_name: default_display_name(&row.kind),
            file_path: row.file_path.clone().filter(|p| !p.is_empty()).map(PathBuf::from),
            cloud_status: CloudStatus::Local,
            source: EntrySource::Structured,
            body: EntryBody::Plain(Payload::new()),
        };
        let entry = row.into_entry().unwrap_or_else(|(_, e)| {
            log::warn!("deleted unreadable row {}: {}", id, e);
            fallback
        });
        Ok(Some(entry))
    }

    /// Drop session links to `item_id`, for items deleted from the logs.
    pub fn unlink_item(&self, item_id: &str) -> Result<(), VaultError> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM session_items WHERE item_id = ?1", params![item_id])?;
        Ok(())
    }

    /// Move a row through local → queued → synced. Returns false if no row
    /// has this id.
    pub fn update_cloud_status(&self, id: &str, status: CloudStatus) -> Result<bool, VaultError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE data_items SET cloud_status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    /// All file paths referenced by rows.
    pub fn file_paths(&self) -> Result<Vec<PathBuf>, VaultError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT file_path FROM data_items WHERE file_path IS NOT NULL")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths.into_iter().filter(|p| !p.is_empty()).map(PathBuf::from).collect())
    }

    // --- Sessions ---

    pub fn create_session(&self, session: &SessionRow) -> Result<(), VaultError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO sessions (id, name, started_at, ended_at) VALUES (?1, ?2, ?3, ?4)",
            params![session.id, session.name, session.started_at, session.ended_at],
        )?;
        Ok(())
    }

    /// Returns false if the session does not exist or already ended.
    pub fn end_session(&self, session_id: &str, ended_at: i64) -> Result<bool, VaultError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE sessions SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
            params![ended_at, session_id],
        )?;
        Ok(changed > 0)
    }

    pub fn find_session(&self, session_id: &str) -> Result<Option<SessionRow>, VaultError> {
        let conn = self.connect()?;
        let session = conn
            .query_row(
                "SELECT id, name, started_at, ended_at FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        started_at: row.get(2)?,
                        ended_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn link_item(&self, session_id: &str, item_id: &str) -> Result<(), VaultError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO session_items (session_id, item_id) VALUES (?1, ?2)",
            params![session_id, item_id],
        )?;
        Ok(())
    }

    /// Ids linked to `session_id`, in link order.
    pub fn session_items(&self, session_id: &str) -> Result<Vec<String>, VaultError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT item_id FROM session_items WHERE session_id = ?1 ORDER BY rowid ASC")?;
        let ids = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

struct RawRow {
    id: String,
    kind: String,
    created_at: i64,
    data_json: String,
    file_path: Option<String>,
    cloud_status: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            created_at: row.get(2)?,
            data_json: row.get(3)?,
            file_path: row.get(4)?,
            cloud_status: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<StoredEntry, (String, VaultError)> {
        let value: serde_json::Value = match serde_json::from_str(&self.data_json) {
            Ok(value) => value,
            Err(e) => return Err((self.id, e.into())),
        };
        let (body, name) = match decode_body(value) {
            Ok(decoded) => decoded,
            Err(e) => return Err((self.id, e)),
        };
        let cloud_status = self.cloud_status.parse().unwrap_or_else(|e| {
            log::warn!("row {}: {}; treating as local", self.id, e);
            CloudStatus::Local
        });
        Ok(StoredEntry {
            display_name: name.unwrap_or_else(|| default_display_name(&self.kind)),
            id: self.id,
            kind: self.kind,
            timestamp: self.created_at,
            file_path: self.file_path.filter(|p| !p.is_empty()).map(PathBuf::from),
            cloud_status,
            source: EntrySource::Structured,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(id: &str, timestamp: i64) -> EncryptedEnvelope {
        EncryptedEnvelope {
            kind: "location".into(),
            id: id.into(),
            timestamp,
            encrypted: true,
            ciphertext: Some(format!("cipher-{}", id)),
            display_name: "Location Point".into(),
        }
    }

    fn store(dir: &Path) -> StructuredStore {
        StructuredStore::new(dir.join("vault.db"))
    }

    #[test]
    fn insert_and_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.insert(&envelope("a", 100), None).unwrap();
        store.insert(&envelope("b", 300), None).unwrap();
        store.insert(&envelope("c", 200), None).unwrap();
        store.insert(&envelope("d", 300), None).unwrap();

        let scan = store.list_by_type("location").unwrap();
        let ids: Vec<_> = scan.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["b", "d", "c", "a"]);
        assert_eq!(scan.skipped, 0);
        assert_eq!(scan.entries[0].body, EntryBody::Sealed("cipher-b".into()));
        assert_eq!(scan.entries[0].cloud_status, CloudStatus::Local);
    }

    #[test]
    fn unknown_kind_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).list_by_type("nothing").unwrap().entries.is_empty());
    }

    #[test]
    fn duplicate_id_is_persistence_fault() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.insert(&envelope("a", 1), None).unwrap();
        let err = store.insert(&envelope("a", 2), None).unwrap_err();
        assert!(matches!(err, VaultError::Persistence(_)));
        assert!(!err.is_fallback_eligible());
    }

    #[test]
    fn incompatible_schema_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let conn = Connection::open(store.path()).unwrap();
        conn.execute_batch("CREATE TABLE data_items (id TEXT PRIMARY KEY);").unwrap();
        drop(conn);

        let err = store.insert(&envelope("a", 1), None).unwrap_err();
        assert!(err.is_fallback_eligible(), "got {:?}", err);
    }

    #[test]
    fn legacy_plaintext_rows_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.insert(&envelope("new", 2), None).unwrap();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO data_items (id, type, created_at, data_json) VALUES ('old', 'location', 1, ?1)",
            params![r#"{"latitude":1.0,"longitude":2.0}"#],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO data_items (id, type, created_at, data_json) VALUES ('bad', 'location', 0, 'not json')",
            [],
        )
        .unwrap();
        drop(conn);

        let scan = store.list_by_type("location").unwrap();
        assert_eq!(scan.entries.len(), 2);
        assert_eq!(scan.skipped, 1);
        assert!(!scan.entries[1].is_encrypted());
        assert_eq!(scan.entries[1].display_name, "Location Point");
    }

    #[test]
    fn delete_returns_removed_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.insert(&envelope("a", 1), Some(Path::new("/clips/a.enc"))).unwrap();

        let removed = store.delete("a").unwrap().unwrap();
        assert_eq!(removed.file_path, Some(PathBuf::from("/clips/a.enc")));
        assert!(store.find_by_id("a").unwrap().is_none());
        assert!(store.delete("a").unwrap().is_none());
    }

    #[test]
    fn cloud_status_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.insert(&envelope("a", 1), None).unwrap();

        assert!(store.update_cloud_status("a", CloudStatus::Queued).unwrap());
        assert!(!store.update_cloud_status("missing", CloudStatus::Synced).unwrap());
        let entry = store.find_by_id("a").unwrap().unwrap();
        assert_eq!(entry.cloud_status, CloudStatus::Queued);
    }

    #[test]
    fn sessions_link_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let session = SessionRow {
            id: "s1".into(),
            name: "walk".into(),
            started_at: 10,
            ended_at: None,
        };
        store.create_session(&session).unwrap();
        store.link_item("s1", "a").unwrap();
        store.link_item("s1", "b").unwrap();
        store.link_item("s1", "a").unwrap();

        assert_eq!(store.session_items("s1").unwrap(), ["a", "b"]);
        assert!(store.end_session("s1", 20).unwrap());
        assert!(!store.end_session("s1", 30).unwrap());
        assert_eq!(store.find_session("s1").unwrap().unwrap().ended_at, Some(20));
    }

    #[test]
    fn file_paths_lists_referenced_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.insert(&envelope("a", 1), Some(Path::new("/clips/a.enc"))).unwrap();
        store.insert(&envelope("b", 2), None).unwrap();
        assert_eq!(store.file_paths().unwrap(), [PathBuf::from("/clips/a.enc")]);
    }
}
