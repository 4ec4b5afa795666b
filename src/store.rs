use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{LabelError, Result};
use crate::model::{
    Meta, Storage, StorageCreate, StorageLabel, StorageLabelCreate, StorageLabelUpdate, missing_qty,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS storages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS storage_labels (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    storage_id    INTEGER NOT NULL REFERENCES storages(id) ON DELETE CASCADE,
    template_type TEXT NOT NULL DEFAULT 'jar_label_small',
    title         TEXT NOT NULL,
    text          TEXT,
    icon          TEXT,
    bg            TEXT,
    color         TEXT,
    border        TEXT,
    meta          TEXT,
    desired_qty   INTEGER NOT NULL DEFAULT 0,
    printed_qty   INTEGER NOT NULL DEFAULT 0,
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_storage_labels_storage ON storage_labels(storage_id);
";

const LABEL_COLUMNS: &str = "id, storage_id, template_type, title, text, icon, bg, color, border, \
     desired_qty, printed_qty, active, meta, created_at";

/// SQLite-backed persistence for storages and their labels.
pub struct LabelStore {
    conn: Mutex<Connection>,
}

impl LabelStore {
    /// Opens (or creates) the database file and ensures the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LabelError::Internal(format!("store lock poisoned: {e}")))
    }

    pub fn create_storage(&self, data: &StorageCreate) -> Result<Storage> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO storages (name, description) VALUES (?1, ?2)",
            params![data.name, data.description],
        );
        if let Err(err) = inserted {
            return Err(if is_unique_violation(&err) {
                LabelError::StorageExists(data.name.clone())
            } else {
                err.into()
            });
        }
        let id = tx.last_insert_rowid();
        let storage = fetch_storage(&tx, id)?.ok_or(LabelError::StorageNotFound(id))?;
        tx.commit()?;
        tracing::info!(storage_id = id, name = %storage.name, "storage created");
        Ok(storage)
    }

    pub fn list_storages(&self) -> Result<Vec<Storage>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, description, created_at FROM storages ORDER BY id")?;
        let rows = stmt.query_map([], storage_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_storage(&self, storage_id: i64) -> Result<Storage> {
        let conn = self.lock()?;
        fetch_storage(&conn, storage_id)?.ok_or(LabelError::StorageNotFound(storage_id))
    }

    /// Deletes the storage together with all of its labels.
    pub fn delete_storage(&self, storage_id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM storages WHERE id = ?1", params![storage_id])?;
        if deleted == 0 {
            return Err(LabelError::StorageNotFound(storage_id));
        }
        tx.commit()?;
        tracing::info!(storage_id, "storage deleted");
        Ok(())
    }

    pub fn add_label(&self, storage_id: i64, data: &StorageLabelCreate) -> Result<StorageLabel> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if fetch_storage(&tx, storage_id)?.is_none() {
            return Err(LabelError::StorageNotFound(storage_id));
        }
        tx.execute(
            "INSERT INTO storage_labels \
             (storage_id, template_type, title, text, icon, bg, color, border, desired_qty, active, meta) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                storage_id,
                data.template_type,
                data.title,
                data.text,
                data.icon,
                data.bg,
                data.color,
                data.border,
                data.desired_qty.max(0),
                data.active,
                meta_to_sql(data.meta.as_ref())?,
            ],
        )?;
        let label_id = tx.last_insert_rowid();
        let label = fetch_label(&tx, storage_id, label_id)?;
        tx.commit()?;
        tracing::debug!(storage_id, label_id, "label added");
        Ok(label)
    }

    pub fn list_labels(&self, storage_id: i64) -> Result<Vec<StorageLabel>> {
        let conn = self.lock()?;
        if fetch_storage(&conn, storage_id)?.is_none() {
            return Err(LabelError::StorageNotFound(storage_id));
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT {LABEL_COLUMNS} FROM storage_labels WHERE storage_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![storage_id], label_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_label(
        &self,
        storage_id: i64,
        label_id: i64,
        patch: &StorageLabelUpdate,
    ) -> Result<StorageLabel> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current = fetch_label(&tx, storage_id, label_id)?;
        let desired = patch.desired_qty.unwrap_or(current.desired_qty).max(0);
        let active = patch.active.unwrap_or(current.active);
        tx.execute(
            "UPDATE storage_labels SET desired_qty = ?1, active = ?2 WHERE id = ?3",
            params![desired, active, label_id],
        )?;
        let label = fetch_label(&tx, storage_id, label_id)?;
        tx.commit()?;
        Ok(label)
    }

    /// Adds `qty` to the printed count, never letting it drop below zero.
    pub fn mark_printed(&self, storage_id: i64, label_id: i64, qty: i64) -> Result<StorageLabel> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current = fetch_label(&tx, storage_id, label_id)?;
        let printed = current.printed_qty.saturating_add(qty).max(0);
        tx.execute(
            "UPDATE storage_labels SET printed_qty = ?1 WHERE id = ?2",
            params![printed, label_id],
        )?;
        let label = fetch_label(&tx, storage_id, label_id)?;
        tx.commit()?;
        tracing::debug!(storage_id, label_id, qty, printed, "printed count updated");
        Ok(label)
    }

    /// Active labels of the storage whose print quota is not yet met.
    pub fn missing_labels(&self, storage_id: i64) -> Result<Vec<StorageLabel>> {
        Ok(self
            .list_labels(storage_id)?
            .into_iter()
            .filter(|label| label.active && label.missing_qty > 0)
            .collect())
    }
}

fn fetch_storage(conn: &Connection, storage_id: i64) -> Result<Option<Storage>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, created_at FROM storages WHERE id = ?1",
            params![storage_id],
            storage_from_row,
        )
        .optional()?)
}

fn fetch_label(conn: &Connection, storage_id: i64, label_id: i64) -> Result<StorageLabel> {
    conn.query_row(
        &format!("SELECT {LABEL_COLUMNS} FROM storage_labels WHERE id = ?1 AND storage_id = ?2"),
        params![label_id, storage_id],
        label_from_row,
    )
    .optional()?
    .ok_or(LabelError::LabelNotFound {
        storage_id,
        label_id,
    })
}

fn storage_from_row(row: &Row) -> rusqlite::Result<Storage> {
    Ok(Storage {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn label_from_row(row: &Row) -> rusqlite::Result<StorageLabel> {
    let desired_qty: i64 = row.get(9)?;
    let printed_qty: i64 = row.get(10)?;
    let meta: Option<String> = row.get(12)?;
    let meta = meta
        .map(|raw| serde_json::from_str::<Meta>(&raw))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(StorageLabel {
        id: row.get(0)?,
        storage_id: row.get(1)?,
        template_type: row.get(2)?,
        title: row.get(3)?,
        text: row.get(4)?,
        icon: row.get(5)?,
        bg: row.get(6)?,
        color: row.get(7)?,
        border: row.get(8)?,
        desired_qty,
        printed_qty,
        missing_qty: missing_qty(desired_qty, printed_qty),
        active: row.get(11)?,
        meta,
        created_at: row.get(13)?,
    })
}

fn meta_to_sql(meta: Option<&Meta>) -> Result<Option<String>> {
    meta.map(serde_json::to_string)
        .transpose()
        .map_err(|e| LabelError::Internal(format!("cannot encode label meta: {e}")))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
