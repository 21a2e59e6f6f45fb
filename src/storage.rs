// src/storage.rs
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

use crate::migration::{self, MigrationError, CURRENT_VERSION};
use crate::model::DailyWorkout;
use crate::preferences::Preferences;

const DB_FILE_NAME: &str = "workouts.sqlite";
const APP_DATA_DIR: &str = "workout-tracker";

// Custom Error type for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database write failed: {0}")]
    WriteFailed(rusqlite::Error),
    #[error("Failed to serialize workout data: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Why a stored document could not be accepted. An absent document is not
/// an error; see [`load_document`].
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Stored workout data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Stored workout data could not be migrated: {0}")]
    Migration(#[from] MigrationError),
}

/// Durable string storage keyed by name.
pub trait KeyValueStore: Send {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

// --- Stored document ---

/// Everything that survives a restart. Timer state is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    #[serde(default)]
    pub workouts: Vec<DailyWorkout>,
    #[serde(flatten)]
    pub preferences: Preferences,
    pub selected_date: NaiveDate,
    #[serde(default)]
    pub version: u32,
}

impl StoredDocument {
    #[must_use]
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            workouts: Vec::new(),
            preferences: Preferences::default(),
            selected_date: today,
            version: CURRENT_VERSION,
        }
    }
}

/// Borrowed twin of `StoredDocument` so saving does not clone the history.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRef<'a> {
    workouts: &'a [DailyWorkout],
    #[serde(flatten)]
    preferences: &'a Preferences,
    selected_date: NaiveDate,
    version: u32,
}

pub fn encode_state(
    workouts: &[DailyWorkout],
    preferences: &Preferences,
    selected_date: NaiveDate,
) -> Result<String, StorageError> {
    let document = DocumentRef {
        workouts,
        preferences,
        selected_date,
        version: CURRENT_VERSION,
    };
    serde_json::to_string(&document).map_err(StorageError::Serialize)
}

pub fn encode_document(document: &StoredDocument) -> Result<String, StorageError> {
    encode_state(
        &document.workouts,
        &document.preferences,
        document.selected_date,
    )
}

/// Parses, migrates and decodes a stored document.
pub fn decode_document(raw: &str, today: NaiveDate) -> Result<StoredDocument, LoadError> {
    let value: Value = serde_json::from_str(raw)?;
    let (state, version) = migration::unwrap_document(value)?;
    let state = migration::migrate(state, version, today)?;
    let mut document: StoredDocument = serde_json::from_value(Value::Object(state))?;
    document.version = CURRENT_VERSION;
    Ok(document)
}

/// Loads the document under `key`. `Ok(None)` means nothing was stored yet.
pub fn load_document(
    store: &dyn KeyValueStore,
    key: &str,
    today: NaiveDate,
) -> Result<Option<StoredDocument>, LoadError> {
    match store.load(key)? {
        Some(raw) => decode_document(&raw, today).map(Some),
        None => {
            debug!(key, "No stored workout data");
            Ok(None)
        }
    }
}

// --- In-memory backend ---

/// Map-backed store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// --- SQLite backend ---

/// Gets the path to the SQLite database file, under `data_dir` if given or
/// the platform data directory otherwise. Creates the directory if needed.
pub fn get_db_path(data_dir: Option<&Path>) -> Result<PathBuf, StorageError> {
    let app_dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_dir()
            .ok_or(StorageError::DataDir)?
            .join(APP_DATA_DIR),
    };
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Opens a connection to the SQLite database.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, StorageError> {
    Connection::open(path).map_err(StorageError::Connection)
}

/// Initializes the key-value table if it doesn't exist.
pub fn init_db(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL -- RFC3339
        )",
        [],
    )
    .map_err(StorageError::Connection)?;
    Ok(())
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = open_db(path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(StorageError::Connection)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::QueryFailed)
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now()],
            )
            .map_err(StorageError::WriteFailed)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(StorageError::WriteFailed)?;
        Ok(())
    }
}
