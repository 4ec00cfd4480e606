use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use chat_core::{Message, MessageStore, StoreError};

use crate::schema;

/// SQLite message store.
/// Uses parking_lot::Mutex for synchronous access (rusqlite is not Sync).
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;
        init(&conn)?;

        info!(path = %path.display(), "message database opened");

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        init(&conn)?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(schema::PRAGMAS)
        .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;

    conn.execute_batch(schema::CREATE_TABLES)
        .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    if version.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [schema::SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
    }

    Ok(())
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl MessageStore for SqliteStore {
    fn save(&self, content: &str) -> Result<Message, StoreError> {
        let conn = self.conn.lock();
        conn.execute("INSERT INTO chat_tb (message) VALUES (?1)", params![content])
            .map_err(db_err)?;
        Ok(Message::new(conn.last_insert_rowid(), content))
    }

    fn list_all(&self) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, message FROM chat_tb ORDER BY id DESC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok(Message::new(row.get(0)?, row.get::<_, String>(1)?)))
            .map_err(db_err)?;

        let messages = rows.collect::<Result<Vec<_>, _>>().map_err(db_err)?;
        Ok(messages)
    }
}
