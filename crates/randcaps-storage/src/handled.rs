use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use randcaps_core::error::RandCapsError;

pub const DB_FILE_NAME: &str = "randcaps.db";

/// Ledger of trigger events that already received a reply.
pub struct HandledEventLog {
    conn: Mutex<Connection>,
}

pub async fn call_blocking<T, F>(log: Arc<HandledEventLog>, f: F) -> Result<T, RandCapsError>
where
    T: Send + 'static,
    F: FnOnce(&HandledEventLog) -> Result<T, RandCapsError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(log.as_ref()))
        .await
        .map_err(|e| RandCapsError::Io(std::io::Error::other(format!("DB task join error: {e}"))))?
}

impl HandledEventLog {
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn new(data_dir: &str) -> Result<Self, RandCapsError> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(Path::new(data_dir).join(DB_FILE_NAME))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, RandCapsError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RandCapsError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS handled_events (
                event_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                processed_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn is_handled(&self, event_id: &str) -> Result<bool, RandCapsError> {
        if event_id.is_empty() {
            return Ok(false);
        }
        let conn = self.lock_conn();
        let found = conn
            .query_row(
                "SELECT 1 FROM handled_events WHERE event_id = ?1",
                params![event_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn mark_handled(&self, event_id: &str, room_id: &str) -> Result<(), RandCapsError> {
        if event_id.is_empty() {
            return Ok(());
        }
        let conn = self.lock_conn();
        conn.execute(
            "INSERT OR IGNORE INTO handled_events (event_id, room_id, processed_at)
             VALUES (?1, ?2, ?3)",
            params![event_id, room_id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
