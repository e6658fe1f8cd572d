//! SQLite-backed ReservationStore implementation.
//! Lets several `hopper` processes on one host share a cooldown table.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! hopper-core = { path = "../hopper-core", features = ["sqlite"] }
//! ```

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::infrastructure::ReservationStore;
use crate::types::Reservation;

/// A persistent reservation store backed by SQLite.
///
/// Uses WAL mode so concurrent readers in other processes are not blocked.
/// Statements run on the blocking pool; the connection mutex is never held
/// across an await point.
pub struct SqliteReservationStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteReservationStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open(path)?, Arc::new(SystemClock))
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open_in_memory()?, clock)
    }

    fn from_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, rusqlite::Error> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(1))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS reservations (
                key         TEXT PRIMARY KEY,
                marker      TEXT NOT NULL,
                reserved_at INTEGER NOT NULL,
                expires_at  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reservations_expiry ON reservations(expires_at);",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection poisoned".to_string()))?;
            op(&guard).map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Backend(format!("sqlite task failed: {}", e)))?
    }

    fn row_to_reservation(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
        Ok(Reservation {
            key: row.get(0)?,
            marker: row.get(1)?,
            reserved_at: row.get(2)?,
            expires_at: row.get(3)?,
        })
    }
}

#[async_trait]
impl ReservationStore for SqliteReservationStore {
    async fn get(&self, key: &str) -> Result<Option<Reservation>, StoreError> {
        let now = self.clock.now_ms();
        let key = key.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT key, marker, reserved_at, expires_at FROM reservations
                 WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                Self::row_to_reservation,
            )
            .optional()
        })
        .await
    }

    async fn put(&self, key: &str, marker: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let record = Reservation::new(key.to_string(), marker.to_string(), ttl_secs, now);
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO reservations (key, marker, reserved_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![record.key, record.marker, record.reserved_at, record.expires_at],
            )
            .map(|_| ())
        })
        .await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        marker: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        let record = Reservation::new(key.to_string(), marker.to_string(), ttl_secs, now);
        // Single statement: a live row makes the upsert a no-op (0 changes).
        let changed = self
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO reservations (key, marker, reserved_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        marker = excluded.marker,
                        reserved_at = excluded.reserved_at,
                        expires_at = excluded.expires_at
                     WHERE reservations.expires_at <= excluded.reserved_at",
                    params![record.key, record.marker, record.reserved_at, record.expires_at],
                )
            })
            .await?;
        Ok(changed > 0)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now_ms();
        self.run(move |conn| {
            let mut stmt = conn.prepare("SELECT key FROM reservations WHERE expires_at > ?1")?;
            let rows = stmt.query_map(params![now], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await
    }

    async fn evict_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now_ms();
        self.run(move |conn| {
            conn.execute("DELETE FROM reservations WHERE expires_at <= ?1", params![now])
        })
        .await
    }
}
