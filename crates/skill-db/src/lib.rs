pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

pub use error::StoreError;
pub use store::Store;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_POOL_SIZE: usize = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed message store.
///
/// Holds a fixed pool of read-write connections handed out round-robin.
/// Each slot is behind its own mutex, so callers on different threads only
/// contend when they land on the same slot; SQLite's busy timeout covers
/// writer contention across slots.
pub struct SqliteStore {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl SqliteStore {
    /// Open (or create) a database file with `pool_size` connections.
    ///
    /// The schema is not created here; call [`Store::bootstrap`] once on a
    /// fresh database.
    pub fn open(path: &Path, pool_size: usize) -> Result<Self, StoreError> {
        let pool_size = pool_size.max(1);
        let mut conns = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open(path)?;
            // WAL mode for concurrent readers alongside the writer
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conns.push(Mutex::new(conn));
        }

        info!("Store opened at {} ({} connections)", path.display(), pool_size);
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    /// Private in-memory database. Uses a single connection, since every
    /// in-memory connection would otherwise be its own empty database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conns: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.conns.len()
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let mut conn = self.conns[idx]
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("connection {} poisoned: {}", idx, e)))?;
        f(&mut conn)
    }
}
