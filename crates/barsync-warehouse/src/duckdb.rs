//! `DuckDB` connection pool management.
//!
//! The database file is opened exactly once; every pooled connection is a
//! clone of that root handle, so all of them share one database instance and
//! one file lock.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ::duckdb::Connection;

struct PoolState {
    root: Connection,
    idle: Vec<Connection>,
}

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock cannot leave the idle list half-updated.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A connection pool over a single `DuckDB` database file.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Open the database file and create a pool around it.
    ///
    /// # Arguments
    /// * `path` - Path to the `DuckDB` database file
    /// * `max_idle` - Maximum number of idle connections kept for reuse
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let root = Connection::open(db_path.as_path())?;
        configure_connection(&root)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_idle: max_idle.max(1),
                state: Mutex::new(PoolState {
                    root,
                    idle: Vec::new(),
                }),
            }),
        })
    }

    /// Acquire a connection from the pool, cloning the root handle when no
    /// idle connection is available.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be created or configured.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let mut state = self.inner.lock();
        let connection = match state.idle.pop() {
            Some(connection) => connection,
            None => {
                let connection = state.root.try_clone()?;
                configure_connection(&connection)?;
                connection
            }
        };
        drop(state);

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }

    /// Number of idle connections currently parked in the pool.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.inner.lock().idle.len()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection is only taken on drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection is only taken on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut state = self.pool.lock();
        if state.idle.len() < self.pool.max_idle {
            state.idle.push(connection);
        }
    }
}

/// Apply per-connection settings.
///
/// # Errors
/// Returns an error if configuration SQL fails to execute.
fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}
