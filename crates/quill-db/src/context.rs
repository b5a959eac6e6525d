//! Request-scoped connection cache.
//!
//! A [`RequestContext`] is created by the host application when a request
//! begins and torn down when the request ends. The first call to
//! [`RequestContext::db`] opens a connection and caches the handle; every
//! later call in the same context returns the identical handle. Teardown
//! empties the slot and closes the connection, after which every operation on
//! a previously returned handle fails with [`DbError::Closed`].

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Params};
use thiserror::Error;

use crate::connection::{open_connection, ConnectionError, ConnectionSettings};
use crate::record::{self, Record};

/// Errors surfaced by the connection handle and accessor.
#[derive(Debug, Error)]
pub enum DbError {
    /// The handle's connection was closed by request teardown.
    #[error("database handle is closed")]
    Closed,

    /// Opening the connection failed.
    #[error(transparent)]
    Open(#[from] ConnectionError),

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Locks a mutex, recovering from poisoning.
///
/// A panic while the lock was held leaves at worst a connection we were
/// about to hand out or close anyway; refusing every subsequent database
/// operation over a poisoned lock would turn one failed request into many.
fn lock_unpoisoned<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("database lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// A handle to the current request's database connection.
///
/// Cloning is cheap and every clone refers to the same underlying connection;
/// [`Db::is_same`] compares that identity. Once the request context is torn
/// down, all clones observe the closed state.
#[derive(Clone)]
pub struct Db {
    cell: Arc<Mutex<Option<Connection>>>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Db {
    fn new(conn: Connection) -> Self {
        Self {
            cell: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Returns `true` if both handles refer to the same connection.
    pub fn is_same(&self, other: &Db) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Returns `true` once the owning context has been torn down.
    pub fn is_closed(&self) -> bool {
        lock_unpoisoned(&self.cell).is_none()
    }

    /// Runs a closure against the open connection.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, DbError> {
        let guard = lock_unpoisoned(&self.cell);
        let conn = guard.as_ref().ok_or(DbError::Closed)?;
        f(conn).map_err(DbError::from)
    }

    /// Executes a single statement, returning the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Closed` after teardown, `DbError::Sqlite` on SQL
    /// failure.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, DbError> {
        self.with_conn(|conn| conn.execute(sql, params))
    }

    /// Executes a multi-statement SQL script.
    ///
    /// Used by the schema bootstrap; statements run in order and the first
    /// failure aborts the rest of the script.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Closed` after teardown, `DbError::Sqlite` on SQL
    /// failure.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.with_conn(|conn| conn.execute_batch(sql))
    }

    /// Runs a query and returns all rows as name-addressable records.
    ///
    /// Columns declared `TIMESTAMP` are decoded to date-time values; see
    /// [`crate::Value`].
    ///
    /// # Errors
    ///
    /// Returns `DbError::Closed` after teardown, `DbError::Sqlite` on SQL
    /// failure or when a declared `TIMESTAMP` column holds unparsable text.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            record::fetch_all(&mut stmt, params)
        })
    }

    /// Runs a query expected to produce at most one row.
    ///
    /// # Errors
    ///
    /// Same as [`Db::query`].
    pub fn query_one<P: Params>(&self, sql: &str, params: P) -> Result<Option<Record>, DbError> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Closes the underlying connection. A close failure is logged, not
    /// propagated — the teardown caller consumes no return value.
    fn close(&self) {
        let conn = lock_unpoisoned(&self.cell).take();
        if let Some(conn) = conn {
            match conn.close() {
                Ok(()) => tracing::debug!("closed database connection"),
                Err((_conn, e)) => {
                    tracing::warn!("failed to close database connection: {}", e);
                }
            }
        }
    }
}

/// The per-request slot state: `Absent → Open → Closed`, no other
/// transitions. Reopening within one context is unsupported.
enum Slot {
    Absent,
    Open(Db),
    Closed,
}

/// The per-request database context.
///
/// Created at request start, torn down exactly once at request end. The host
/// passes it through the request pipeline explicitly; nothing here is global.
pub struct RequestContext {
    settings: ConnectionSettings,
    slot: Mutex<Slot>,
}

impl RequestContext {
    /// Creates a context with an empty slot. No connection is opened until
    /// [`RequestContext::db`] is first called.
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            slot: Mutex::new(Slot::Absent),
        }
    }

    /// Returns the request's connection handle, opening it on first access.
    ///
    /// Every call within one context returns the identical handle. Distinct
    /// contexts never share a handle.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Open` if the connection cannot be opened and
    /// `DbError::Closed` if the context was already torn down.
    pub fn db(&self) -> Result<Db, DbError> {
        let mut slot = lock_unpoisoned(&self.slot);
        match &*slot {
            Slot::Open(db) => return Ok(db.clone()),
            Slot::Closed => return Err(DbError::Closed),
            Slot::Absent => {}
        }

        let conn = open_connection(&self.settings)?;
        let db = Db::new(conn);
        *slot = Slot::Open(db.clone());
        Ok(db)
    }

    /// Tears the context down, closing the connection if one was opened.
    ///
    /// Safe to call when no connection was ever created, and safe to call
    /// more than once — repeat invocations are no-ops.
    pub fn close(&self) {
        let previous = {
            let mut slot = lock_unpoisoned(&self.slot);
            std::mem::replace(&mut *slot, Slot::Closed)
        };
        if let Slot::Open(db) = previous {
            db.close();
        }
    }
}

impl Drop for RequestContext {
    // Guaranteed-release half of the lifecycle: an aborted request that never
    // reached explicit teardown still closes its connection here.
    fn drop(&mut self) {
        self.close();
    }
}
