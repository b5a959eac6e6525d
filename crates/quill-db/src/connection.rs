//! Connection opening and session configuration.

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Settings for opening the SQLite database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Path to the SQLite database file. Use `:memory:` for an in-memory
    /// database (useful for testing).
    pub path: String,

    /// Busy timeout for the SQLite session, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            path: "quill.db".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Errors that can occur when opening a database connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The database file could not be opened.
    #[error("failed to open database '{path}': {source}")]
    Open {
        /// The path that failed to open.
        path: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Session pragmas could not be applied.
    #[error("failed to configure database session: {0}")]
    Configure(rusqlite::Error),
}

/// Opens a single SQLite connection with foreign keys enabled.
///
/// The file does not have to exist yet — it is created on first open. The
/// schema enforces a foreign key from posts to their author, so
/// `foreign_keys` is switched on for every session.
///
/// # Errors
///
/// Returns `ConnectionError::Open` if the file cannot be opened and
/// `ConnectionError::Configure` if the session pragmas fail.
pub fn open_connection(settings: &ConnectionSettings) -> Result<Connection, ConnectionError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;

    let conn = Connection::open_with_flags(&settings.path, flags).map_err(|source| {
        ConnectionError::Open {
            path: settings.path.clone(),
            source,
        }
    })?;

    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {};",
        settings.busy_timeout_ms
    ))
    .map_err(ConnectionError::Configure)?;

    tracing::debug!(path = %settings.path, "opened database connection");

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_connection() {
        let settings = ConnectionSettings {
            path: ":memory:".to_string(),
            busy_timeout_ms: 2_500,
        };

        let conn = open_connection(&settings).expect("open should succeed");

        // Verify foreign keys are enabled
        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("should query foreign_keys");
        assert_eq!(fk, 1, "foreign keys should be enabled");

        // Verify busy timeout is configured
        let busy_timeout: i32 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy_timeout, 2_500, "busy timeout should match settings");
    }

    #[test]
    fn open_creates_missing_file() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("fresh.db");
        let settings = ConnectionSettings {
            path: path.to_string_lossy().to_string(),
            ..ConnectionSettings::default()
        };

        let _conn = open_connection(&settings).expect("open should create the file");
        assert!(path.exists(), "database file should exist after open");
    }

    #[test]
    fn open_unwritable_path_fails() {
        let settings = ConnectionSettings {
            path: "/nonexistent-dir/quill.db".to_string(),
            ..ConnectionSettings::default()
        };

        let err = open_connection(&settings).expect_err("open should fail");
        assert!(matches!(err, ConnectionError::Open { .. }));
    }
}
