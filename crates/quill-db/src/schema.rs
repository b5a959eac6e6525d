//! Destructive schema bootstrap.
//!
//! [`init_db`] replays the full DDL script — drop-if-exists plus create for
//! every table — so a successful run always yields an empty, freshly
//! structured schema regardless of prior contents. There is no versioning and
//! no data migration; a failure mid-script may leave the schema in an
//! intermediate state, and re-running after fixing the cause is the only
//! recovery path.

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::context::{Db, DbError};

/// The bundled schema script, compiled into the binary.
const EMBEDDED_SCHEMA: &str = include_str!("schema.sql");

/// Where the schema script comes from.
#[derive(Debug, Clone, Default)]
pub enum SchemaSource {
    /// The bundled `schema.sql` shipped inside the binary.
    #[default]
    Embedded,
    /// An operator-supplied script read from disk at bootstrap time.
    Path(PathBuf),
}

impl SchemaSource {
    /// Reads the full script text. For [`SchemaSource::Path`] this happens
    /// strictly before any statement executes, so a missing or unreadable
    /// file leaves the database untouched.
    fn read(&self) -> Result<Cow<'static, str>, SchemaError> {
        match self {
            SchemaSource::Embedded => Ok(Cow::Borrowed(EMBEDDED_SCHEMA)),
            SchemaSource::Path(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| SchemaError::Resource {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// Errors that can occur during schema bootstrap.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema script file could not be read. No statement has executed.
    #[error("failed to read schema script '{path}': {source}")]
    Resource {
        /// The script path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Script execution failed. The schema may be partially applied.
    #[error("schema script execution failed: {0}")]
    Execution(#[from] DbError),
}

/// Drops and recreates all tables on the given handle.
///
/// # Errors
///
/// Returns `SchemaError::Resource` when a script file cannot be read and
/// `SchemaError::Execution` when any statement fails. Errors propagate
/// unchanged — there is no partial-failure recovery here.
pub fn init_db(db: &Db, source: &SchemaSource) -> Result<(), SchemaError> {
    let sql = source.read()?;
    tracing::info!("initializing database schema");
    db.execute_batch(&sql)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionSettings;
    use crate::context::RequestContext;
    use std::io::Write;

    fn mem_context() -> RequestContext {
        RequestContext::new(ConnectionSettings {
            path: ":memory:".to_string(),
            ..ConnectionSettings::default()
        })
    }

    fn table_names(db: &Db) -> Vec<String> {
        db.query(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
            [],
        )
        .expect("should list tables")
        .iter()
        .filter_map(|r| r.text("name").map(str::to_string))
        .collect()
    }

    fn row_count(db: &Db, table: &str) -> i64 {
        db.query_one(&format!("SELECT COUNT(*) AS n FROM {table}"), [])
            .expect("should count rows")
            .expect("count row")
            .integer("n")
            .expect("count value")
    }

    #[test]
    fn init_on_fresh_database_creates_empty_tables() {
        let ctx = mem_context();
        let db = ctx.db().expect("should open");

        init_db(&db, &SchemaSource::Embedded).expect("bootstrap should succeed");

        assert_eq!(table_names(&db), ["post", "user"]);
        assert_eq!(row_count(&db, "user"), 0);
        assert_eq!(row_count(&db, "post"), 0);
    }

    #[test]
    fn init_discards_existing_rows() {
        let ctx = mem_context();
        let db = ctx.db().expect("should open");
        init_db(&db, &SchemaSource::Embedded).expect("first bootstrap");

        db.execute(
            "INSERT INTO user (username, password) VALUES ('alice', 'hash')",
            [],
        )
        .expect("insert user");
        db.execute(
            "INSERT INTO post (author_id, title, body) VALUES (1, 'hi', 'first post')",
            [],
        )
        .expect("insert post");

        init_db(&db, &SchemaSource::Embedded).expect("second bootstrap");

        assert_eq!(table_names(&db), ["post", "user"]);
        assert_eq!(row_count(&db, "user"), 0, "prior rows must be discarded");
        assert_eq!(row_count(&db, "post"), 0, "prior rows must be discarded");
    }

    #[test]
    fn init_twice_on_empty_database_is_idempotent() {
        let ctx = mem_context();
        let db = ctx.db().expect("should open");

        init_db(&db, &SchemaSource::Embedded).expect("first bootstrap");
        init_db(&db, &SchemaSource::Embedded).expect("second bootstrap");

        assert_eq!(table_names(&db), ["post", "user"]);
    }

    #[test]
    fn missing_script_file_leaves_database_untouched() {
        let ctx = mem_context();
        let db = ctx.db().expect("should open");
        init_db(&db, &SchemaSource::Embedded).expect("bootstrap");
        db.execute(
            "INSERT INTO user (username, password) VALUES ('alice', 'hash')",
            [],
        )
        .expect("insert user");

        let missing = SchemaSource::Path(PathBuf::from("/nonexistent/schema.sql"));
        let err = init_db(&db, &missing).expect_err("missing script must fail");
        assert!(matches!(err, SchemaError::Resource { .. }));

        // The failure happened before any statement ran.
        assert_eq!(row_count(&db, "user"), 1);
    }

    #[test]
    fn script_file_override_is_executed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("alt_schema.sql");
        let mut file = std::fs::File::create(&path).expect("create script");
        writeln!(
            file,
            "DROP TABLE IF EXISTS note;\nCREATE TABLE note (id INTEGER PRIMARY KEY, body TEXT);"
        )
        .expect("write script");

        let ctx = mem_context();
        let db = ctx.db().expect("should open");
        init_db(&db, &SchemaSource::Path(path)).expect("bootstrap from file");

        assert_eq!(table_names(&db), ["note"]);
    }

    #[test]
    fn malformed_script_surfaces_execution_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("broken.sql");
        let mut file = std::fs::File::create(&path).expect("create script");
        writeln!(file, "CREATE TABLE ok (id INTEGER);\nNOT VALID SQL;").expect("write script");

        let ctx = mem_context();
        let db = ctx.db().expect("should open");
        let err = init_db(&db, &SchemaSource::Path(path)).expect_err("bad SQL must fail");
        assert!(matches!(err, SchemaError::Execution(_)));
    }
}
