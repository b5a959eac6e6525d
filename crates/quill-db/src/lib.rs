//! Database layer for the quill blog service.
//!
//! Provides the request-scoped SQLite connection cache, a query layer that
//! returns name-addressable records (with declared-`TIMESTAMP` columns decoded
//! to `chrono` date-times), and the destructive schema bootstrap behind the
//! `init-db` command.
//!
//! # Design decisions
//!
//! - **One connection per request**: a [`RequestContext`] holds at most one
//!   open connection, created on first access and closed exactly once at
//!   teardown. There is no pooling — concurrent requests never share a
//!   handle, and the next request always opens fresh.
//! - **Explicit context, no ambient state**: the host application creates a
//!   context at request start and passes it through the pipeline; teardown is
//!   registered against the request's lifetime and also runs on drop, so an
//!   aborted request cannot leak its connection.
//! - **Embedded schema**: the DDL script is compiled into the binary via
//!   `include_str!`, ensuring the bootstrap ships with the server. An
//!   operator-supplied script path can override it at runtime.

mod connection;
mod context;
mod record;
mod schema;

pub use connection::{open_connection, ConnectionError, ConnectionSettings};
pub use context::{Db, DbError, RequestContext};
pub use record::{Record, Value};
pub use schema::{init_db, SchemaError, SchemaSource};
