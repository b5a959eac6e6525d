//! Name-addressable query results.
//!
//! Rows come back as [`Record`]s — ordered column names plus decoded
//! [`Value`]s — instead of positional tuples. The decode step inspects each
//! result column's declared type: text stored in a `TIMESTAMP` column is
//! parsed into a [`chrono::NaiveDateTime`] by the query layer itself, so no
//! global converter registration is involved.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Params, Statement};

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Text from a column declared `TIMESTAMP`, parsed into a date-time.
    Timestamp(NaiveDateTime),
}

/// One result row, addressable by column name.
#[derive(Debug, Clone)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// The column names of the result set, in statement order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the value stored under `name`, or `None` for an unknown
    /// column.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    /// The text value of `name`, if present and textual.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer value of `name`, if present and integral.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The decoded date-time value of `name`, if present and a timestamp.
    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        match self.get(name)? {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// Runs a prepared statement and decodes every row into a [`Record`].
///
/// Column metadata is captured up front; the name list is shared across all
/// records of the result set.
pub(crate) fn fetch_all<P: Params>(
    stmt: &mut Statement<'_>,
    params: P,
) -> Result<Vec<Record>, rusqlite::Error> {
    let (columns, decl_types): (Vec<String>, Vec<Option<String>>) = stmt
        .columns()
        .iter()
        .map(|col| {
            (
                col.name().to_string(),
                col.decl_type().map(|d| d.to_string()),
            )
        })
        .unzip();
    let columns: Arc<[String]> = columns.into();

    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(decode_value(
                row.get_ref(idx)?,
                decl_types[idx].as_deref(),
                idx,
            )?);
        }
        records.push(Record {
            columns: Arc::clone(&columns),
            values,
        });
    }
    Ok(records)
}

/// Decodes one raw SQLite value, applying the declared-type timestamp rule.
fn decode_value(
    value: ValueRef<'_>,
    decl_type: Option<&str>,
    idx: usize,
) -> Result<Value, rusqlite::Error> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(v) => Ok(Value::Integer(v)),
        ValueRef::Real(v) => Ok(Value::Real(v)),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(rusqlite::Error::Utf8Error)?;
            if decl_type.is_some_and(|d| d.eq_ignore_ascii_case("timestamp")) {
                let parsed = parse_timestamp(text).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
                })?;
                Ok(Value::Timestamp(parsed))
            } else {
                Ok(Value::Text(text.to_string()))
            }
        }
        ValueRef::Blob(bytes) => Ok(Value::Blob(bytes.to_vec())),
    }
}

/// Parses the two on-disk forms: SQLite's `CURRENT_TIMESTAMP` output
/// (`YYYY-MM-DD HH:MM:SS`, optionally fractional) and the `T`-separated
/// ISO 8601 form.
fn parse_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
}
