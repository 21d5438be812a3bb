//! `SQLite` schema definitions for hydrotrack.
//!
//! The schema has a single version. Opening stamps it into `metadata`, and a
//! database stamped by a newer build is refused rather than written to.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// `metadata` key holding the schema version.
const VERSION_KEY: &str = "schema_version";

/// SQL statement to create the preferences table.
///
/// `value` is untyped on purpose: a key holds either an INTEGER or a BLOB.
pub const CREATE_PREFERENCES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY,
    value NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_PREFERENCES_TABLE, CREATE_METADATA_TABLE];

/// Create missing tables and stamp the schema version.
///
/// # Errors
///
/// Returns an error if a statement fails, the stored version is unreadable,
/// or the database was written by a newer schema.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    match stored_version(conn)? {
        Some(found) if found > SCHEMA_VERSION => Err(Error::SchemaVersion {
            found,
            supported: SCHEMA_VERSION,
        }),
        Some(found) if found == SCHEMA_VERSION => Ok(()),
        _ => {
            conn.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                (VERSION_KEY, SCHEMA_VERSION.to_string()),
            )?;
            Ok(())
        }
    }
}

fn stored_version(conn: &Connection) -> Result<Option<i64>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| {
            v.parse().map_err(|_| Error::SchemaVersionUnreadable { value: v })
        })
        .transpose()
}
