use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

// Documents are schema-less: one row per document, one row per field.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    rowid INTEGER PRIMARY KEY,
    doc_id BLOB NOT NULL UNIQUE CHECK (length(doc_id) = 16),
    collection TEXT NOT NULL,
    created_at BLOB NOT NULL CHECK (length(created_at) = 12),
    last_updated BLOB NOT NULL CHECK (length(last_updated) = 12)
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection, rowid);

CREATE TABLE IF NOT EXISTS fields (
    doc_id BLOB NOT NULL REFERENCES documents (doc_id) ON DELETE CASCADE,
    field_key TEXT NOT NULL,
    value BLOB NOT NULL,
    updated_at BLOB NOT NULL CHECK (length(updated_at) = 12),
    PRIMARY KEY (doc_id, field_key)
);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        init_schema(&conn)?;
        let version: i32 =
            conn.query_row("SELECT max(version) FROM schema_version", [], |row| row.get(0))?;
        assert_eq!(version, SCHEMA_VERSION);
        Ok(())
    }
}
