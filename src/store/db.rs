// PassGuard — Database Management
//
// Opens the SQLite database and runs schema migrations. Two aggregates
// (`users`, `systems`) replace the polymorphic single-table layout of
// earlier designs; `activity_logs` references actors by explicit FK.

use std::path::Path;

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around the SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at the given path and ensure the
    /// schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Other(format!("Cannot create data dir: {}", e)))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// In-memory database for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id                     INTEGER PRIMARY KEY AUTOINCREMENT,
                email                  TEXT NOT NULL UNIQUE,
                password_hash          TEXT NOT NULL,
                role                   TEXT NOT NULL,
                full_name              TEXT NOT NULL DEFAULT '',
                allowed_categories     TEXT NOT NULL DEFAULT '[]',
                allowed_subcategories  TEXT NOT NULL DEFAULT '{}',
                created_at             TEXT NOT NULL,
                updated_at             TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS systems (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                name          TEXT NOT NULL,
                description   TEXT,
                category      TEXT NOT NULL,
                subcategory   TEXT,
                username      TEXT,
                password      TEXT,
                url           TEXT,
                notes         TEXT,
                created_by    INTEGER NOT NULL REFERENCES users(id),
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS activity_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                action      TEXT NOT NULL,
                details     TEXT NOT NULL DEFAULT '{}',
                ip_address  TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_systems_category
                ON systems(category, subcategory);
            CREATE INDEX IF NOT EXISTS idx_activity_user
                ON activity_logs(user_id);
            ",
        )?;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
