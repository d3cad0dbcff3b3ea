// PassGuard — System Store
//
// CRUD for system credential entries. Secrets are envelope-encrypted by the
// credential cipher before insert; reads return metadata only unless the
// caller explicitly asks for the decrypted secret.

use chrono::Utc;
use rusqlite::params;
use zeroize::Zeroizing;

use crate::crypto::CredentialCipher;

use super::db::Database;
use super::models::{Category, NewSystem, SystemRecord, SystemUpdate};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over system entry storage.
pub trait SystemStore {
    fn create(&self, system: NewSystem) -> Result<SystemRecord, StoreError>;

    /// Update an entry. Returns None if no such entry exists. A `None`
    /// password clears the stored envelope.
    fn update(&self, id: i64, update: SystemUpdate) -> Result<Option<SystemRecord>, StoreError>;

    /// Metadata only, no secret.
    fn find_by_id(&self, id: i64) -> Result<Option<SystemRecord>, StoreError>;

    /// Metadata plus the decrypted secret. The inner Option is None when no
    /// envelope is stored or the stored envelope fails to decrypt.
    fn find_by_id_with_secret(
        &self,
        id: i64,
    ) -> Result<Option<(SystemRecord, Option<Zeroizing<String>>)>, StoreError>;

    /// All entries, newest first.
    fn list(&self) -> Result<Vec<SystemRecord>, StoreError>;

    fn find_by_category(&self, category: Category) -> Result<Vec<SystemRecord>, StoreError>;

    fn find_by_subcategory(
        &self,
        category: Category,
        subcategory: &str,
    ) -> Result<Vec<SystemRecord>, StoreError>;

    /// Delete an entry, returning the removed metadata if it existed.
    fn delete(&self, id: i64) -> Result<Option<SystemRecord>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteSystemStore<'a> {
    db: &'a Database,
    cipher: &'a CredentialCipher,
}

const SYSTEM_COLUMNS: &str = "s.id, s.name, s.description, s.category, s.subcategory,
     s.username, s.url, s.notes, s.created_by, u.email, s.created_at, s.updated_at";

const SYSTEM_FROM: &str = "FROM systems s LEFT JOIN users u ON u.id = s.created_by";

impl<'a> SqliteSystemStore<'a> {
    pub fn new(db: &'a Database, cipher: &'a CredentialCipher) -> Self {
        Self { db, cipher }
    }

    fn row_to_system(row: &rusqlite::Row<'_>) -> rusqlite::Result<SystemRecord> {
        let category_str: String = row.get(3)?;
        let category = Category::parse(&category_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown category '{}'", category_str).into(),
            )
        })?;

        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(SystemRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category,
            subcategory: row.get(4)?,
            username: row.get(5)?,
            url: row.get(6)?,
            notes: row.get(7)?,
            created_by: row.get(8)?,
            created_by_email: row.get(9)?,
            created_at,
            updated_at,
        })
    }

    fn fetch(&self, id: i64) -> Result<Option<SystemRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} {} WHERE s.id = ?1",
            SYSTEM_COLUMNS, SYSTEM_FROM
        ))?;
        let mut rows = stmt.query_map(params![id], Self::row_to_system)?;
        match rows.next() {
            Some(Ok(system)) => Ok(Some(system)),
            Some(Err(e)) => Err(StoreError::Database(e)),
            None => Ok(None),
        }
    }

    fn query_many(
        &self,
        where_clause: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SystemRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} {} {} ORDER BY s.created_at DESC",
            SYSTEM_COLUMNS, SYSTEM_FROM, where_clause
        ))?;
        let rows = stmt.query_map(params, Self::row_to_system)?;

        let mut systems = Vec::new();
        for row in rows {
            systems.push(row?);
        }
        Ok(systems)
    }
}

impl SystemStore for SqliteSystemStore<'_> {
    fn create(&self, system: NewSystem) -> Result<SystemRecord, StoreError> {
        let envelope = system.password.as_deref().and_then(|p| self.cipher.encrypt(p));
        let now = Utc::now().to_rfc3339();

        self.db.conn().execute(
            "INSERT INTO systems
                (name, description, category, subcategory, username, password,
                 url, notes, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                system.name,
                system.description,
                system.category.as_str(),
                system.subcategory,
                system.username,
                envelope,
                system.url,
                system.notes,
                system.created_by,
                now,
            ],
        )?;

        let id = self.db.conn().last_insert_rowid();
        tracing::info!(system_id = id, category = %system.category, "System created");

        self.fetch(id)?
            .ok_or_else(|| StoreError::Other("System vanished after insert".to_string()))
    }

    fn update(&self, id: i64, update: SystemUpdate) -> Result<Option<SystemRecord>, StoreError> {
        let envelope = update.password.as_deref().and_then(|p| self.cipher.encrypt(p));

        let affected = self.db.conn().execute(
            "UPDATE systems SET
                name = ?1, description = ?2, category = ?3, subcategory = ?4,
                username = ?5, password = ?6, url = ?7, notes = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                update.name,
                update.description,
                update.category.as_str(),
                update.subcategory,
                update.username,
                envelope,
                update.url,
                update.notes,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        if affected == 0 {
            return Ok(None);
        }
        self.fetch(id)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<SystemRecord>, StoreError> {
        self.fetch(id)
    }

    fn find_by_id_with_secret(
        &self,
        id: i64,
    ) -> Result<Option<(SystemRecord, Option<Zeroizing<String>>)>, StoreError> {
        let Some(system) = self.fetch(id)? else {
            return Ok(None);
        };

        let envelope: Option<String> = self.db.conn().query_row(
            "SELECT password FROM systems WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        // A corrupt or foreign-key envelope yields None rather than an error.
        let secret = envelope.as_deref().and_then(|e| self.cipher.decrypt(e));
        Ok(Some((system, secret)))
    }

    fn list(&self) -> Result<Vec<SystemRecord>, StoreError> {
        self.query_many("", [])
    }

    fn find_by_category(&self, category: Category) -> Result<Vec<SystemRecord>, StoreError> {
        self.query_many("WHERE s.category = ?1", params![category.as_str()])
    }

    fn find_by_subcategory(
        &self,
        category: Category,
        subcategory: &str,
    ) -> Result<Vec<SystemRecord>, StoreError> {
        self.query_many(
            "WHERE s.category = ?1 AND s.subcategory = ?2",
            params![category.as_str(), subcategory],
        )
    }

    fn delete(&self, id: i64) -> Result<Option<SystemRecord>, StoreError> {
        let Some(system) = self.fetch(id)? else {
            return Ok(None);
        };
        self.db
            .conn()
            .execute("DELETE FROM systems WHERE id = ?1", params![id])?;

        tracing::info!(system_id = id, "System deleted");
        Ok(Some(system))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
