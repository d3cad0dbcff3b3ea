// PassGuard — User Store
//
// CRUD for user accounts. Key rules enforced here:
//   - duplicate emails surface as `DuplicateEmail` (unique constraint)
//   - `allowed_categories` is filtered to the valid set, silently
//   - blank/omitted passwords on update leave the stored hash untouched
//   - the `ultra_admin` account can never be deleted; deleting anyone else
//     cascades their activity-log rows inside the same transaction

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::params;

use crate::crypto;

use super::db::Database;
use super::models::{Category, NewUser, Role, UserRecord, UserUpdate};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over user account storage.
pub trait UserStore {
    /// Create a user, hashing the password and filtering category grants.
    fn create(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Update a user. Returns None if no such user exists.
    fn update(&self, id: i64, update: UserUpdate) -> Result<Option<UserRecord>, StoreError>;

    /// Replace a user's password hash (for the change-password flow).
    fn set_password(&self, id: i64, new_password: &str) -> Result<bool, StoreError>;

    fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError>;

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// All accounts except the hidden `ultra_admin`, newest first.
    fn list(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Delete a user and their activity logs atomically. Returns the
    /// deleted record, or None when the user is missing OR is the
    /// `ultra_admin` (whose deletion is refused, row left intact).
    fn delete(&self, id: i64) -> Result<Option<UserRecord>, StoreError>;

    fn is_ultra_admin(&self, id: i64) -> Result<bool, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteUserStore<'a> {
    db: &'a Database,
}

const USER_COLUMNS: &str = "id, email, password_hash, role, full_name,
     allowed_categories, allowed_subcategories, created_at, updated_at";

impl<'a> SqliteUserStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Seed the sole `ultra_admin` account inside a transaction. Returns the
    /// new id, or None if an ultra_admin already exists (idempotent init).
    pub fn ensure_ultra_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<i64>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        let existing: i64 = tx.query_row(
            "SELECT count(*) FROM users WHERE role = 'ultra_admin'",
            [],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(None);
        }

        let hash = crypto::hash_password(password)
            .map_err(|e| StoreError::Password(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let all: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();

        tx.execute(
            "INSERT INTO users
                (email, password_hash, role, full_name,
                 allowed_categories, allowed_subcategories, created_at, updated_at)
             VALUES (?1, ?2, 'ultra_admin', 'Ultra Admin', ?3, '{}', ?4, ?4)",
            params![email, hash, serde_json::to_string(&all)?, now],
        )
        .map_err(|e| map_unique_violation(email, e))?;

        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(user_id = id, "Seeded ultra_admin account");
        Ok(Some(id))
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
        let id: i64 = row.get(0)?;
        let email: String = row.get(1)?;
        let password_hash: String = row.get(2)?;
        let role_str: String = row.get(3)?;
        let full_name: String = row.get(4)?;
        let categories_json: String = row.get(5)?;
        let subcategories_json: String = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        let role = Role::parse(&role_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown role '{}'", role_str).into(),
            )
        })?;

        let raw_categories: Vec<String> =
            serde_json::from_str(&categories_json).unwrap_or_default();
        let allowed_categories = Category::filter_valid(&raw_categories);
        let allowed_subcategories: HashMap<Category, Vec<String>> =
            serde_json::from_str(&subcategories_json).unwrap_or_default();

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(UserRecord::new(
            id,
            email,
            full_name,
            role,
            allowed_categories,
            allowed_subcategories,
            password_hash,
            created_at,
            updated_at,
        ))
    }

    fn fetch(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], Self::row_to_user)?;
        match rows.next() {
            Some(Ok(user)) => Ok(Some(user)),
            Some(Err(e)) => Err(StoreError::Database(e)),
            None => Ok(None),
        }
    }
}

impl UserStore for SqliteUserStore<'_> {
    fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let valid_categories = Category::filter_valid(&user.allowed_categories);
        let categories_json: Vec<&str> =
            valid_categories.iter().map(|c| c.as_str()).collect();

        let hash = crypto::hash_password(&user.password)
            .map_err(|e| StoreError::Password(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.db
            .conn()
            .execute(
                "INSERT INTO users
                    (email, password_hash, role, full_name,
                     allowed_categories, allowed_subcategories, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    user.email,
                    hash,
                    user.role.as_str(),
                    user.full_name,
                    serde_json::to_string(&categories_json)?,
                    serde_json::to_string(&user.allowed_subcategories)?,
                    now,
                ],
            )
            .map_err(|e| map_unique_violation(&user.email, e))?;

        let id = self.db.conn().last_insert_rowid();
        tracing::info!(user_id = id, role = %user.role, "User created");

        self.fetch(id)?
            .ok_or_else(|| StoreError::Other("User vanished after insert".to_string()))
    }

    fn update(&self, id: i64, update: UserUpdate) -> Result<Option<UserRecord>, StoreError> {
        let now = Utc::now().to_rfc3339();

        let mut sql = String::from(
            "UPDATE users SET email = ?1, full_name = ?2, role = ?3, updated_at = ?4",
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(update.email.clone()),
            Box::new(update.full_name),
            Box::new(update.role.as_str()),
            Box::new(now),
        ];

        if let Some(raw) = update.allowed_categories {
            let valid: Vec<&str> = Category::filter_valid(&raw)
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>();
            sql.push_str(&format!(", allowed_categories = ?{}", values.len() + 1));
            values.push(Box::new(serde_json::to_string(&valid)?));
        }

        if let Some(subs) = update.allowed_subcategories {
            sql.push_str(&format!(", allowed_subcategories = ?{}", values.len() + 1));
            values.push(Box::new(serde_json::to_string(&subs)?));
        }

        // A blank password means "keep the current one".
        if let Some(password) = update.password.filter(|p| !p.trim().is_empty()) {
            let hash = crypto::hash_password(&password)
                .map_err(|e| StoreError::Password(e.to_string()))?;
            sql.push_str(&format!(", password_hash = ?{}", values.len() + 1));
            values.push(Box::new(hash));
        }

        sql.push_str(&format!(" WHERE id = ?{}", values.len() + 1));
        values.push(Box::new(id));

        let affected = self
            .db
            .conn()
            .execute(&sql, rusqlite::params_from_iter(values.iter()))
            .map_err(|e| map_unique_violation(&update.email, e))?;

        if affected == 0 {
            return Ok(None);
        }
        self.fetch(id)
    }

    fn set_password(&self, id: i64, new_password: &str) -> Result<bool, StoreError> {
        let hash = crypto::hash_password(new_password)
            .map_err(|e| StoreError::Password(e.to_string()))?;
        let affected = self.db.conn().execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![hash, Utc::now().to_rfc3339(), id],
        )?;
        Ok(affected > 0)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        self.fetch(id)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![email], Self::row_to_user)?;
        match rows.next() {
            Some(Ok(user)) => Ok(Some(user)),
            Some(Err(e)) => Err(StoreError::Database(e)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} FROM users WHERE role != 'ultra_admin' ORDER BY created_at DESC",
            USER_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn delete(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;

        let user = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM users WHERE id = ?1",
                USER_COLUMNS
            ))?;
            let mut rows = stmt.query_map(params![id], Self::row_to_user)?;
            match rows.next() {
                Some(Ok(user)) => user,
                Some(Err(e)) => return Err(StoreError::Database(e)),
                None => return Ok(None),
            }
        };

        // The top tier is protected from removal, API-driven or otherwise.
        if user.role == Role::UltraAdmin {
            return Ok(None);
        }

        // Cascade the audit trail first, then the account, atomically.
        tx.execute("DELETE FROM activity_logs WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        tx.commit()?;

        tracing::info!(user_id = id, "User deleted");
        Ok(Some(user))
    }

    fn is_ultra_admin(&self, id: i64) -> Result<bool, StoreError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT role FROM users WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(role)) => Ok(role == "ultra_admin"),
            Some(Err(e)) => Err(StoreError::Database(e)),
            None => Ok(false),
        }
    }
}

fn map_unique_violation(email: &str, err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::DuplicateEmail(email.to_string());
        }
    }
    StoreError::Database(err)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, role: Role, categories: &[&str]) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: "initial-pass".to_string(),
            full_name: "Test User".to_string(),
            role,
            allowed_categories: categories.iter().map(|s| s.to_string()).collect(),
            allowed_subcategories: HashMap::new(),
        }
    }

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        let user = store
            .create(new_user("ada@example.test", Role::Admin, &["network"]))
            .unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.allowed_categories, vec![Category::Network]);
        assert!(crypto::verify_password("initial-pass", user.password_hash()));

        let found = store.find_by_email("ada@example.test").unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        store
            .create(new_user("dup@example.test", Role::User, &[]))
            .unwrap();
        let err = store
            .create(new_user("dup@example.test", Role::User, &[]))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[test]
    fn test_invalid_categories_silently_dropped() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        let user = store
            .create(new_user(
                "cats@example.test",
                Role::Admin,
                &["network", "bogus_cat"],
            ))
            .unwrap();
        assert_eq!(user.allowed_categories, vec![Category::Network]);

        // The bogus tag must not have been persisted either.
        let stored: String = db
            .conn()
            .query_row(
                "SELECT allowed_categories FROM users WHERE id = ?1",
                params![user.id],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!stored.contains("bogus_cat"));
    }

    #[test]
    fn test_update_blank_password_keeps_hash() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        let user = store
            .create(new_user("keep@example.test", Role::User, &[]))
            .unwrap();
        let original_hash = user.password_hash().to_string();

        let updated = store
            .update(
                user.id,
                UserUpdate {
                    email: user.email.clone(),
                    full_name: "Renamed".to_string(),
                    role: user.role,
                    allowed_categories: None,
                    allowed_subcategories: None,
                    password: Some("   ".to_string()),
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.full_name, "Renamed");
        assert_eq!(updated.password_hash(), original_hash);
    }

    #[test]
    fn test_update_with_password_rehashes() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        let user = store
            .create(new_user("rehash@example.test", Role::User, &[]))
            .unwrap();

        let updated = store
            .update(
                user.id,
                UserUpdate {
                    email: user.email.clone(),
                    full_name: user.full_name.clone(),
                    role: user.role,
                    allowed_categories: None,
                    allowed_subcategories: None,
                    password: Some("fresh-pass".to_string()),
                },
            )
            .unwrap()
            .unwrap();

        assert!(crypto::verify_password("fresh-pass", updated.password_hash()));
        assert!(!crypto::verify_password("initial-pass", updated.password_hash()));
    }

    #[test]
    fn test_update_missing_user_returns_none() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);
        let result = store
            .update(
                999,
                UserUpdate {
                    email: "ghost@example.test".to_string(),
                    full_name: "Ghost".to_string(),
                    role: Role::User,
                    allowed_categories: None,
                    allowed_subcategories: None,
                    password: None,
                },
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_list_excludes_ultra_admin() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        store.ensure_ultra_admin("root@example.test", "rootpass").unwrap();
        store
            .create(new_user("visible@example.test", Role::User, &[]))
            .unwrap();

        let users = store.list().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "visible@example.test");
    }

    #[test]
    fn test_delete_cascades_activity_logs() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        let user = store
            .create(new_user("gone@example.test", Role::User, &[]))
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO activity_logs (user_id, action, details, created_at)
                 VALUES (?1, 'USER_LOGIN', '{}', ?2)",
                params![user.id, Utc::now().to_rfc3339()],
            )
            .unwrap();

        let deleted = store.delete(user.id).unwrap();
        assert!(deleted.is_some());

        let logs: i64 = db
            .conn()
            .query_row(
                "SELECT count(*) FROM activity_logs WHERE user_id = ?1",
                params![user.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(logs, 0, "Activity logs must be deleted with the user");
    }

    #[test]
    fn test_delete_ultra_admin_refused() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        let id = store
            .ensure_ultra_admin("root@example.test", "rootpass")
            .unwrap()
            .unwrap();

        let result = store.delete(id).unwrap();
        assert!(result.is_none(), "ultra_admin deletion must be refused");

        // The row must be intact.
        assert!(store.find_by_id(id).unwrap().is_some());
    }

    #[test]
    fn test_seed_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        assert!(store
            .ensure_ultra_admin("root@example.test", "rootpass")
            .unwrap()
            .is_some());
        assert!(store
            .ensure_ultra_admin("other@example.test", "otherpass")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_is_ultra_admin() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteUserStore::new(&db);

        let root_id = store
            .ensure_ultra_admin("root@example.test", "rootpass")
            .unwrap()
            .unwrap();
        let plain = store
            .create(new_user("plain@example.test", Role::User, &[]))
            .unwrap();

        assert!(store.is_ultra_admin(root_id).unwrap());
        assert!(!store.is_ultra_admin(plain.id).unwrap());
        assert!(!store.is_ultra_admin(9999).unwrap());
    }
}
