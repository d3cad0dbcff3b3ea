// PassGuard — Data models
//
// SECURITY: password material is intentionally private on every struct that
// carries it. `UserRecord` exposes its bcrypt hash only through an explicit
// getter and redacts it from Debug output; system secrets never appear on
// `SystemRecord` at all — they travel separately as `Zeroizing<String>`.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// Privilege tiers, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    UltraAdmin,
    SuperAdmin,
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::UltraAdmin => "ultra_admin",
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "ultra_admin" => Some(Role::UltraAdmin),
            "super_admin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    /// The top two tiers bypass all category restrictions.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Role::UltraAdmin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// The fixed two-level classification for system entries. Subcategories are
/// free-form tags; categories are this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    WebSoftware,
    Database,
    Network,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::WebSoftware, Category::Database, Category::Network];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::WebSoftware => "web_software",
            Category::Database => "database",
            Category::Network => "network",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s.to_ascii_lowercase().as_str() {
            "web_software" => Some(Category::WebSoftware),
            "database" => Some(Category::Database),
            "network" => Some(Category::Network),
            _ => None,
        }
    }

    /// Keep only recognized category tags, silently dropping the rest.
    pub fn filter_valid(raw: &[String]) -> Vec<Category> {
        let mut seen = Vec::new();
        for tag in raw {
            if let Some(cat) = Category::parse(tag) {
                if !seen.contains(&cat) {
                    seen.push(cat);
                }
            }
        }
        seen
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// A stored user account. The bcrypt hash is private; access it via
/// `password_hash()` only for verification.
#[derive(Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub allowed_categories: Vec<Category>,
    pub allowed_subcategories: HashMap<Category, Vec<String>>,
    password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        email: String,
        full_name: String,
        role: Role,
        allowed_categories: Vec<Category>,
        allowed_subcategories: HashMap<Category, Vec<String>>,
        password_hash: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            full_name,
            role,
            allowed_categories,
            allowed_subcategories,
            password_hash,
            created_at,
            updated_at,
        }
    }

    /// The stored bcrypt hash, for login verification only.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// The policy-relevant snapshot of this account.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            allowed_categories: self.allowed_categories.clone(),
            allowed_subcategories: self.allowed_subcategories.clone(),
        }
    }

    /// The serializable public view (no password material).
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            allowed_categories: self.allowed_categories.clone(),
            allowed_subcategories: self.allowed_subcategories.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("allowed_categories", &self.allowed_categories)
            .field("allowed_subcategories", &self.allowed_subcategories)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Public view of a user, safe to serialize into responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub allowed_categories: Vec<Category>,
    pub allowed_subcategories: HashMap<Category, Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authenticated identity performing an operation, as consumed by the
/// access policy engine.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub allowed_categories: Vec<Category>,
    pub allowed_subcategories: HashMap<Category, Vec<String>>,
}

/// Input for creating a user. `allowed_categories` arrives as raw tags and
/// is filtered to the valid set at the store boundary; `password` is
/// plaintext here and hashed before storage.
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub allowed_categories: Vec<String>,
    pub allowed_subcategories: HashMap<Category, Vec<String>>,
}

/// Input for updating a user. `None` (or a blank string) for `password`
/// leaves the stored hash untouched.
pub struct UserUpdate {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub allowed_categories: Option<Vec<String>>,
    pub allowed_subcategories: Option<HashMap<Category, Vec<String>>>,
    pub password: Option<String>,
}

// ─── Systems ─────────────────────────────────────────────────────────────────

/// A stored system credential entry, metadata only. The encrypted secret is
/// never materialized on this struct; `SystemStore::find_by_id_with_secret`
/// returns it separately, already decrypted, as `Zeroizing<String>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub subcategory: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_by_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a system entry. `password` is plaintext and gets
/// envelope-encrypted before it reaches a row.
pub struct NewSystem {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub subcategory: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub created_by: i64,
}

/// Input for updating a system entry. All fields are written as given;
/// `password: None` clears the stored envelope.
pub struct SystemUpdate {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub subcategory: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_debug_redacts_hash() {
        let user = UserRecord::new(
            1,
            "a@b.test".to_string(),
            "Ada".to_string(),
            Role::Admin,
            vec![Category::Network],
            HashMap::new(),
            "$2b$10$abcdefghijklmnopqrstuv".to_string(),
            Utc::now(),
            Utc::now(),
        );
        let debug = format!("{:?}", user);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("$2b$10$"));
    }

    #[test]
    fn test_profile_carries_no_password() {
        let user = UserRecord::new(
            1,
            "a@b.test".to_string(),
            "Ada".to_string(),
            Role::User,
            vec![],
            HashMap::new(),
            "$2b$10$hash".to_string(),
            Utc::now(),
            Utc::now(),
        );
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("$2b$10$"));
    }

    #[test]
    fn test_category_filter_drops_unknown_tags() {
        let raw = vec![
            "network".to_string(),
            "bogus_cat".to_string(),
            "NETWORK".to_string(),
            "database".to_string(),
        ];
        let valid = Category::filter_valid(&raw);
        assert_eq!(valid, vec![Category::Network, Category::Database]);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::UltraAdmin, Role::SuperAdmin, Role::Admin, Role::User] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_role_serde_snake_case() {
        let json = serde_json::to_string(&Role::UltraAdmin).unwrap();
        assert_eq!(json, "\"ultra_admin\"");
    }

    #[test]
    fn test_unrestricted_tiers() {
        assert!(Role::UltraAdmin.is_unrestricted());
        assert!(Role::SuperAdmin.is_unrestricted());
        assert!(!Role::Admin.is_unrestricted());
        assert!(!Role::User.is_unrestricted());
    }

    #[test]
    fn test_subcategory_map_serializes_with_string_keys() {
        let mut map = HashMap::new();
        map.insert(Category::WebSoftware, vec!["cms_platforms".to_string()]);
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.contains("\"web_software\""));
    }
}
