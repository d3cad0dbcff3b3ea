// PassGuard — Authentication service
//
// Self-service flows: register, login, change password. Login failures are
// deliberately indistinguishable (unknown email vs wrong password) and every
// successful flow lands in the activity log, hidden tier excepted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{actions, ActivityLog};
use crate::crypto::{self, TokenSigner};
use crate::error::{Error, Result};
use crate::store::{Database, NewUser, Role, SqliteUserStore, UserProfile, UserStore};

/// Self-registration input. Role defaults to the lowest tier; the hidden
/// tier can never be self-assigned.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

/// A successful login or registration: the profile plus a bearer token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

pub struct AuthService<'a> {
    db: &'a Database,
    signer: &'a TokenSigner,
}

impl<'a> AuthService<'a> {
    pub fn new(db: &'a Database, signer: &'a TokenSigner) -> Self {
        Self { db, signer }
    }

    pub fn register(&self, req: RegisterRequest, ip: Option<&str>) -> Result<AuthResponse> {
        validate_email(&req.email)?;
        validate_password(&req.password)?;
        if req.role == Role::UltraAdmin {
            return Err(Error::Validation(
                "This role cannot be self-assigned".to_string(),
            ));
        }

        let users = SqliteUserStore::new(self.db);
        let user = users.create(NewUser {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            role: req.role,
            allowed_categories: vec![],
            allowed_subcategories: HashMap::new(),
        })?;

        ActivityLog::new(self.db).record(
            user.id,
            user.role,
            actions::USER_REGISTERED,
            json!({ "email": user.email }),
            ip,
        )?;

        let token = self.signer.issue(user.id, &user.email, user.role)?;
        tracing::info!(user_id = user.id, "User registered");
        Ok(AuthResponse {
            token,
            user: user.profile(),
        })
    }

    pub fn login(&self, email: &str, password: &str, ip: Option<&str>) -> Result<AuthResponse> {
        let users = SqliteUserStore::new(self.db);

        // Same error for unknown email and bad password.
        let user = users
            .find_by_email(email)?
            .ok_or_else(invalid_credentials)?;
        if !crypto::verify_password(password, user.password_hash()) {
            tracing::debug!(%email, "Login failed");
            return Err(invalid_credentials());
        }

        ActivityLog::new(self.db).record(
            user.id,
            user.role,
            actions::USER_LOGIN,
            json!({ "email": user.email }),
            ip,
        )?;

        let token = self.signer.issue(user.id, &user.email, user.role)?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(AuthResponse {
            token,
            user: user.profile(),
        })
    }

    pub fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new_password: &str,
        ip: Option<&str>,
    ) -> Result<()> {
        validate_password(new_password)?;

        let users = SqliteUserStore::new(self.db);
        let user = users
            .find_by_id(user_id)?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        if !crypto::verify_password(current, user.password_hash()) {
            return Err(Error::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        users.set_password(user_id, new_password)?;
        ActivityLog::new(self.db).record(
            user.id,
            user.role,
            actions::PASSWORD_CHANGED,
            json!({}),
            ip,
        )?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }
}

fn invalid_credentials() -> Error {
    Error::Unauthorized("Invalid credentials".to_string())
}

fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(Error::Validation("A valid email is required".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(Error::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-token-secret", Duration::from_secs(3600))
    }

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "long-enough-pass".to_string(),
            full_name: "Someone".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn test_register_then_login() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);

        let registered = auth.register(register_req("a@example.test"), None).unwrap();
        assert_eq!(registered.user.email, "a@example.test");
        assert!(!registered.token.is_empty());

        let logged_in = auth
            .login("a@example.test", "long-enough-pass", None)
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let claims = signer.verify(&logged_in.token).unwrap();
        assert_eq!(claims.sub, registered.user.id);
    }

    #[test]
    fn test_register_rejects_hidden_role() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);

        let mut req = register_req("root@example.test");
        req.role = Role::UltraAdmin;
        assert!(matches!(
            auth.register(req, None).unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[test]
    fn test_duplicate_registration_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);

        auth.register(register_req("dup@example.test"), None).unwrap();
        assert!(matches!(
            auth.register(register_req("dup@example.test"), None)
                .unwrap_err(),
            Error::Conflict(_)
        ));
    }

    #[test]
    fn test_login_failures_are_uniform() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);
        auth.register(register_req("a@example.test"), None).unwrap();

        let unknown = auth
            .login("nobody@example.test", "whatever-pass", None)
            .unwrap_err();
        let wrong = auth
            .login("a@example.test", "wrong-password", None)
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_login_is_audited() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);

        auth.register(register_req("a@example.test"), Some("10.0.0.9"))
            .unwrap();
        auth.login("a@example.test", "long-enough-pass", Some("10.0.0.9"))
            .unwrap();

        let log = ActivityLog::new(&db);
        let entries = log.list(None, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, actions::USER_LOGIN);
        assert_eq!(entries[1].action, actions::USER_REGISTERED);
    }

    #[test]
    fn test_ultra_admin_login_leaves_no_trail() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);

        SqliteUserStore::new(&db)
            .ensure_ultra_admin("root@example.test", "rootpass-long")
            .unwrap();
        auth.login("root@example.test", "rootpass-long", None).unwrap();

        assert_eq!(ActivityLog::new(&db).count(true).unwrap(), 0);
    }

    #[test]
    fn test_change_password() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);

        let registered = auth.register(register_req("a@example.test"), None).unwrap();
        auth.change_password(
            registered.user.id,
            "long-enough-pass",
            "fresh-new-pass",
            None,
        )
        .unwrap();

        assert!(auth.login("a@example.test", "long-enough-pass", None).is_err());
        assert!(auth.login("a@example.test", "fresh-new-pass", None).is_ok());
    }

    #[test]
    fn test_change_password_requires_current() {
        let db = Database::open_in_memory().unwrap();
        let signer = signer();
        let auth = AuthService::new(&db, &signer);

        let registered = auth.register(register_req("a@example.test"), None).unwrap();
        assert!(matches!(
            auth.change_password(registered.user.id, "not-the-pass", "fresh-new-pass", None)
                .unwrap_err(),
            Error::Unauthorized(_)
        ));
    }
}
