// PassGuard — User service
//
// Account management. Creating, listing, updating and deleting accounts is
// reserved for the top two tiers; everyone may read and edit their own
// profile, minus role and grant changes. The hidden tier is invisible
// through every path here.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::audit::{actions, ActivityLog};
use crate::error::{Error, Result};
use crate::mailer::Mailer;
use crate::store::{
    Actor, Category, Database, NewUser, Role, SqliteUserStore, UserProfile, UserUpdate,
    UserStore,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub allowed_categories: Vec<String>,
    #[serde(default)]
    pub allowed_subcategories: HashMap<Category, Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub allowed_categories: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_subcategories: Option<HashMap<Category, Vec<String>>>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_role() -> Role {
    Role::User
}

pub struct UserService<'a> {
    db: &'a Database,
    mailer: &'a dyn Mailer,
}

impl<'a> UserService<'a> {
    pub fn new(db: &'a Database, mailer: &'a dyn Mailer) -> Self {
        Self { db, mailer }
    }

    fn store(&self) -> SqliteUserStore<'a> {
        SqliteUserStore::new(self.db)
    }

    /// Provision an account on someone's behalf. Top two tiers only. The
    /// welcome mail is best effort and never fails the operation.
    pub fn create_user(
        &self,
        actor: &Actor,
        req: CreateUserRequest,
        ip: Option<&str>,
    ) -> Result<UserProfile> {
        require_admin_tier(actor)?;
        if req.role == Role::UltraAdmin {
            return Err(Error::Validation(
                "This role cannot be assigned".to_string(),
            ));
        }
        if req.password.len() < 8 {
            return Err(Error::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let temporary_password = req.password.clone();
        let user = self.store().create(NewUser {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            role: req.role,
            allowed_categories: req.allowed_categories,
            allowed_subcategories: req.allowed_subcategories,
        })?;

        match self
            .mailer
            .send_welcome_email(&user.email, &user.full_name, &temporary_password)
        {
            Ok(receipt) if receipt.success => {}
            Ok(_) => tracing::warn!(user_id = user.id, "Welcome email not delivered"),
            Err(e) => tracing::warn!(user_id = user.id, error = %e, "Welcome email failed"),
        }

        ActivityLog::new(self.db).record(
            actor.id,
            actor.role,
            actions::USER_CREATED,
            json!({ "user_id": user.id, "email": user.email, "role": user.role }),
            ip,
        )?;
        Ok(user.profile())
    }

    /// All visible accounts. Top two tiers only.
    pub fn list_users(&self, actor: &Actor) -> Result<Vec<UserProfile>> {
        require_admin_tier(actor)?;
        let users = self.store().list()?;
        Ok(users.iter().map(|u| u.profile()).collect())
    }

    /// One profile: your own, or any (non-hidden) account for the top tiers.
    pub fn get_user(&self, actor: &Actor, id: i64) -> Result<UserProfile> {
        if actor.id != id {
            require_admin_tier(actor)?;
        }
        let user = self
            .store()
            .find_by_id(id)?
            .ok_or_else(|| not_found(id))?;

        // The hidden account is only visible to itself.
        if user.role == Role::UltraAdmin && actor.id != id {
            return Err(not_found(id));
        }
        Ok(user.profile())
    }

    /// Update an account. Self-updates keep the existing role and grants.
    pub fn update_user(
        &self,
        actor: &Actor,
        id: i64,
        req: UpdateUserRequest,
        ip: Option<&str>,
    ) -> Result<UserProfile> {
        let self_update = actor.id == id;
        if !self_update {
            require_admin_tier(actor)?;
        }

        let existing = self
            .store()
            .find_by_id(id)?
            .ok_or_else(|| not_found(id))?;
        if existing.role == Role::UltraAdmin && !self_update {
            return Err(not_found(id));
        }

        let update = if self_update && !actor.role.is_unrestricted() {
            UserUpdate {
                email: req.email,
                full_name: req.full_name,
                role: existing.role,
                allowed_categories: None,
                allowed_subcategories: None,
                password: req.password,
            }
        } else {
            if req.role == Role::UltraAdmin && existing.role != Role::UltraAdmin {
                return Err(Error::Validation(
                    "This role cannot be assigned".to_string(),
                ));
            }
            UserUpdate {
                email: req.email,
                full_name: req.full_name,
                role: req.role,
                allowed_categories: req.allowed_categories,
                allowed_subcategories: req.allowed_subcategories,
                password: req.password,
            }
        };

        let user = self
            .store()
            .update(id, update)?
            .ok_or_else(|| not_found(id))?;

        ActivityLog::new(self.db).record(
            actor.id,
            actor.role,
            actions::USER_UPDATED,
            json!({ "user_id": user.id, "email": user.email }),
            ip,
        )?;
        Ok(user.profile())
    }

    /// Remove an account and its audit trail. Top two tiers only; nobody
    /// deletes themselves, and the hidden account is untouchable.
    pub fn delete_user(&self, actor: &Actor, id: i64, ip: Option<&str>) -> Result<UserProfile> {
        require_admin_tier(actor)?;
        if actor.id == id {
            return Err(Error::Validation(
                "You cannot delete your own account".to_string(),
            ));
        }

        // The store refuses ultra_admin deletion by returning None, which
        // surfaces as NotFound and keeps the account invisible.
        let user = self.store().delete(id)?.ok_or_else(|| not_found(id))?;

        ActivityLog::new(self.db).record(
            actor.id,
            actor.role,
            actions::USER_DELETED,
            json!({ "user_id": user.id, "email": user.email }),
            ip,
        )?;
        Ok(user.profile())
    }
}

fn require_admin_tier(actor: &Actor) -> Result<()> {
    if actor.role.is_unrestricted() {
        return Ok(());
    }
    Err(Error::Unauthorized(
        "Your role does not permit managing accounts".to_string(),
    ))
}

fn not_found(id: i64) -> Error {
    Error::NotFound(format!("User {} not found", id))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
