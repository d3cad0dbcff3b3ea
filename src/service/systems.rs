// PassGuard — System service
//
// Credential entry operations, policy-checked per actor. The decrypted
// secret leaves this layer only through `get_system`, which also writes the
// SYSTEM_VIEWED audit entry.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{actions, ActivityLog};
use crate::crypto::CredentialCipher;
use crate::error::{Error, Result};
use crate::policy::{self, Operation};
use crate::store::{
    Actor, Category, Database, NewSystem, SqliteSystemStore, SystemRecord, SystemStore,
    SystemUpdate,
};

/// Create/update payload for a system entry. `category` arrives as a raw
/// tag and is validated here; an omitted `password` on update clears the
/// stored secret.
#[derive(Debug, Deserialize)]
pub struct SystemRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A single entry with its decrypted secret, returned by `get_system` only.
#[derive(Debug, Serialize)]
pub struct SystemWithSecret {
    #[serde(flatten)]
    pub system: SystemRecord,
    pub password: Option<String>,
}

pub struct SystemService<'a> {
    db: &'a Database,
    cipher: &'a CredentialCipher,
}

impl<'a> SystemService<'a> {
    pub fn new(db: &'a Database, cipher: &'a CredentialCipher) -> Self {
        Self { db, cipher }
    }

    fn store(&self) -> SqliteSystemStore<'a> {
        SqliteSystemStore::new(self.db, self.cipher)
    }

    pub fn create_system(
        &self,
        actor: &Actor,
        req: SystemRequest,
        ip: Option<&str>,
    ) -> Result<SystemRecord> {
        let (category, req) = validate(req)?;
        policy::authorize(actor, Operation::Create, category, None)?;

        let system = self.store().create(NewSystem {
            name: req.name,
            description: req.description,
            category,
            subcategory: req.subcategory,
            username: req.username,
            password: req.password,
            url: req.url,
            notes: req.notes,
            created_by: actor.id,
        })?;

        ActivityLog::new(self.db).record(
            actor.id,
            actor.role,
            actions::SYSTEM_CREATED,
            json!({ "system_id": system.id, "name": system.name, "category": system.category }),
            ip,
        )?;
        Ok(system)
    }

    pub fn update_system(
        &self,
        actor: &Actor,
        id: i64,
        req: SystemRequest,
        ip: Option<&str>,
    ) -> Result<SystemRecord> {
        let (category, req) = validate(req)?;
        let existing = self
            .store()
            .find_by_id(id)?
            .ok_or_else(|| not_found(id))?;

        // Both the current and the target category must be granted.
        policy::authorize_category_change(actor, existing.category, category)?;

        let system = self
            .store()
            .update(
                id,
                SystemUpdate {
                    name: req.name,
                    description: req.description,
                    category,
                    subcategory: req.subcategory,
                    username: req.username,
                    password: req.password,
                    url: req.url,
                    notes: req.notes,
                },
            )?
            .ok_or_else(|| not_found(id))?;

        ActivityLog::new(self.db).record(
            actor.id,
            actor.role,
            actions::SYSTEM_UPDATED,
            json!({ "system_id": system.id, "name": system.name }),
            ip,
        )?;
        Ok(system)
    }

    pub fn delete_system(&self, actor: &Actor, id: i64, ip: Option<&str>) -> Result<SystemRecord> {
        let existing = self
            .store()
            .find_by_id(id)?
            .ok_or_else(|| not_found(id))?;
        policy::authorize(actor, Operation::Delete, existing.category, None)?;

        let system = self.store().delete(id)?.ok_or_else(|| not_found(id))?;

        ActivityLog::new(self.db).record(
            actor.id,
            actor.role,
            actions::SYSTEM_DELETED,
            json!({ "system_id": system.id, "name": system.name }),
            ip,
        )?;
        Ok(system)
    }

    /// Fetch one entry with its decrypted secret. The read is audited.
    pub fn get_system(&self, actor: &Actor, id: i64, ip: Option<&str>) -> Result<SystemWithSecret> {
        let (system, secret) = self
            .store()
            .find_by_id_with_secret(id)?
            .ok_or_else(|| not_found(id))?;

        policy::authorize(
            actor,
            Operation::View,
            system.category,
            system.subcategory.as_deref(),
        )?;

        ActivityLog::new(self.db).record(
            actor.id,
            actor.role,
            actions::SYSTEM_VIEWED,
            json!({ "system_id": system.id, "name": system.name }),
            ip,
        )?;

        let password = secret.map(|s| s.to_string());
        Ok(SystemWithSecret { system, password })
    }

    /// Every entry this actor may see, newest first, metadata only.
    pub fn accessible_systems(&self, actor: &Actor) -> Result<Vec<SystemRecord>> {
        let all = self.store().list()?;
        Ok(policy::filter_accessible(actor, all))
    }

    /// Entries in one category (optionally one subcategory), narrowed to
    /// the actor's grants.
    pub fn systems_by_category(
        &self,
        actor: &Actor,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<Vec<SystemRecord>> {
        let category = parse_category(category)?;
        let systems = match subcategory {
            Some(sub) => self.store().find_by_subcategory(category, sub)?,
            None => self.store().find_by_category(category)?,
        };
        Ok(policy::filter_accessible(actor, systems))
    }
}

fn validate(req: SystemRequest) -> Result<(Category, SystemRequest)> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("System name is required".to_string()));
    }
    let category = parse_category(&req.category)?;
    Ok((category, req))
}

fn parse_category(raw: &str) -> Result<Category> {
    Category::parse(raw)
        .ok_or_else(|| Error::Validation(format!("Unknown category '{}'", raw)))
}

fn not_found(id: i64) -> Error {
    Error::NotFound(format!("System {} not found", id))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
