// PassGuard — CLI Command Handlers
//
// Each function handles one CLI subcommand. Maintenance commands talk to
// the store directly and only need the database path; `serve` loads the
// full environment configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::audit::ActivityLog;
use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::gateway::UdsServer;
use crate::store::{Database, NewUser, Role, SqliteUserStore, UserStore};

use super::Commands;

/// Database path for maintenance commands: `PASSGUARD_DB` or the platform
/// default.
fn db_path() -> PathBuf {
    std::env::var("PASSGUARD_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config::default_db_path())
}

/// Execute the parsed CLI command.
pub async fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Init { email, password } => cmd_init(email, password),
        Commands::Serve => cmd_serve().await,
        Commands::AddUser {
            email,
            password,
            full_name,
            role,
            categories,
        } => cmd_add_user(email, password, full_name, role, categories),
        Commands::ListUsers => cmd_list_users(),
        Commands::DeleteUser { id } => cmd_delete_user(id),
        Commands::Activity {
            include_privileged,
            limit,
            offset,
        } => cmd_activity(include_privileged, limit, offset),
    }
}

// ─── Init & Serve ────────────────────────────────────────────────────────────

fn cmd_init(email: String, password: String) -> Result<()> {
    let db = Database::open(&db_path())?;
    let users = SqliteUserStore::new(&db);

    match users.ensure_ultra_admin(&email, &password)? {
        Some(id) => println!("✓ Root account seeded (id {})", id),
        None => println!("Root account already exists, nothing to do"),
    }
    Ok(())
}

async fn cmd_serve() -> Result<()> {
    let config = Config::from_env()?;

    // Open eagerly so schema problems surface before we bind the socket.
    let _db = Database::open(&config.db_path)?;

    let server = UdsServer::from_config(&config)?;
    server
        .run()
        .await
        .map_err(|e| Error::Internal(format!("Gateway failed: {}", e)))
}

// ─── User Maintenance ────────────────────────────────────────────────────────

fn cmd_add_user(
    email: String,
    password: String,
    full_name: String,
    role: String,
    categories: String,
) -> Result<()> {
    let role = Role::parse(&role)
        .ok_or_else(|| Error::Validation(format!("Unknown role '{}'", role)))?;
    if role == Role::UltraAdmin {
        return Err(Error::Validation(
            "Use 'init' to seed the root account".to_string(),
        ));
    }

    let allowed_categories: Vec<String> = categories
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let db = Database::open(&db_path())?;
    let user = SqliteUserStore::new(&db).create(NewUser {
        email,
        password,
        full_name,
        role,
        allowed_categories,
        allowed_subcategories: HashMap::new(),
    })?;

    println!("✓ User {} created (id {}, role {})", user.email, user.id, user.role);
    Ok(())
}

fn cmd_list_users() -> Result<()> {
    let db = Database::open(&db_path())?;
    let users = SqliteUserStore::new(&db).list()?;

    if users.is_empty() {
        println!("No user accounts found.");
        return Ok(());
    }

    println!("{:<6} {:<30} {:<12} CATEGORIES", "ID", "EMAIL", "ROLE");
    println!("{:-<80}", "");
    for user in users {
        let categories: Vec<&str> =
            user.allowed_categories.iter().map(|c| c.as_str()).collect();
        println!(
            "{:<6} {:<30} {:<12} {}",
            user.id,
            user.email,
            user.role,
            categories.join(", ")
        );
    }
    Ok(())
}

fn cmd_delete_user(id: i64) -> Result<()> {
    let db = Database::open(&db_path())?;

    match SqliteUserStore::new(&db).delete(id)? {
        Some(user) => println!("✓ User {} deleted", user.email),
        None => println!("User not found: {}", id),
    }
    Ok(())
}

// ─── Activity ────────────────────────────────────────────────────────────────

fn cmd_activity(include_privileged: bool, limit: Option<u32>, offset: u32) -> Result<()> {
    let db = Database::open(&db_path())?;
    let log = ActivityLog::new(&db);

    let entries = if include_privileged {
        log.list_including_privileged(limit, offset)?
    } else {
        log.list(limit, offset)?
    };

    if entries.is_empty() {
        println!("No activity recorded.");
        return Ok(());
    }

    println!("{:-<80}", "");
    for entry in entries {
        println!(
            "{}  {:<18} {:<30} {}",
            entry.created_at.to_rfc3339(),
            entry.action,
            entry.user_email.as_deref().unwrap_or("<deleted user>"),
            entry.details
        );
    }
    println!("{:-<80}", "");
    Ok(())
}
