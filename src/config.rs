// PassGuard — Process configuration
//
// All configuration comes from the environment and is validated once at
// startup. Required values (encryption key, token secret) abort the process
// with a `Validation` error before any request is served; optional values
// carry the documented defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Required length of the credential encryption key, in bytes.
pub const ENCRYPTION_KEY_LEN: usize = 32;

const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_RATE_WINDOW_SECS: u64 = 900;
const DEFAULT_RATE_MAX: u32 = 100;

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// 32-character key for the credential cipher.
    pub encryption_key: String,
    /// HS256 signing secret for bearer tokens.
    pub token_secret: String,
    /// Token lifetime.
    pub token_ttl: Duration,
    /// Allowed origin, forwarded to any fronting HTTP layer.
    pub cors_origin: String,
    /// Rate-limit window applied per gateway connection.
    pub rate_window: Duration,
    /// Maximum requests per window per connection.
    pub rate_max: u32,
    /// Gateway socket path.
    pub socket_path: PathBuf,
}

impl Config {
    /// Load and validate configuration from the environment.
    /// Fails fast on a missing token secret or a key that is not exactly
    /// 32 characters; the process must not start with a bad key.
    pub fn from_env() -> Result<Self> {
        let encryption_key = require_env("PASSGUARD_ENCRYPTION_KEY")?;
        if encryption_key.len() != ENCRYPTION_KEY_LEN {
            return Err(Error::Validation(format!(
                "PASSGUARD_ENCRYPTION_KEY must be exactly {} characters long (got {})",
                ENCRYPTION_KEY_LEN,
                encryption_key.len()
            )));
        }

        let token_secret = require_env("PASSGUARD_TOKEN_SECRET")?;

        let token_ttl = Duration::from_secs(parse_env(
            "PASSGUARD_TOKEN_TTL_SECS",
            DEFAULT_TOKEN_TTL_SECS,
        )?);
        let rate_window = Duration::from_secs(parse_env(
            "PASSGUARD_RATE_WINDOW_SECS",
            DEFAULT_RATE_WINDOW_SECS,
        )?);
        let rate_max = parse_env("PASSGUARD_RATE_MAX", DEFAULT_RATE_MAX)?;

        let cors_origin = std::env::var("PASSGUARD_CORS_ORIGIN")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string());

        let db_path = std::env::var("PASSGUARD_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());

        let socket_path = std::env::var("PASSGUARD_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_socket_path());

        Ok(Self {
            db_path,
            encryption_key,
            token_secret,
            token_ttl,
            cors_origin,
            rate_window,
            rate_max,
            socket_path,
        })
    }
}

/// Default database path: `<platform data dir>/passguard/passguard.db`.
pub fn default_db_path() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("passguard").join("passguard.db")
}

/// Default socket path: `$XDG_RUNTIME_DIR/passguard/passguard.sock`,
/// falling back to `/tmp/passguard/passguard.sock`.
pub fn default_socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"));
    runtime_dir.join("passguard").join("passguard.sock")
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Validation(format!("{} must be set", name)))
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Validation(format!("{} is not a valid value", name))),
        Err(_) => Ok(default),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
