// PassGuard — Unix Domain Socket Server
//
// Newline-delimited JSON-RPC 2.0 over a local socket. Each connection runs
// in its own tokio task with a per-connection rate limiter. Every method
// except `register` and `login` requires a bearer token in `params.token`;
// the actor is reloaded from the database on every request so revoked
// accounts and changed grants take effect immediately.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use crate::auth::{AuthService, RegisterRequest};
use crate::config::Config;
use crate::crypto::{CredentialCipher, TokenSigner};
use crate::error::Error;
use crate::mailer::LogMailer;
use crate::service::{CreateUserRequest, SystemRequest, UpdateUserRequest, UserService};
use crate::service::SystemService;
use crate::store::{Actor, Database, SqliteUserStore, UserStore};

use super::protocol::{JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST, METHOD_NOT_FOUND, RATE_LIMITED};

/// Shared server state, cheap to clone behind an Arc.
pub struct GatewayState {
    db_path: PathBuf,
    cipher: CredentialCipher,
    signer: TokenSigner,
    rate_window: Duration,
    rate_max: u32,
    mailer: LogMailer,
}

/// Unix Domain Socket server for PassGuard.
pub struct UdsServer {
    socket_path: PathBuf,
    state: Arc<GatewayState>,
}

impl UdsServer {
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let cipher = CredentialCipher::new(&config.encryption_key)?;
        let signer = TokenSigner::new(&config.token_secret, config.token_ttl);
        Ok(Self {
            socket_path: config.socket_path.clone(),
            state: Arc::new(GatewayState {
                db_path: config.db_path.clone(),
                cipher,
                signer,
                rate_window: config.rate_window,
                rate_max: config.rate_max,
                mailer: LogMailer,
            }),
        })
    }

    /// Start the server. Runs until the process is terminated.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove a stale socket left by a previous run.
        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(
            socket = %self.socket_path.display(),
            "PassGuard UDS server listening"
        );

        // Owner-only socket.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        loop {
            let (stream, _addr) = listener.accept().await?;
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, state).await {
                    tracing::error!("Connection handler error: {}", e);
                }
            });
        }
    }
}

/// Handle one client connection: newline-delimited requests in, responses
/// out, one rate-limit budget for the whole connection.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    state: Arc<GatewayState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = {
        #[cfg(target_os = "linux")]
        {
            stream
                .peer_cred()
                .ok()
                .and_then(|c| c.pid())
                .map(|pid| format!("uds:pid={}", pid))
                .unwrap_or_else(|| "uds:client".to_string())
        }
        #[cfg(not(target_os = "linux"))]
        {
            "uds:client".to_string()
        }
    };
    tracing::debug!(%client, "Client connected");

    let db = Database::open(&state.db_path)?;
    let mut limiter = RateLimiter::new(state.rate_window, state.rate_max);

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let response = if limiter.allow() {
            process_request(&line, &db, &state, &client)
        } else {
            JsonRpcResponse::error(
                Value::Null,
                RATE_LIMITED,
                "Rate limit exceeded, slow down",
            )
        };
        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Fixed-window request counter, one per connection.
struct RateLimiter {
    window: Duration,
    max: u32,
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            window_start: Instant::now(),
            count: 0,
        }
    }

    fn allow(&mut self) -> bool {
        if self.window_start.elapsed() >= self.window {
            self.window_start = Instant::now();
            self.count = 0;
        }
        if self.count >= self.max {
            return false;
        }
        self.count += 1;
        true
    }
}

/// Parse and dispatch a single JSON-RPC request.
fn process_request(
    raw: &str,
    db: &Database,
    state: &GatewayState,
    client: &str,
) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    let JsonRpcRequest {
        method, params, id, ..
    } = request;

    let outcome = match method.as_str() {
        // Unauthenticated methods
        "register" => handle_register(db, state, &params, client),
        "login" => handle_login(db, state, &params, client),

        // Everything below requires a valid token
        _ => match authenticate(db, state, &params) {
            Err(e) => Err(e),
            Ok(actor) => match method.as_str() {
                "change_password" => handle_change_password(db, state, &actor, &params, client),

                "system.create" => handle_system_create(db, state, &actor, &params, client),
                "system.update" => handle_system_update(db, state, &actor, &params, client),
                "system.delete" => handle_system_delete(db, state, &actor, &params, client),
                "system.get" => handle_system_get(db, state, &actor, &params, client),
                "system.list" => handle_system_list(db, state, &actor),
                "system.by_category" => handle_system_by_category(db, state, &actor, &params),

                "user.create" => handle_user_create(db, state, &actor, &params, client),
                "user.update" => handle_user_update(db, state, &actor, &params, client),
                "user.delete" => handle_user_delete(db, state, &actor, &params, client),
                "user.get" => handle_user_get(db, state, &actor, &params),
                "user.list" => handle_user_list(db, state, &actor),

                "activity.list" => handle_activity_list(db, &actor, &params),
                "activity.mine" => handle_activity_mine(db, &actor, &params),
                "activity.count" => handle_activity_count(db, &actor),

                _ => {
                    return JsonRpcResponse::error(
                        id,
                        METHOD_NOT_FOUND,
                        format!("Unknown method: {}", method),
                    )
                }
            },
        },
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::from_app_error(id, e),
    }
}

// ─── Auth Helpers ────────────────────────────────────────────────────────────

/// Verify `params.token` and reload the actor from storage.
fn authenticate(db: &Database, state: &GatewayState, params: &Value) -> Result<Actor, Error> {
    let token = params
        .get("token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Unauthorized("Missing token".to_string()))?;
    let claims = state.signer.verify(token)?;

    let user = SqliteUserStore::new(db)
        .find_by_id(claims.sub)?
        .ok_or_else(|| Error::Unauthorized("Invalid token".to_string()))?;
    Ok(user.actor())
}

fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, Error> {
    serde_json::from_value(params.clone())
        .map_err(|e| Error::Validation(format!("Invalid params: {}", e)))
}

fn param_i64(params: &Value, key: &str) -> Result<i64, Error> {
    params
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Validation(format!("Missing '{}' parameter", key)))
}

fn param_str<'v>(params: &'v Value, key: &str) -> Result<&'v str, Error> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation(format!("Missing '{}' parameter", key)))
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::Internal(e.to_string()))
}

fn page_params(params: &Value) -> (Option<u32>, u32) {
    let limit = params
        .get("limit")
        .and_then(Value::as_u64)
        .map(|n| n as u32);
    let offset = params
        .get("offset")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    (limit, offset)
}

fn require_admin_tier(actor: &Actor) -> Result<(), Error> {
    if actor.role.is_unrestricted() {
        return Ok(());
    }
    Err(Error::Unauthorized(
        "Your role does not permit viewing the activity log".to_string(),
    ))
}

// ─── Method Handlers ─────────────────────────────────────────────────────────

fn handle_register(
    db: &Database,
    state: &GatewayState,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let req: RegisterRequest = parse_params(params)?;
    let resp = AuthService::new(db, &state.signer).register(req, Some(client))?;
    to_json(resp)
}

fn handle_login(
    db: &Database,
    state: &GatewayState,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let email = param_str(params, "email")?;
    let password = param_str(params, "password")?;
    let resp = AuthService::new(db, &state.signer).login(email, password, Some(client))?;
    to_json(resp)
}

fn handle_change_password(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let current = param_str(params, "current_password")?;
    let new_password = param_str(params, "new_password")?;
    AuthService::new(db, &state.signer).change_password(
        actor.id,
        current,
        new_password,
        Some(client),
    )?;
    Ok(serde_json::json!({ "changed": true }))
}

fn handle_system_create(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let req: SystemRequest = parse_params(params)?;
    let system = SystemService::new(db, &state.cipher).create_system(actor, req, Some(client))?;
    to_json(system)
}

fn handle_system_update(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let id = param_i64(params, "id")?;
    let req: SystemRequest = parse_params(params)?;
    let system =
        SystemService::new(db, &state.cipher).update_system(actor, id, req, Some(client))?;
    to_json(system)
}

fn handle_system_delete(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let id = param_i64(params, "id")?;
    let system = SystemService::new(db, &state.cipher).delete_system(actor, id, Some(client))?;
    Ok(serde_json::json!({ "deleted": true, "id": system.id }))
}

fn handle_system_get(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let id = param_i64(params, "id")?;
    let system = SystemService::new(db, &state.cipher).get_system(actor, id, Some(client))?;
    to_json(system)
}

fn handle_system_list(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
) -> Result<Value, Error> {
    let systems = SystemService::new(db, &state.cipher).accessible_systems(actor)?;
    to_json(systems)
}

fn handle_system_by_category(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
) -> Result<Value, Error> {
    let category = param_str(params, "category")?;
    let subcategory = params.get("subcategory").and_then(Value::as_str);
    let systems = SystemService::new(db, &state.cipher)
        .systems_by_category(actor, category, subcategory)?;
    to_json(systems)
}

fn handle_user_create(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let req: CreateUserRequest = parse_params(params)?;
    let profile = UserService::new(db, &state.mailer).create_user(actor, req, Some(client))?;
    to_json(profile)
}

fn handle_user_update(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let id = param_i64(params, "id")?;
    let req: UpdateUserRequest = parse_params(params)?;
    let profile =
        UserService::new(db, &state.mailer).update_user(actor, id, req, Some(client))?;
    to_json(profile)
}

fn handle_user_delete(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
    client: &str,
) -> Result<Value, Error> {
    let id = param_i64(params, "id")?;
    let profile = UserService::new(db, &state.mailer).delete_user(actor, id, Some(client))?;
    Ok(serde_json::json!({ "deleted": true, "id": profile.id }))
}

fn handle_user_get(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
    params: &Value,
) -> Result<Value, Error> {
    let id = param_i64(params, "id")?;
    let profile = UserService::new(db, &state.mailer).get_user(actor, id)?;
    to_json(profile)
}

fn handle_user_list(
    db: &Database,
    state: &GatewayState,
    actor: &Actor,
) -> Result<Value, Error> {
    let profiles = UserService::new(db, &state.mailer).list_users(actor)?;
    to_json(profiles)
}

fn handle_activity_list(db: &Database, actor: &Actor, params: &Value) -> Result<Value, Error> {
    require_admin_tier(actor)?;
    let (limit, offset) = page_params(params);
    let entries = crate::audit::ActivityLog::new(db).list(limit, offset)?;
    to_json(entries)
}

fn handle_activity_mine(db: &Database, actor: &Actor, params: &Value) -> Result<Value, Error> {
    let (limit, offset) = page_params(params);
    let entries = crate::audit::ActivityLog::new(db).list_by_actor(actor.id, limit, offset)?;
    to_json(entries)
}

fn handle_activity_count(db: &Database, actor: &Actor) -> Result<Value, Error> {
    require_admin_tier(actor)?;
    let count = crate::audit::ActivityLog::new(db).count(false)?;
    Ok(serde_json::json!({ "count": count }))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
