// PassGuard — Bearer tokens
//
// Minimal HS256 JWT signing and verification: JSON header and claims,
// base64url without padding, HMAC-SHA-256 signature. Verification checks
// the signature first, then `exp`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::store::Role;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Signed identity claims carried by a bearer token.
///
/// `hidden` is true only for the `ultra_admin` account; consumers use it to
/// suppress that identity in user-facing surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub hidden: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens.
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: std::time::Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_secs: ttl.as_secs() as i64,
        }
    }

    /// Issue a token for an authenticated user.
    pub fn issue(&self, user_id: i64, email: &str, role: Role) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            hidden: role == Role::UltraAdmin,
            iat: now,
            exp: now + self.ttl_secs,
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String> {
        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };

        let header_json = serde_json::to_vec(&header)
            .map_err(|e| Error::Internal(format!("Token header serialization failed: {}", e)))?;
        let claims_json = serde_json::to_vec(claims)
            .map_err(|e| Error::Internal(format!("Token claims serialization failed: {}", e)))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| Error::Internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify a token's signature and expiry, returning its claims.
    /// Every failure mode is `Unauthorized` — callers learn nothing about
    /// which check failed.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s)) if parts.next().is_none() => (h, c, s),
            _ => return Err(unauthorized()),
        };

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| unauthorized())?;

        let signing_input = format!("{}.{}", header_b64, claims_b64);
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| Error::Internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| unauthorized())?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| unauthorized())?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| unauthorized())?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(unauthorized());
        }

        Ok(claims)
    }
}

fn unauthorized() -> Error {
    Error::Unauthorized("Invalid token".to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
