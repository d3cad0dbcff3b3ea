// PassGuard — JSON-RPC 2.0 Protocol Types
//
// Hand-rolled JSON-RPC 2.0 types for the UDS gateway; the surface is small
// enough that a protocol crate would be overkill. Application errors map
// onto reserved codes below the standard range.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// A JSON-RPC 2.0 success/error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes
pub const UNAUTHORIZED: i32 = -32001;
pub const NOT_FOUND: i32 = -32004;
pub const RATE_LIMITED: i32 = -32005;
pub const CONFLICT: i32 = -32009;

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// The id is null because the request never parsed.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }

    /// Map an application error onto the wire. Internal failures are logged
    /// server-side and surfaced with a generic message only.
    pub fn from_app_error(id: Value, err: Error) -> Self {
        match err {
            Error::Unauthorized(msg) => Self::error(id, UNAUTHORIZED, msg),
            Error::NotFound(msg) => Self::error(id, NOT_FOUND, msg),
            Error::Conflict(msg) => Self::error(id, CONFLICT, msg),
            Error::Validation(msg) => Self::error(id, INVALID_PARAMS, msg),
            Error::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                Self::error(id, INTERNAL_ERROR, "Internal server error")
            }
        }
    }
}

impl JsonRpcRequest {
    /// Check the envelope before dispatch.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("jsonrpc must be \"2.0\"".to_string());
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let json = r#"{"jsonrpc":"2.0","method":"login","params":{"email":"a@b.test"},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "login");
        assert!(req.validate().is_ok());

        let no_params = r#"{"jsonrpc":"2.0","method":"system.list","id":2}"#;
        let req: JsonRpcRequest = serde_json::from_str(no_params).unwrap();
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_wrong_version_rejected() {
        let json = r#"{"jsonrpc":"1.1","method":"login","id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_success_omits_error_field() {
        let resp =
            JsonRpcResponse::success(Value::from(1), serde_json::json!({"ok": true}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_app_error_codes() {
        let cases = [
            (Error::Unauthorized("denied".into()), UNAUTHORIZED),
            (Error::NotFound("missing".into()), NOT_FOUND),
            (Error::Conflict("dup".into()), CONFLICT),
            (Error::Validation("bad".into()), INVALID_PARAMS),
        ];
        for (err, code) in cases {
            let resp = JsonRpcResponse::from_app_error(Value::from(1), err);
            assert_eq!(resp.error.unwrap().code, code);
        }
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let err = Error::Internal("db file corrupt at /var/lib".into());
        let resp = JsonRpcResponse::from_app_error(Value::from(1), err);
        let error = resp.error.unwrap();
        assert_eq!(error.code, INTERNAL_ERROR);
        assert!(!error.message.contains("/var/lib"));
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let resp = JsonRpcResponse::parse_error("bad json");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("-32700"));
    }
}
