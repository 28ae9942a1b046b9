//! Error types for the Pangea MCP server

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for the Pangea MCP server
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a tool call a guard check ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStage {
    /// Tool arguments, before execution
    Input,
    /// Tool result, before it is returned
    Output,
}

impl fmt::Display for GuardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Pangea MCP errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tool arguments rejected by AI Guard
    #[error("Input has been blocked by AI Guard.")]
    BlockedInput,

    /// Tool result rejected by AI Guard
    #[error("Output has been blocked by AI Guard.")]
    BlockedOutput,

    /// The guard service could not produce a verdict
    #[error("Failed to guard {stage}: {reason}")]
    GuardUnavailable {
        /// Input or output check
        stage: GuardStage,
        /// Underlying failure
        reason: String,
    },

    /// OAuth client has no registration upstream
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Upstream dynamic client registration rejected the request
    #[error("Failed to register client: {status}")]
    RegistrationFailed {
        /// Upstream HTTP status
        status: u16,
    },

    /// Upstream token endpoint rejected the exchange
    #[error("Token exchange failed: {status}")]
    TokenExchangeFailed {
        /// Upstream HTTP status
        status: u16,
    },

    /// Upstream introspection endpoint rejected the token
    #[error("Token introspection failed: {status}")]
    TokenIntrospectionFailed {
        /// Upstream HTTP status
        status: u16,
    },

    /// Upstream revocation endpoint rejected the request
    #[error("Token revocation failed: {status}")]
    TokenRevocationFailed {
        /// Upstream HTTP status
        status: u16,
    },

    /// Upstream response did not match the expected shape
    #[error("Schema validation failed: {0}")]
    Schema(String),

    /// Pangea API answered with a non-success envelope
    #[error("{service} request failed ({status}): {summary}")]
    Service {
        /// Pangea service name (e.g. `vault`)
        service: &'static str,
        /// Envelope status
        status: String,
        /// Envelope summary
        summary: String,
    },

    /// Tool arguments failed validation
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Tool is not registered
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<serde_json::Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Shorthand for a schema validation failure
    pub fn schema(message: impl fmt::Display) -> Self {
        Self::Schema(message.to_string())
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::InvalidParams(_) | Self::ToolNotFound(_) => rpc_codes::INVALID_PARAMS,
            Self::BlockedInput | Self::BlockedOutput => rpc_codes::GUARD_BLOCKED,
            Self::GuardUnavailable { .. } => rpc_codes::GUARD_UNAVAILABLE,
            Self::Service { .. } | Self::Http(_) => rpc_codes::SERVER_ERROR_START,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Whether this error came from the upstream identity provider rejecting a
    /// client or token (as opposed to a transport or server fault)
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            Self::ClientNotFound(_)
                | Self::TokenIntrospectionFailed { .. }
                | Self::TokenExchangeFailed { .. }
                | Self::TokenRevocationFailed { .. }
                | Self::Schema(_)
        )
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i32 = -32000;
    /// Content rejected by AI Guard
    pub const GUARD_BLOCKED: i32 = -32001;
    /// AI Guard could not be reached
    pub const GUARD_UNAVAILABLE: i32 = -32002;
    /// Server error range end
    pub const SERVER_ERROR_END: i32 = -32099;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn guard_errors_keep_user_facing_messages() {
        assert_eq!(
            Error::BlockedInput.to_string(),
            "Input has been blocked by AI Guard."
        );
        assert_eq!(
            Error::BlockedOutput.to_string(),
            "Output has been blocked by AI Guard."
        );
        let err = Error::GuardUnavailable {
            stage: GuardStage::Output,
            reason: "HTTP 503".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to guard output: HTTP 503");
    }

    #[test]
    fn upstream_failures_carry_status() {
        assert_eq!(
            Error::TokenExchangeFailed { status: 400 }.to_string(),
            "Token exchange failed: 400"
        );
        assert_eq!(
            Error::RegistrationFailed { status: 422 }.to_string(),
            "Failed to register client: 422"
        );
    }

    #[test]
    fn rpc_codes_by_variant() {
        assert_eq!(Error::BlockedInput.to_rpc_code(), rpc_codes::GUARD_BLOCKED);
        assert_eq!(
            Error::ToolNotFound("x".into()).to_rpc_code(),
            rpc_codes::INVALID_PARAMS
        );
        assert_eq!(Error::json_rpc(-32601, "nope").to_rpc_code(), -32601);
        assert_eq!(
            Error::Internal("boom".into()).to_rpc_code(),
            rpc_codes::INTERNAL_ERROR
        );
    }

    #[test]
    fn auth_rejections() {
        assert!(Error::ClientNotFound("c".into()).is_auth_rejection());
        assert!(Error::TokenIntrospectionFailed { status: 401 }.is_auth_rejection());
        assert!(!Error::Internal("x".into()).is_auth_rejection());
    }
}
