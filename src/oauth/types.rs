//! OAuth 2.0 wire types (RFC 6749, RFC 7591)

use serde::{Deserialize, Serialize};
use url::Url;

/// Grant types the upstream identity provider accepts at registration
pub const SUPPORTED_GRANT_TYPES: [&str; 2] = ["authorization_code", "client_credentials"];

/// Dynamic client registration metadata (RFC 7591 section 2)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthClientMetadata {
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,

    /// Requested client authentication method at the token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,

    /// Requested grant types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,

    /// Requested response types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,

    /// Human-readable client name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Client home page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,

    /// Client logo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    /// Space-delimited scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Contact addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<String>>,

    /// Terms of service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,

    /// Privacy policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,

    /// JWK set location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Inline JWK set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<serde_json::Value>,

    /// Software identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_id: Option<String>,

    /// Software version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
}

/// A registered client as returned by the identity provider (RFC 7591 section 3.2.1)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthClientInformation {
    /// Issued client identifier
    pub client_id: String,

    /// Issued client secret, absent for public clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Issue time, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_issued_at: Option<i64>,

    /// Secret expiry, seconds since the epoch (0 = never)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,

    /// Registered metadata
    #[serde(flatten)]
    pub metadata: OAuthClientMetadata,
}

/// Token endpoint response (RFC 6749 section 5.1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token
    pub access_token: String,

    /// Token type, normally `Bearer`
    pub token_type: String,

    /// OpenID Connect ID token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// A verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    /// The bearer token as presented
    pub token: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Expiry, seconds since the epoch
    pub expires_at: Option<i64>,
}

/// Parameters of an authorization request, already validated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationParams {
    /// Where the upstream sends the user back
    pub redirect_uri: String,
    /// PKCE S256 challenge
    pub code_challenge: String,
    /// Caller-supplied state
    pub state: Option<String>,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Target resource indicator (RFC 8707)
    pub resource: Option<Url>,
}
