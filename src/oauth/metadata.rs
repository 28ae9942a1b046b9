//! OAuth metadata documents served by this server
//!
//! RFC 8414 (Authorization Server Metadata) and RFC 9728 (Protected
//! Resource Metadata). Every endpoint points back at this server, which
//! forwards to the upstream identity provider.

use serde::{Deserialize, Serialize};
use url::Url;

/// Path of the authorization server metadata document
pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";

/// Path of the protected resource metadata document
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// OAuth Authorization Server Metadata (RFC 8414)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Authorization server issuer URL
    pub issuer: String,

    /// Authorization endpoint URL
    pub authorization_endpoint: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Token revocation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,

    /// Dynamic client registration endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Supported grant types
    #[serde(default)]
    pub grant_types_supported: Vec<String>,

    /// Supported response types
    #[serde(default)]
    pub response_types_supported: Vec<String>,

    /// Supported scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Supported token endpoint auth methods
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Supported revocation endpoint auth methods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revocation_endpoint_auth_methods_supported: Vec<String>,

    /// Supported PKCE code challenge methods
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

/// OAuth Protected Resource Metadata (RFC 9728)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Protected resource identifier
    pub resource: String,

    /// Authorization servers that can issue tokens for this resource
    #[serde(default)]
    pub authorization_servers: Vec<String>,

    /// Supported bearer token methods
    #[serde(default)]
    pub bearer_methods_supported: Vec<String>,

    /// Supported scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Human-readable resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// `base` joined with an absolute path, without a doubled slash
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!("{}{path}", base.as_str().trim_end_matches('/'))
}

impl AuthorizationServerMetadata {
    /// Metadata for this server mounted at `base`
    #[must_use]
    pub fn for_proxy(base: &Url, scopes_supported: &[String]) -> Self {
        Self {
            issuer: base.as_str().trim_end_matches('/').to_string(),
            authorization_endpoint: endpoint(base, "/authorize"),
            token_endpoint: endpoint(base, "/token"),
            revocation_endpoint: Some(endpoint(base, "/revoke")),
            registration_endpoint: Some(endpoint(base, "/register")),
            grant_types_supported: strings(&["authorization_code", "refresh_token"]),
            response_types_supported: strings(&["code"]),
            scopes_supported: scopes_supported.to_vec(),
            token_endpoint_auth_methods_supported: strings(&[
                "client_secret_basic",
                "client_secret_post",
            ]),
            revocation_endpoint_auth_methods_supported: strings(&[
                "client_secret_basic",
                "client_secret_post",
            ]),
            code_challenge_methods_supported: strings(&["S256"]),
        }
    }
}

impl ProtectedResourceMetadata {
    /// Metadata for the MCP endpoint at `resource`, protected by the
    /// authorization server at `base`
    #[must_use]
    pub fn for_resource(base: &Url, resource: &str, scopes_supported: &[String]) -> Self {
        Self {
            resource: resource.to_string(),
            authorization_servers: vec![base.as_str().trim_end_matches('/').to_string()],
            bearer_methods_supported: strings(&["header"]),
            scopes_supported: scopes_supported.to_vec(),
            resource_name: Some("Pangea MCP".to_string()),
        }
    }
}
