//! OAuth 2.0 authorization server fronting Pangea AuthN
//!
//! Remote MCP clients authenticate through this server, which forwards
//! every step to the upstream identity provider:
//! - Client lookup and dynamic registration (RFC 7591), with issued secrets
//!   kept in a [`SecretStore`]
//! - Authorization code flow with PKCE (RFC 7636), redirected upstream
//! - Token exchange, refresh, revocation (RFC 7009) and introspection
//! - Metadata discovery (RFC 8414, RFC 9728)

mod clients;
mod metadata;
mod provider;
mod router;
mod types;

pub use clients::{AuthnClientRegistry, ClientRegistry, SecretStore, secret_name};
pub use metadata::{
    AUTHORIZATION_SERVER_PATH, AuthorizationServerMetadata, PROTECTED_RESOURCE_PATH,
    ProtectedResourceMetadata,
};
pub use provider::{AuthnProxyProvider, OAuthServerProvider, UpstreamEndpoints};
pub use router::{MCP_PATH, OAuthState, oauth_router, require_bearer};
pub use types::{
    AuthInfo, AuthorizationParams, OAuthClientInformation, OAuthClientMetadata, OAuthTokens,
    SUPPORTED_GRANT_TYPES,
};
