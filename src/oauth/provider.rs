//! OAuth authorization server that proxies an upstream identity provider
//!
//! [`OAuthServerProvider`] is the seam the HTTP layer talks to.
//! [`AuthnProxyProvider`] fills it by forwarding to the Pangea AuthN
//! endpoints; it keeps no sessions of its own.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::clients::ClientRegistry;
use super::types::{AuthInfo, AuthorizationParams, OAuthClientInformation, OAuthTokens};
use crate::{Error, Result};

/// Operations an OAuth authorization server exposes to its HTTP front end
#[async_trait]
pub trait OAuthServerProvider: Send + Sync {
    /// Registered clients
    fn clients(&self) -> &dyn ClientRegistry;

    /// Where to send the user agent for an authorization request
    fn authorize(&self, client: &OAuthClientInformation, params: &AuthorizationParams) -> Url;

    /// Trade an authorization code for tokens
    async fn exchange_authorization_code(
        &self,
        client: &OAuthClientInformation,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<OAuthTokens>;

    /// Trade a refresh token for fresh tokens
    async fn exchange_refresh_token(
        &self,
        client: &OAuthClientInformation,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<OAuthTokens>;

    /// Check a bearer token presented to the resource server
    async fn verify_access_token(&self, token: &str) -> Result<AuthInfo>;

    /// Revoke an access or refresh token
    async fn revoke_token(
        &self,
        client: &OAuthClientInformation,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<()>;
}

/// Upstream endpoints, all derived from the issuer URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoints {
    /// Authorization endpoint
    pub authorization_url: Url,
    /// Token endpoint
    pub token_url: String,
    /// Revocation endpoint
    pub revocation_url: String,
}

impl UpstreamEndpoints {
    /// Endpoints of a Pangea AuthN issuer
    pub fn from_issuer(issuer: &str) -> Result<Self> {
        let issuer = issuer.trim_end_matches('/');
        let authorization_url = Url::parse(&format!("{issuer}/v2/oauth/authorize"))
            .map_err(|e| Error::Config(format!("Invalid AuthN issuer '{issuer}': {e}")))?;
        Ok(Self {
            authorization_url,
            token_url: format!("{issuer}/v2/oauth/token"),
            revocation_url: format!("{issuer}/v2/oauth/token/revoke"),
        })
    }

    /// Token introspection endpoint
    #[must_use]
    pub fn introspection_url(&self) -> String {
        format!("{}/introspect", self.token_url)
    }
}

#[derive(Debug, Deserialize)]
struct Introspection {
    client_id: String,
    scope: String,
    #[serde(default)]
    exp: Option<i64>,
}

/// [`OAuthServerProvider`] forwarding to Pangea AuthN
pub struct AuthnProxyProvider {
    endpoints: UpstreamEndpoints,
    http: reqwest::Client,
    registry: Arc<dyn ClientRegistry>,
    client_id: String,
    client_secret: String,
}

impl AuthnProxyProvider {
    /// Create a provider. `client_id`/`client_secret` are this server's own
    /// AuthN credentials, used for introspection.
    pub fn new(
        endpoints: UpstreamEndpoints,
        http: reqwest::Client,
        registry: Arc<dyn ClientRegistry>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            endpoints,
            http,
            registry,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Upstream endpoints in use
    #[must_use]
    pub fn endpoints(&self) -> &UpstreamEndpoints {
        &self.endpoints
    }

    /// The client record with its secret; the one handed in by the HTTP layer
    /// may have been built without it.
    async fn resolve(&self, client_id: &str) -> Result<OAuthClientInformation> {
        self.registry
            .get_client(client_id)
            .await?
            .ok_or_else(|| Error::ClientNotFound(client_id.to_string()))
    }

    async fn token_request(
        &self,
        client: &OAuthClientInformation,
        form: &[(&str, &str)],
    ) -> Result<OAuthTokens> {
        let remote = self.resolve(&client.client_id).await?;

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .basic_auth(&remote.client_id, remote.client_secret.as_deref())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(client_id = %client.client_id, status = %status, "Upstream token request failed");
            return Err(Error::TokenExchangeFailed {
                status: status.as_u16(),
            });
        }

        parse_body(response, "token response").await
    }
}

impl std::fmt::Debug for AuthnProxyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthnProxyProvider")
            .field("endpoints", &self.endpoints)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

async fn parse_body<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| Error::schema(format!("{what}: {e}")))
}

#[async_trait]
impl OAuthServerProvider for AuthnProxyProvider {
    fn clients(&self) -> &dyn ClientRegistry {
        self.registry.as_ref()
    }

    fn authorize(&self, client: &OAuthClientInformation, params: &AuthorizationParams) -> Url {
        let state = params
            .state
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut target = self.endpoints.authorization_url.clone();
        {
            let mut query = target.query_pairs_mut();
            query.clear();
            query.append_pair("client_id", &client.client_id);
            query.append_pair("response_type", "code");
            query.append_pair("redirect_uri", &params.redirect_uri);
            query.append_pair("code_challenge", &params.code_challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("state", &state);

            if !params.scopes.is_empty() {
                query.append_pair("scope", &params.scopes.join(" "));
            }
            if let Some(resource) = &params.resource {
                query.append_pair("resource", resource.as_str());
            }
        }

        debug!(client_id = %client.client_id, "Redirecting to upstream authorization");
        target
    }

    async fn exchange_authorization_code(
        &self,
        client: &OAuthClientInformation,
        code: &str,
        _code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<OAuthTokens> {
        let mut form = vec![("grant_type", "authorization_code"), ("code", code)];
        if let Some(redirect_uri) = redirect_uri {
            form.push(("redirect_uri", redirect_uri));
        }
        self.token_request(client, &form).await
    }

    async fn exchange_refresh_token(
        &self,
        client: &OAuthClientInformation,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<OAuthTokens> {
        let scope = scopes.join(" ");
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }
        self.token_request(client, &form).await
    }

    async fn verify_access_token(&self, token: &str) -> Result<AuthInfo> {
        let response = self
            .http
            .post(self.endpoints.introspection_url())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TokenIntrospectionFailed {
                status: status.as_u16(),
            });
        }

        let introspection: Introspection = parse_body(response, "introspection").await?;
        Ok(AuthInfo {
            token: token.to_string(),
            client_id: introspection.client_id,
            scopes: introspection.scope.split(' ').map(String::from).collect(),
            expires_at: introspection.exp,
        })
    }

    async fn revoke_token(
        &self,
        client: &OAuthClientInformation,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<()> {
        let remote = self.resolve(&client.client_id).await?;

        let mut form = vec![("token", token)];
        if let Some(hint) = token_type_hint {
            form.push(("token_type_hint", hint));
        }

        let response = self
            .http
            .post(&self.endpoints.revocation_url)
            .basic_auth(&remote.client_id, remote.client_secret.as_deref())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::TokenRevocationFailed {
                status: status.as_u16(),
            })
        }
    }
}
