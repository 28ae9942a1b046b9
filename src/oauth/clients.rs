//! Client registry backed by the upstream identity provider
//!
//! The provider owns client existence and public metadata but never serves a
//! client secret twice, so issued secrets are kept in a [`SecretStore`] under
//! `oauth_client_<client_id>`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::types::{OAuthClientInformation, OAuthClientMetadata, SUPPORTED_GRANT_TYPES};
use crate::{Error, Result};

/// Auth method forced on every registration; the provider has no `none`
const AUTH_METHOD: &str = "client_secret_basic";

/// Scope used when a registration asks for none
const DEFAULT_SCOPE: &str = "openid";

/// Name-addressed secret storage
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Latest value of the secret called `name`, if any
    async fn find_secret(&self, name: &str) -> Result<Option<String>>;

    /// Store `secret` under `name`
    async fn store_secret(&self, name: &str, secret: &str) -> Result<()>;
}

/// Lookup and dynamic registration of OAuth clients
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Full client record, `None` when the client is unknown
    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClientInformation>>;

    /// Register a new client
    async fn register_client(
        &self,
        metadata: OAuthClientMetadata,
    ) -> Result<OAuthClientInformation>;
}

/// Secret store record name for a client
#[must_use]
pub fn secret_name(client_id: &str) -> String {
    format!("oauth_client_{client_id}")
}

#[derive(Debug, Deserialize)]
struct ClientList {
    clients: Vec<Value>,
    last: String,
    count: u64,
}

/// [`ClientRegistry`] over the Pangea AuthN client API
pub struct AuthnClientRegistry {
    http: reqwest::Client,
    issuer: String,
    api_token: String,
    secrets: Arc<dyn SecretStore>,
}

impl AuthnClientRegistry {
    /// Create a registry for `issuer`, authenticating with `api_token`
    pub fn new(
        http: reqwest::Client,
        issuer: impl Into<String>,
        api_token: impl Into<String>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            http,
            issuer: issuer.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            secrets,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v2/oauth/clients{path}", self.issuer)
    }
}

impl std::fmt::Debug for AuthnClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthnClientRegistry")
            .field("issuer", &self.issuer)
            .field("api_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ClientRegistry for AuthnClientRegistry {
    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClientInformation>> {
        let response = self
            .http
            .get(self.endpoint(""))
            .query(&[("client_id", client_id)])
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(client_id, status = %response.status(), "Client lookup missed");
            return Ok(None);
        }

        let body = response.bytes().await?;
        let list: ClientList = serde_json::from_slice(&body)
            .map_err(|e| Error::schema(format!("client list: {e}")))?;
        debug!(client_id, count = list.count, last = %list.last, "Client lookup");

        let clients = list
            .clients
            .into_iter()
            .map(parse_client)
            .collect::<Result<Vec<_>>>()?;
        let Some(mut client) = clients.into_iter().next() else {
            return Ok(None);
        };

        match self.secrets.find_secret(&secret_name(&client.client_id)).await {
            Ok(Some(secret)) => client.client_secret = Some(secret),
            Ok(None) => debug!(client_id = %client.client_id, "No stored secret for client"),
            Err(e) => {
                warn!(client_id = %client.client_id, error = %e, "Secret lookup failed");
            }
        }

        Ok(Some(client))
    }

    async fn register_client(
        &self,
        metadata: OAuthClientMetadata,
    ) -> Result<OAuthClientInformation> {
        let body = registration_body(metadata);

        let response = self
            .http
            .post(self.endpoint("/register"))
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Client registration rejected upstream");
            return Err(Error::RegistrationFailed {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let raw: Value = serde_json::from_slice(&body)
            .map_err(|e| Error::schema(format!("client registration: {e}")))?;
        let client = parse_client(raw)?;

        if let Some(secret) = client.client_secret.as_deref() {
            self.secrets
                .store_secret(&secret_name(&client.client_id), secret)
                .await?;
        }

        info!(client_id = %client.client_id, "Registered OAuth client");
        Ok(client)
    }
}

/// Outbound registration request: supported grants only, a default scope and
/// the forced auth method
fn registration_body(mut metadata: OAuthClientMetadata) -> OAuthClientMetadata {
    let mut grants: Vec<String> = Vec::new();
    for grant in metadata.grant_types.take().unwrap_or_default() {
        if SUPPORTED_GRANT_TYPES.contains(&grant.as_str()) && !grants.contains(&grant) {
            grants.push(grant);
        }
    }
    metadata.grant_types = Some(grants);
    metadata.scope.get_or_insert_with(|| DEFAULT_SCOPE.to_string());
    metadata.token_endpoint_auth_method = Some(AUTH_METHOD.to_string());
    metadata
}

fn parse_client(mut raw: Value) -> Result<OAuthClientInformation> {
    normalize_secret_expiry(&mut raw)?;
    serde_json::from_value(raw).map_err(|e| Error::schema(format!("client information: {e}")))
}

/// The provider reports `client_secret_expires_at` as a date string; RFC 7591
/// wants epoch seconds.
fn normalize_secret_expiry(raw: &mut Value) -> Result<()> {
    let Some(field) = raw.get_mut("client_secret_expires_at") else {
        return Ok(());
    };
    if let Value::String(text) = field {
        let seconds = parse_timestamp(text).ok_or_else(|| {
            Error::schema(format!("client_secret_expires_at is not a date: '{text}'"))
        })?;
        *field = Value::from(seconds);
    }
    Ok(())
}

/// RFC 3339, then a zone-less date-time taken as UTC, then a bare date at
/// midnight UTC
fn parse_timestamp(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp())
}
