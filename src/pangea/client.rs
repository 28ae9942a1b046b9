//! Shared HTTP client for the Pangea service APIs
//!
//! Every Pangea service speaks the same envelope: a JSON `POST` with a bearer
//! token, answered by `{request_id, status, summary, result}`. The client is
//! built once at startup and cloned into each service wrapper; clones share a
//! single connection pool.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Default Pangea cloud domain
pub const DEFAULT_DOMAIN: &str = "aws.us.pangea.cloud";

/// Envelope status for a successful call
pub const STATUS_SUCCESS: &str = "Success";

/// Where service URLs point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// `https://{service}.{domain}`
    #[default]
    Production,
    /// `{scheme}://{domain}` for every service (local proxies, test doubles)
    Local,
}

/// Connection settings shared by all services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PangeaConfig {
    /// Cloud domain, or `host:port` in local mode
    pub domain: String,
    /// URL layout
    pub environment: Environment,
    /// Use plain HTTP
    pub insecure: bool,
}

impl Default for PangeaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}

impl PangeaConfig {
    /// Production config for a cloud domain
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            environment: Environment::Production,
            insecure: false,
        }
    }

    /// Local config pointing every service at one base URL
    #[must_use]
    pub fn local(base_url: &str) -> Self {
        let insecure = base_url.starts_with("http://");
        let domain = base_url
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/');
        Self {
            domain: domain.to_string(),
            environment: Environment::Local,
            insecure,
        }
    }

    /// Full URL of a service endpoint
    #[must_use]
    pub fn service_url(&self, service: &str, path: &str) -> String {
        let scheme = if self.insecure { "http" } else { "https" };
        match self.environment {
            Environment::Production => format!("{scheme}://{service}.{}{path}", self.domain),
            Environment::Local => format!("{scheme}://{}{path}", self.domain),
        }
    }
}

/// Pangea response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PangeaResponse<T> {
    /// Request ID assigned by Pangea
    #[serde(default)]
    pub request_id: String,
    /// `Success` or an error status such as `ValidationError`
    pub status: String,
    /// Human readable outcome
    #[serde(default)]
    pub summary: String,
    /// Service payload, `null` on failure
    pub result: Option<T>,
}

impl<T> PangeaResponse<T> {
    /// Whether the call succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Unwrap the payload of a successful call
    pub fn into_result(self, service: &'static str) -> Result<T> {
        match self.result {
            Some(result) if self.status == STATUS_SUCCESS => Ok(result),
            _ => Err(Error::Service {
                service,
                status: self.status,
                summary: self.summary,
            }),
        }
    }
}

/// Authenticated client for one Pangea project token
#[derive(Clone)]
pub struct PangeaClient {
    http: reqwest::Client,
    token: String,
    config: PangeaConfig,
}

impl fmt::Debug for PangeaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PangeaClient")
            .field("token", &"[REDACTED]")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PangeaClient {
    /// Create a client for the given API token
    pub fn new(token: impl Into<String>, config: PangeaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pangea-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http(http, token, config))
    }

    /// Create a client reusing an existing connection pool
    pub fn with_http(http: reqwest::Client, token: impl Into<String>, config: PangeaConfig) -> Self {
        Self {
            http,
            token: token.into(),
            config,
        }
    }

    /// Same connection pool and config, different token
    #[must_use]
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self::with_http(self.http.clone(), token, self.config.clone())
    }

    /// Underlying HTTP client
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The bearer token, for Pangea APIs outside the service envelope
    /// (AuthN's OAuth endpoints)
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// POST a JSON body to a service endpoint and decode the envelope.
    ///
    /// Pangea answers errors with an envelope too, so a non-2xx status is not
    /// an error here; callers inspect [`PangeaResponse::success`]. A body that
    /// is not an envelope at all is a schema failure.
    pub async fn post<B, T>(
        &self,
        service: &'static str,
        path: &str,
        body: &B,
    ) -> Result<PangeaResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.service_url(service, path);
        debug!(service, path, "Pangea request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let envelope: PangeaResponse<T> = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Schema(format!(
                "{service}{path} returned HTTP {status} without a valid envelope: {e}"
            ))
        })?;

        debug!(
            service,
            path,
            status = %envelope.status,
            request_id = %envelope.request_id,
            "Pangea response"
        );
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    // ========================================================================
    // URL layout
    // ========================================================================

    #[test]
    fn production_urls_prefix_service() {
        let config = PangeaConfig::default();
        assert_eq!(
            config.service_url("vault", "/v2/get"),
            "https://vault.aws.us.pangea.cloud/v2/get"
        );
    }

    #[test]
    fn local_urls_ignore_service() {
        let config = PangeaConfig::local("http://127.0.0.1:9000/");
        assert_eq!(config.environment, Environment::Local);
        assert!(config.insecure);
        assert_eq!(
            config.service_url("ai-guard", "/v1/text/guard"),
            "http://127.0.0.1:9000/v1/text/guard"
        );
    }

    // ========================================================================
    // Envelope
    // ========================================================================

    #[test]
    fn envelope_success_unwraps_result() {
        let envelope: PangeaResponse<Value> = serde_json::from_value(json!({
            "request_id": "prq_1",
            "status": "Success",
            "summary": "ok",
            "result": {"a": 1}
        }))
        .unwrap();
        assert!(envelope.success());
        assert_eq!(envelope.into_result("vault").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn envelope_failure_becomes_service_error() {
        let envelope: PangeaResponse<Value> = serde_json::from_value(json!({
            "request_id": "prq_2",
            "status": "ValidationError",
            "summary": "bad input",
            "result": null
        }))
        .unwrap();
        assert!(!envelope.success());
        let err = envelope.into_result("vault").unwrap_err();
        assert_eq!(err.to_string(), "vault request failed (ValidationError): bad input");
    }

    #[test]
    fn debug_redacts_token() {
        let client = PangeaClient::new("pts_secret", PangeaConfig::default()).unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("pts_secret"));
    }
}
