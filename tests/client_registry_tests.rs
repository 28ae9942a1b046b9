//! Client registry against a mock AuthN server

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pangea_mcp::oauth::{
    AuthnClientRegistry, ClientRegistry, OAuthClientMetadata, SecretStore, secret_name,
};
use pangea_mcp::{Error, Result};

/// In-memory secret store
#[derive(Default)]
struct MemorySecrets {
    secrets: Mutex<HashMap<String, String>>,
    fail_reads: bool,
}

#[async_trait]
impl SecretStore for MemorySecrets {
    async fn find_secret(&self, name: &str) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(Error::Internal("vault unavailable".into()));
        }
        Ok(self.secrets.lock().await.get(name).cloned())
    }

    async fn store_secret(&self, name: &str, secret: &str) -> Result<()> {
        self.secrets
            .lock()
            .await
            .insert(name.to_string(), secret.to_string());
        Ok(())
    }
}

fn registry(server: &MockServer, secrets: Arc<MemorySecrets>) -> AuthnClientRegistry {
    AuthnClientRegistry::new(reqwest::Client::new(), server.uri(), "pts_api", secrets)
}

fn client_record() -> Value {
    json!({
        "client_id": "psa_abc",
        "client_id_issued_at": 1_700_000_000,
        "client_secret_expires_at": "2025-01-01T00:00:00Z",
        "redirect_uris": ["http://localhost:3000/callback"],
        "grant_types": ["authorization_code"],
        "client_name": "Inspector"
    })
}

async fn received_json(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r| serde_json::from_slice(&r.body).ok())
        .collect()
}

// ============================================================================
// get_client
// ============================================================================

#[tokio::test]
async fn get_client_merges_stored_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/oauth/clients"))
        .and(query_param("client_id", "psa_abc"))
        .and(header("authorization", "Bearer pts_api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clients": [client_record()],
            "last": "psa_abc",
            "count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let secrets = Arc::new(MemorySecrets::default());
    secrets
        .store_secret(&secret_name("psa_abc"), "s3cret")
        .await
        .unwrap();

    let client = registry(&server, secrets)
        .get_client("psa_abc")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(client.client_id, "psa_abc");
    assert_eq!(client.client_secret.as_deref(), Some("s3cret"));
    assert_eq!(client.client_secret_expires_at, Some(1_735_689_600));
    assert_eq!(client.client_id_issued_at, Some(1_700_000_000));
    assert_eq!(
        client.metadata.redirect_uris,
        vec!["http://localhost:3000/callback".to_string()]
    );
    assert_eq!(client.metadata.client_name.as_deref(), Some("Inspector"));
}

#[tokio::test]
async fn get_client_without_stored_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/oauth/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clients": [client_record()],
            "last": "psa_abc",
            "count": 1
        })))
        .mount(&server)
        .await;

    let client = registry(&server, Arc::new(MemorySecrets::default()))
        .get_client("psa_abc")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(client.client_secret, None);
}

#[tokio::test]
async fn secret_lookup_failure_still_returns_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/oauth/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clients": [client_record()],
            "last": "psa_abc",
            "count": 1
        })))
        .mount(&server)
        .await;

    let secrets = Arc::new(MemorySecrets {
        fail_reads: true,
        ..MemorySecrets::default()
    });
    let client = registry(&server, secrets)
        .get_client("psa_abc")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(client.client_id, "psa_abc");
    assert_eq!(client.client_secret, None);
}

#[tokio::test]
async fn unknown_client_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/oauth/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clients": [],
            "last": "",
            "count": 0
        })))
        .mount(&server)
        .await;

    let found = registry(&server, Arc::new(MemorySecrets::default()))
        .get_client("psa_missing")
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn upstream_error_status_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/oauth/clients"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let found = registry(&server, Arc::new(MemorySecrets::default()))
        .get_client("psa_abc")
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn client_list_without_cursor_is_schema_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/oauth/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clients": [client_record()],
            "count": 1
        })))
        .mount(&server)
        .await;

    let err = registry(&server, Arc::new(MemorySecrets::default()))
        .get_client("psa_abc")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[tokio::test]
async fn malformed_client_list_is_schema_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/oauth/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let err = registry(&server, Arc::new(MemorySecrets::default()))
        .get_client("psa_abc")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

// ============================================================================
// register_client
// ============================================================================

#[tokio::test]
async fn register_filters_grants_and_stores_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/clients/register"))
        .and(header("authorization", "Bearer pts_api"))
        .and(body_partial_json(json!({
            "token_endpoint_auth_method": "client_secret_basic"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_id": "psa_new",
            "client_secret": "fresh-secret",
            "client_id_issued_at": 1_700_000_000,
            "client_secret_expires_at": "2025-01-01",
            "redirect_uris": ["http://localhost:3000/callback"],
            "grant_types": ["authorization_code"],
            "scope": "openid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let secrets = Arc::new(MemorySecrets::default());
    let client = registry(&server, Arc::clone(&secrets))
        .register_client(OAuthClientMetadata {
            redirect_uris: vec!["http://localhost:3000/callback".into()],
            grant_types: Some(vec![
                "authorization_code".into(),
                "refresh_token".into(),
                "urn:ietf:params:oauth:grant-type:device_code".into(),
            ]),
            token_endpoint_auth_method: Some("none".into()),
            client_name: Some("Inspector".into()),
            ..OAuthClientMetadata::default()
        })
        .await
        .unwrap();

    assert_eq!(client.client_id, "psa_new");
    assert_eq!(client.client_secret_expires_at, Some(1_735_689_600));
    assert_eq!(
        secrets
            .find_secret("oauth_client_psa_new")
            .await
            .unwrap()
            .as_deref(),
        Some("fresh-secret")
    );

    let bodies = received_json(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["grant_types"], json!(["authorization_code"]));
    assert_eq!(bodies[0]["scope"], json!("openid"));
    assert_eq!(bodies[0]["client_name"], json!("Inspector"));
}

#[tokio::test]
async fn register_rejection_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/clients/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad"})))
        .mount(&server)
        .await;

    let secrets = Arc::new(MemorySecrets::default());
    let err = registry(&server, Arc::clone(&secrets))
        .register_client(OAuthClientMetadata {
            redirect_uris: vec!["http://localhost/cb".into()],
            ..OAuthClientMetadata::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RegistrationFailed { status: 400 }));
    assert_eq!(err.to_string(), "Failed to register client: 400");
    assert!(secrets.secrets.lock().await.is_empty());
}

#[tokio::test]
async fn register_without_secret_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/clients/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "client_id": "psa_public",
            "redirect_uris": ["http://localhost/cb"]
        })))
        .mount(&server)
        .await;

    let secrets = Arc::new(MemorySecrets::default());
    let client = registry(&server, Arc::clone(&secrets))
        .register_client(OAuthClientMetadata {
            redirect_uris: vec!["http://localhost/cb".into()],
            ..OAuthClientMetadata::default()
        })
        .await
        .unwrap();

    assert_eq!(client.client_secret, None);
    assert!(secrets.secrets.lock().await.is_empty());

    let bodies = received_json(&server).await;
    assert_eq!(bodies[0]["grant_types"], json!([]));
}
