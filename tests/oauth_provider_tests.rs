//! OAuth proxy provider against a mock AuthN server

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pangea_mcp::oauth::{
    AuthnProxyProvider, AuthorizationParams, ClientRegistry, OAuthClientInformation,
    OAuthClientMetadata, OAuthServerProvider, UpstreamEndpoints,
};
use pangea_mcp::{Error, Result};

/// Registry holding a single confidential client
struct OneClient(OAuthClientInformation);

#[async_trait]
impl ClientRegistry for OneClient {
    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClientInformation>> {
        Ok((client_id == self.0.client_id).then(|| self.0.clone()))
    }

    async fn register_client(
        &self,
        _metadata: OAuthClientMetadata,
    ) -> Result<OAuthClientInformation> {
        Err(Error::RegistrationFailed { status: 501 })
    }
}

fn remote_client() -> OAuthClientInformation {
    OAuthClientInformation {
        client_id: "psa_remote".into(),
        client_secret: Some("remote-secret".into()),
        metadata: OAuthClientMetadata {
            redirect_uris: vec!["http://localhost:3000/callback".into()],
            ..OAuthClientMetadata::default()
        },
        ..OAuthClientInformation::default()
    }
}

fn provider(server: &MockServer) -> AuthnProxyProvider {
    AuthnProxyProvider::new(
        UpstreamEndpoints::from_issuer(&server.uri()).unwrap(),
        reqwest::Client::new(),
        Arc::new(OneClient(remote_client())),
        "psa_proxy",
        "proxy-secret",
    )
}

fn basic(id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

#[test]
fn endpoints_derive_from_issuer() {
    let endpoints = UpstreamEndpoints::from_issuer("https://pdn-x.login.aws.us.pangea.cloud/").unwrap();
    assert_eq!(
        endpoints.authorization_url.as_str(),
        "https://pdn-x.login.aws.us.pangea.cloud/v2/oauth/authorize"
    );
    assert_eq!(
        endpoints.token_url,
        "https://pdn-x.login.aws.us.pangea.cloud/v2/oauth/token"
    );
    assert_eq!(
        endpoints.revocation_url,
        "https://pdn-x.login.aws.us.pangea.cloud/v2/oauth/token/revoke"
    );
    assert_eq!(
        endpoints.introspection_url(),
        "https://pdn-x.login.aws.us.pangea.cloud/v2/oauth/token/introspect"
    );
}

#[tokio::test]
async fn authorize_targets_upstream_with_pkce() {
    let server = MockServer::start().await;
    let provider = provider(&server);

    let url = provider.authorize(
        &remote_client(),
        &AuthorizationParams {
            redirect_uri: "http://localhost:3000/callback".into(),
            code_challenge: "abc123".into(),
            state: Some("xyz".into()),
            scopes: vec!["openid".into(), "profile".into()],
            resource: None,
        },
    );

    assert!(url.as_str().starts_with(&format!("{}/v2/oauth/authorize?", server.uri())));
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(get("client_id").as_deref(), Some("psa_remote"));
    assert_eq!(get("response_type").as_deref(), Some("code"));
    assert_eq!(get("code_challenge").as_deref(), Some("abc123"));
    assert_eq!(get("code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(get("state").as_deref(), Some("xyz"));
    assert_eq!(get("scope").as_deref(), Some("openid profile"));
    assert_eq!(get("resource"), None);
}

#[tokio::test]
async fn authorize_generates_missing_state() {
    let server = MockServer::start().await;
    let url = provider(&server).authorize(
        &remote_client(),
        &AuthorizationParams {
            redirect_uri: "http://localhost:3000/callback".into(),
            code_challenge: "abc123".into(),
            ..AuthorizationParams::default()
        },
    );

    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert!(uuid::Uuid::parse_str(&state).is_ok());
}

#[tokio::test]
async fn code_exchange_authenticates_as_remote_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token"))
        .and(header("authorization", basic("psa_remote", "remote-secret").as_str()))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "pat_1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "prt_1",
            "scope": "openid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = provider(&server)
        .exchange_authorization_code(
            &remote_client(),
            "the-code",
            Some("verifier"),
            Some("http://localhost:3000/callback"),
        )
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "pat_1");
    assert_eq!(tokens.expires_in, Some(3600));
    assert_eq!(tokens.refresh_token.as_deref(), Some("prt_1"));

    let requests = server.received_requests().await.unwrap();
    let form: Vec<(String, String)> = serde_urlencoded::from_bytes(&requests[0].body).unwrap();
    assert!(form.iter().all(|(k, _)| k != "code_verifier"));
    assert!(form.contains(&(
        "redirect_uri".to_string(),
        "http://localhost:3000/callback".to_string()
    )));
}

#[tokio::test]
async fn code_exchange_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let err = provider(&server)
        .exchange_authorization_code(&remote_client(), "stale", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenExchangeFailed { status: 400 }));
    assert_eq!(err.to_string(), "Token exchange failed: 400");
}

#[tokio::test]
async fn code_exchange_for_unknown_client() {
    let server = MockServer::start().await;
    let stranger = OAuthClientInformation {
        client_id: "psa_stranger".into(),
        ..OAuthClientInformation::default()
    };

    let err = provider(&server)
        .exchange_authorization_code(&stranger, "code", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ClientNotFound(id) if id == "psa_stranger"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn refresh_exchange_sends_scopes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=prt_1"))
        .and(body_string_contains("scope=openid+profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "pat_2",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = provider(&server)
        .exchange_refresh_token(
            &remote_client(),
            "prt_1",
            &["openid".to_string(), "profile".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(tokens.access_token, "pat_2");
}

#[tokio::test]
async fn introspection_uses_proxy_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token/introspect"))
        .and(header("authorization", basic("psa_proxy", "proxy-secret").as_str()))
        .and(body_string_contains("token=pat_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "active": true,
            "client_id": "psa_remote",
            "scope": "openid profile",
            "exp": 4_102_444_800_i64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = provider(&server).verify_access_token("pat_1").await.unwrap();
    assert_eq!(auth.token, "pat_1");
    assert_eq!(auth.client_id, "psa_remote");
    assert_eq!(auth.scopes, vec!["openid".to_string(), "profile".to_string()]);
    assert_eq!(auth.expires_at, Some(4_102_444_800));
}

#[tokio::test]
async fn introspection_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token/introspect"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = provider(&server)
        .verify_access_token("pat_bad")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenIntrospectionFailed { status: 401 }));
    assert!(err.is_auth_rejection());
}

#[tokio::test]
async fn introspection_without_client_id_is_schema_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token/introspect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"active": false})))
        .mount(&server)
        .await;

    let err = provider(&server)
        .verify_access_token("pat_inactive")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[tokio::test]
async fn revocation_forwards_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token/revoke"))
        .and(header("authorization", basic("psa_remote", "remote-secret").as_str()))
        .and(body_string_contains("token_type_hint=refresh_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .revoke_token(&remote_client(), "prt_1", Some("refresh_token"))
        .await
        .unwrap();
}

#[tokio::test]
async fn revocation_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/oauth/token/revoke"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server)
        .revoke_token(&remote_client(), "prt_1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenRevocationFailed { status: 503 }));
}
