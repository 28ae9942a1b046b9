//! OAuth HTTP endpoints and the bearer middleware for `/mcp`

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use url::Url;

use super::metadata::{
    AUTHORIZATION_SERVER_PATH, AuthorizationServerMetadata, PROTECTED_RESOURCE_PATH,
    ProtectedResourceMetadata, endpoint,
};
use super::provider::OAuthServerProvider;
use super::types::{AuthorizationParams, OAuthClientInformation, OAuthClientMetadata};
use crate::Error;

/// Path of the protected MCP endpoint
pub const MCP_PATH: &str = "/mcp";

/// Shared state of the OAuth endpoints
pub struct OAuthState {
    provider: Arc<dyn OAuthServerProvider>,
    base_url: Url,
    scopes_supported: Vec<String>,
}

impl OAuthState {
    /// State for a server reachable at `base_url`
    pub fn new(
        provider: Arc<dyn OAuthServerProvider>,
        base_url: Url,
        scopes_supported: Vec<String>,
    ) -> Self {
        Self {
            provider,
            base_url,
            scopes_supported,
        }
    }

    /// The provider behind the endpoints
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn OAuthServerProvider> {
        &self.provider
    }

    /// Canonical URL of the MCP endpoint
    #[must_use]
    pub fn resource_url(&self) -> String {
        endpoint(&self.base_url, MCP_PATH)
    }

    /// Where clients find the protected resource metadata
    #[must_use]
    pub fn resource_metadata_url(&self) -> String {
        endpoint(&self.base_url, &format!("{PROTECTED_RESOURCE_PATH}{MCP_PATH}"))
    }

    fn unauthorized(&self, message: &str) -> Response {
        let challenge = format!(
            "Bearer error=\"invalid_token\", error_description=\"{message}\", resource_metadata=\"{}\"",
            self.resource_metadata_url()
        );
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, challenge)],
            Json(json!({
                "jsonrpc": "2.0",
                "error": {
                    "code": -32000,
                    "message": message
                },
                "id": null
            })),
        )
            .into_response()
    }
}

impl std::fmt::Debug for OAuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthState")
            .field("base_url", &self.base_url.as_str())
            .field("scopes_supported", &self.scopes_supported)
            .finish_non_exhaustive()
    }
}

/// Metadata, authorization, registration, token and revocation endpoints
pub fn oauth_router(state: Arc<OAuthState>) -> Router {
    Router::new()
        .route(AUTHORIZATION_SERVER_PATH, get(authorization_server_metadata))
        .route(PROTECTED_RESOURCE_PATH, get(protected_resource_metadata))
        .route(
            &format!("{PROTECTED_RESOURCE_PATH}{MCP_PATH}"),
            get(protected_resource_metadata),
        )
        .route("/authorize", get(authorize))
        .route("/register", post(register))
        .route("/token", post(token))
        .route("/revoke", post(revoke))
        .with_state(state)
}

/// Admit only requests carrying a bearer token the provider accepts; the
/// verified [`AuthInfo`](super::AuthInfo) is added to the request extensions.
pub async fn require_bearer(
    State(state): State<Arc<OAuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::to_string);

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "Missing Authorization header");
        return state.unauthorized("Missing Authorization header");
    };

    match state.provider.verify_access_token(&token).await {
        Ok(auth) => {
            if let Some(exp) = auth.expires_at
                && exp < chrono::Utc::now().timestamp()
            {
                warn!(client_id = %auth.client_id, "Expired token");
                return state.unauthorized("Token has expired");
            }
            debug!(client_id = %auth.client_id, "Authenticated request");
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(e) if e.is_auth_rejection() => {
            warn!(error = %e, "Token rejected");
            state.unauthorized("Invalid token")
        }
        Err(e) => {
            error!(error = %e, "Token verification failed");
            oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Token verification failed",
            )
        }
    }
}

fn oauth_error(status: StatusCode, code: &str, description: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "error_description": description.into()
        })),
    )
        .into_response()
}

fn error_response(err: &Error) -> Response {
    match err {
        Error::ClientNotFound(_) => {
            oauth_error(StatusCode::UNAUTHORIZED, "invalid_client", err.to_string())
        }
        Error::TokenIntrospectionFailed { .. } => {
            oauth_error(StatusCode::UNAUTHORIZED, "invalid_token", err.to_string())
        }
        Error::InvalidParams(message) => {
            oauth_error(StatusCode::BAD_REQUEST, "invalid_request", message.clone())
        }
        Error::TokenExchangeFailed { status } | Error::TokenRevocationFailed { status }
            if (400..500).contains(status) =>
        {
            oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", err.to_string())
        }
        Error::RegistrationFailed { status } if (400..500).contains(status) => oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_client_metadata",
            err.to_string(),
        ),
        _ => {
            error!(error = %err, "OAuth request failed");
            oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                err.to_string(),
            )
        }
    }
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

async fn authorization_server_metadata(State(state): State<Arc<OAuthState>>) -> Response {
    Json(AuthorizationServerMetadata::for_proxy(
        &state.base_url,
        &state.scopes_supported,
    ))
    .into_response()
}

async fn protected_resource_metadata(State(state): State<Arc<OAuthState>>) -> Response {
    Json(ProtectedResourceMetadata::for_resource(
        &state.base_url,
        &state.resource_url(),
        &state.scopes_supported,
    ))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    client_id: String,
    response_type: Option<String>,
    redirect_uri: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    state: Option<String>,
    scope: Option<String>,
    resource: Option<String>,
}

/// Requested redirect URI if registered, else the sole registered one
fn resolve_redirect_uri(
    client: &OAuthClientInformation,
    requested: Option<&str>,
) -> Result<String, &'static str> {
    let registered = &client.metadata.redirect_uris;
    match requested {
        Some(uri) if registered.iter().any(|r| r == uri) => Ok(uri.to_string()),
        Some(_) => Err("Unregistered redirect_uri"),
        None if registered.len() == 1 => Ok(registered[0].clone()),
        None => Err("redirect_uri must be specified when client has multiple registered URIs"),
    }
}

/// Send an authorization error back to the client's redirect URI
fn redirect_error(redirect_uri: &str, code: &str, description: &str, state: Option<&str>) -> Response {
    let Ok(mut target) = Url::parse(redirect_uri) else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "Invalid redirect_uri");
    };
    {
        let mut query = target.query_pairs_mut();
        query.append_pair("error", code);
        query.append_pair("error_description", description);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    found(target.as_str())
}

async fn authorize(
    State(state): State<Arc<OAuthState>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    let client = match state.provider.clients().get_client(&query.client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_client", "Invalid client_id");
        }
        Err(e) => return error_response(&e),
    };

    let redirect_uri = match resolve_redirect_uri(&client, query.redirect_uri.as_deref()) {
        Ok(uri) => uri,
        Err(message) => return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", message),
    };

    // The redirect URI is trusted from here on; errors go back through it.
    let client_state = query.state.as_deref();
    if query.response_type.as_deref() != Some("code") {
        return redirect_error(
            &redirect_uri,
            "unsupported_response_type",
            "response_type must be 'code'",
            client_state,
        );
    }
    let Some(code_challenge) = query.code_challenge.clone().filter(|c| !c.is_empty()) else {
        return redirect_error(
            &redirect_uri,
            "invalid_request",
            "code_challenge is required",
            client_state,
        );
    };
    if query.code_challenge_method.as_deref() != Some("S256") {
        return redirect_error(
            &redirect_uri,
            "invalid_request",
            "code_challenge_method must be 'S256'",
            client_state,
        );
    }
    let resource = match query.resource.as_deref().map(Url::parse).transpose() {
        Ok(resource) => resource,
        Err(_) => {
            return redirect_error(
                &redirect_uri,
                "invalid_target",
                "resource must be an absolute URL",
                client_state,
            );
        }
    };

    let params = AuthorizationParams {
        redirect_uri,
        code_challenge,
        state: query.state.clone(),
        scopes: query
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
        resource,
    };

    found(state.provider.authorize(&client, &params).as_str())
}

async fn register(
    State(state): State<Arc<OAuthState>>,
    Json(metadata): Json<OAuthClientMetadata>,
) -> Response {
    match state.provider.clients().register_client(metadata).await {
        Ok(client) => {
            info!(client_id = %client.client_id, "Client registered");
            (StatusCode::CREATED, Json(client)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Credentials from an HTTP Basic `Authorization` header
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

/// Authenticate the calling client (Basic first, then form fields)
async fn authenticate_client(
    state: &OAuthState,
    headers: &HeaderMap,
    form_id: Option<&str>,
    form_secret: Option<&str>,
) -> Result<OAuthClientInformation, Response> {
    let (client_id, presented) = match basic_credentials(headers) {
        Some((id, secret)) => (id, Some(secret)),
        None => {
            let id = form_id.ok_or_else(|| {
                oauth_error(
                    StatusCode::UNAUTHORIZED,
                    "invalid_client",
                    "client_id is required",
                )
            })?;
            (id.to_string(), form_secret.map(str::to_string))
        }
    };

    let client = match state.provider.clients().get_client(&client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return Err(oauth_error(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                "Invalid client_id",
            ));
        }
        Err(e) => return Err(error_response(&e)),
    };

    if let Some(expected) = client.client_secret.as_deref() {
        let Some(presented) = presented else {
            return Err(oauth_error(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                "Client secret is required",
            ));
        };
        if !bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
            warn!(client_id = %client.client_id, "Client secret mismatch");
            return Err(oauth_error(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                "Invalid client_secret",
            ));
        }
        if let Some(expires_at) = client.client_secret_expires_at
            && expires_at != 0
            && expires_at < chrono::Utc::now().timestamp()
        {
            return Err(oauth_error(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                "Client secret has expired",
            ));
        }
    }

    Ok(client)
}

#[derive(Debug, Deserialize)]
struct TokenForm {
    grant_type: String,
    code: Option<String>,
    code_verifier: Option<String>,
    redirect_uri: Option<String>,
    refresh_token: Option<String>,
    scope: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

async fn token(
    State(state): State<Arc<OAuthState>>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Response {
    let client = match authenticate_client(
        &state,
        &headers,
        form.client_id.as_deref(),
        form.client_secret.as_deref(),
    )
    .await
    {
        Ok(client) => client,
        Err(response) => return response,
    };

    let result = match form.grant_type.as_str() {
        "authorization_code" => {
            let Some(code) = form.code.as_deref() else {
                return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "code is required");
            };
            state
                .provider
                .exchange_authorization_code(
                    &client,
                    code,
                    form.code_verifier.as_deref(),
                    form.redirect_uri.as_deref(),
                )
                .await
        }
        "refresh_token" => {
            let Some(refresh_token) = form.refresh_token.as_deref() else {
                return oauth_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    "refresh_token is required",
                );
            };
            let scopes: Vec<String> = form
                .scope
                .as_deref()
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default();
            state
                .provider
                .exchange_refresh_token(&client, refresh_token, &scopes)
                .await
        }
        other => {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                format!("Unsupported grant_type '{other}'"),
            );
        }
    };

    match result {
        Ok(tokens) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store")],
            Json(tokens),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct RevokeForm {
    token: String,
    token_type_hint: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

async fn revoke(
    State(state): State<Arc<OAuthState>>,
    headers: HeaderMap,
    Form(form): Form<RevokeForm>,
) -> Response {
    let client = match authenticate_client(
        &state,
        &headers,
        form.client_id.as_deref(),
        form.client_secret.as_deref(),
    )
    .await
    {
        Ok(client) => client,
        Err(response) => return response,
    };

    match state
        .provider
        .revoke_token(&client, &form.token, form.token_type_hint.as_deref())
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    fn client(uris: &[&str]) -> OAuthClientInformation {
        OAuthClientInformation {
            client_id: "psa_client".into(),
            metadata: OAuthClientMetadata {
                redirect_uris: uris.iter().map(|u| (*u).to_string()).collect(),
                ..OAuthClientMetadata::default()
            },
            ..OAuthClientInformation::default()
        }
    }

    #[test]
    fn redirect_uri_resolution() {
        let single = client(&["http://localhost/cb"]);
        assert_eq!(
            resolve_redirect_uri(&single, None).as_deref(),
            Ok("http://localhost/cb")
        );
        assert!(resolve_redirect_uri(&single, Some("http://evil/cb")).is_err());

        let many = client(&["http://localhost/a", "http://localhost/b"]);
        assert!(resolve_redirect_uri(&many, None).is_err());
        assert_eq!(
            resolve_redirect_uri(&many, Some("http://localhost/b")).as_deref(),
            Ok("http://localhost/b")
        );
    }

    #[test]
    fn basic_credentials_decode() {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode("psa_client:s3:cret");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        assert_eq!(
            basic_credentials(&headers),
            Some(("psa_client".to_string(), "s3:cret".to_string()))
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(basic_credentials(&headers), None);
    }

    #[test]
    fn redirect_error_keeps_state() {
        let response = redirect_error(
            "http://localhost/cb?x=1",
            "invalid_request",
            "bad",
            Some("st"),
        );
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert_eq!(
            location,
            "http://localhost/cb?x=1&error=invalid_request&error_description=bad&state=st"
        );
    }
}
