//! Stateless streamable-HTTP transport

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::debug;

use super::McpServer;
use crate::error::rpc_codes;
use crate::oauth::{AuthInfo, MCP_PATH, OAuthState, oauth_router, require_bearer};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Build the HTTP application. With `oauth`, `/mcp` requires a bearer token
/// and the OAuth endpoints are mounted alongside.
pub fn create_router(server: Arc<McpServer>, oauth: Option<Arc<OAuthState>>) -> Router {
    let mut mcp = Router::new()
        .route(MCP_PATH, get(mcp_get_handler).post(mcp_handler))
        .with_state(Arc::clone(&server));

    if let Some(oauth) = oauth {
        mcp = mcp
            .layer(middleware::from_fn_with_state(
                Arc::clone(&oauth),
                require_bearer,
            ))
            .merge(oauth_router(oauth).layer(CorsLayer::permissive()));
    }

    Router::new()
        .route("/health", get(health_handler))
        .with_state(server)
        .merge(mcp)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": server.tools().len()
    }))
}

/// POST /mcp: one JSON-RPC message in, one JSON response (or 202) out
async fn mcp_handler(
    State(server): State<Arc<McpServer>>,
    auth: Option<Extension<AuthInfo>>,
    body: Bytes,
) -> Response {
    let auth = auth.map(|Extension(auth)| auth);

    match server.handle_bytes(&body, auth).await {
        Some(response) => {
            let status = match &response.error {
                Some(error)
                    if response.id.is_none()
                        && matches!(
                            error.code,
                            rpc_codes::PARSE_ERROR | rpc_codes::INVALID_REQUEST
                        ) =>
                {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::OK,
            };
            (status, Json(response)).into_response()
        }
        None => {
            debug!("Accepted message without response");
            StatusCode::ACCEPTED.into_response()
        }
    }
}

/// GET /mcp: this server keeps no sessions, so there is no event stream
async fn mcp_get_handler() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": rpc_codes::INVALID_REQUEST,
                "message": "Server-sent events are not supported. Use POST to send JSON-RPC requests to /mcp"
            },
            "id": null
        })),
    )
        .into_response()
}
