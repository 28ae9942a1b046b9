//! MCP server: dispatcher, transports and startup wiring

mod dispatcher;
mod http;
mod stdio;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use url::Url;

pub use dispatcher::{McpServer, SERVER_NAME};
pub use http::create_router;
pub use stdio::{serve, serve_stdio};

use crate::config::{Config, TransportKind};
use crate::guard::ContentGuard;
use crate::oauth::{AuthnClientRegistry, AuthnProxyProvider, OAuthState, UpstreamEndpoints};
use crate::pangea::{AiGuardService, PangeaClient, PangeaConfig, VaultService};
use crate::tools::{ToolContext, pangea_tools};
use crate::{Error, Result};

/// A configured server, ready to run
pub struct Server {
    config: Config,
    mcp: Arc<McpServer>,
    oauth: Option<Arc<OAuthState>>,
}

impl Server {
    /// Fetch the Pangea API token from the vault and wire up the tools and,
    /// when enabled, the OAuth proxy
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let pangea = PangeaConfig::new(&config.pangea.domain);
        let vault_token = config.pangea.vault_token.as_deref().unwrap_or_default();
        let item_id = config.pangea.vault_item_id.as_deref().unwrap_or_default();

        let vault_client = PangeaClient::new(vault_token, pangea)?;
        let api_token = VaultService::new(vault_client.clone())
            .fetch_api_token(item_id)
            .await?;
        info!("Fetched API token from Pangea Vault");

        Self::with_client(config, vault_client.with_token(api_token))
    }

    /// Wire up a server around an already authenticated client
    pub fn with_client(config: Config, client: PangeaClient) -> Result<Self> {
        let guard: Arc<dyn ContentGuard> = Arc::new(AiGuardService::new(client.clone()));
        let tools = pangea_tools(&ToolContext {
            client: client.clone(),
            guard,
            audit_config_id: config.pangea.audit_config_id.clone(),
        });
        info!(tools = tools.len(), "Registered tools");

        let oauth = if config.authn.enabled {
            Some(Arc::new(oauth_state(&config, &client)?))
        } else {
            None
        };

        Ok(Self {
            config,
            mcp: Arc::new(McpServer::new(tools)),
            oauth,
        })
    }

    /// The request handler
    #[must_use]
    pub fn mcp(&self) -> &Arc<McpServer> {
        &self.mcp
    }

    /// Serve on the configured transport until stdin closes (stdio) or a
    /// shutdown signal arrives (HTTP)
    pub async fn run(self) -> Result<()> {
        match self.config.transport {
            TransportKind::Stdio => serve_stdio(self.mcp).await,
            TransportKind::HttpStream => {
                let addr = SocketAddr::new(
                    self.config
                        .server
                        .host
                        .parse()
                        .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
                    self.config.server.port,
                );
                let app = create_router(self.mcp, self.oauth);
                let listener = TcpListener::bind(addr).await?;
                info!(address = %addr, "Serving MCP on http://{addr}/mcp");

                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await
                    .map_err(|e| Error::Internal(e.to_string()))
            }
        }
    }
}

fn oauth_state(config: &Config, client: &PangeaClient) -> Result<OAuthState> {
    let authn = &config.authn;
    let issuer = authn.issuer.as_deref().unwrap_or_default();

    let base_url = config.server.public_url();
    let base_url = Url::parse(&base_url)
        .map_err(|e| Error::Config(format!("Invalid base URL '{base_url}': {e}")))?;

    let registry = AuthnClientRegistry::new(
        client.http().clone(),
        issuer,
        client.token(),
        Arc::new(VaultService::new(client.clone())),
    );
    let provider = AuthnProxyProvider::new(
        UpstreamEndpoints::from_issuer(issuer)?,
        client.http().clone(),
        Arc::new(registry),
        authn.client_id.clone().unwrap_or_default(),
        authn.client_secret.clone().unwrap_or_default(),
    );

    info!(issuer, base_url = %base_url, "OAuth proxy enabled");
    Ok(OAuthState::new(
        Arc::new(provider),
        base_url,
        authn.scopes_supported.clone(),
    ))
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
