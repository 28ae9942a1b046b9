//! Configuration management

use std::fmt;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::pangea::DEFAULT_DOMAIN;
use crate::{Error, Result};

/// Deployment variables and the config keys they set
const WELL_KNOWN_ENV: [(&str, &str); 8] = [
    ("PANGEA_VAULT_TOKEN", "pangea.vault_token"),
    ("PANGEA_VAULT_ITEM_ID", "pangea.vault_item_id"),
    ("PANGEA_AUDIT_CONFIG_ID", "pangea.audit_config_id"),
    ("PANGEA_DOMAIN", "pangea.domain"),
    ("PANGEA_AUTHN_ISSUER", "authn.issuer"),
    ("PANGEA_AUTHN_CLIENT_ID", "authn.client_id"),
    ("PANGEA_AUTHN_CLIENT_SECRET", "authn.client_secret"),
    ("PANGEA_MCP_BASE_URL", "server.base_url"),
];

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before the final extraction.
    /// Later files override earlier ones.
    pub env_files: Vec<String>,
    /// HTTP listener
    pub server: ServerConfig,
    /// Transport to serve on
    pub transport: TransportKind,
    /// Pangea credentials and domain
    pub pangea: PangeaSettings,
    /// OAuth proxy for remote clients
    pub authn: AuthnConfig,
}

/// Transport the MCP server is exposed on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    /// Stateless streamable HTTP on `/mcp`
    #[serde(alias = "httpStream")]
    #[value(alias = "httpStream")]
    HttpStream,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::HttpStream => f.write_str("http-stream"),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public URL of this server, used in OAuth metadata.
    /// Defaults to `http://{host}:{port}`.
    pub base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// Public URL of this server
    #[must_use]
    pub fn public_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

/// Pangea credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PangeaSettings {
    /// Pangea cloud domain
    pub domain: String,
    /// Token allowed to read the vault item holding the API token
    pub vault_token: Option<String>,
    /// Vault item (`pvi_...`) holding the API token
    pub vault_item_id: Option<String>,
    /// Secure Audit Log config ID
    pub audit_config_id: Option<String>,
}

impl Default for PangeaSettings {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            vault_token: None,
            vault_item_id: None,
            audit_config_id: None,
        }
    }
}

impl fmt::Debug for PangeaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PangeaSettings")
            .field("domain", &self.domain)
            .field("vault_token", &self.vault_token.as_ref().map(|_| "[REDACTED]"))
            .field("vault_item_id", &self.vault_item_id)
            .field("audit_config_id", &self.audit_config_id)
            .finish()
    }
}

/// OAuth proxy configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthnConfig {
    /// Require OAuth bearer tokens on `/mcp`
    pub enabled: bool,
    /// Pangea AuthN issuer URL
    pub issuer: Option<String>,
    /// This server's own AuthN client ID
    pub client_id: Option<String>,
    /// This server's own AuthN client secret
    pub client_secret: Option<String>,
    /// Scopes advertised in the metadata documents
    pub scopes_supported: Vec<String>,
}

impl Default for AuthnConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: None,
            client_id: None,
            client_secret: None,
            scopes_supported: vec!["openid".to_string()],
        }
    }
}

impl fmt::Debug for AuthnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthnConfig")
            .field("enabled", &self.enabled)
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("scopes_supported", &self.scopes_supported)
            .finish()
    }
}

fn missing(var: &str) -> Error {
    Error::Config(format!("Missing environment variable: {var}"))
}

fn required<'a>(value: Option<&'a String>, var: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(var))
}

impl Config {
    /// Load configuration from defaults, an optional YAML file and the
    /// environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded env file: {}", path.display());
        }

        let figment = Self::figment(path)?;
        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        if config.env_files.is_empty() {
            return Ok(config);
        }

        // env files may set any of the variables above; extract again
        config.load_env_files();
        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        let well_known = Env::raw()
            .only(&WELL_KNOWN_ENV.map(|(var, _)| var))
            .map(|var| {
                WELL_KNOWN_ENV
                    .iter()
                    .find(|(name, _)| var.as_str().eq_ignore_ascii_case(name))
                    .map_or_else(|| var.as_str().to_string(), |(_, key)| (*key).to_string())
                    .into()
            });

        Ok(figment
            .merge(
                Env::prefixed("PANGEA_MCP_")
                    .ignore(&["CONFIG", "BASE_URL"])
                    .split("__"),
            )
            .merge(well_known))
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if !path.exists() {
                tracing::debug!("Env file not found (skipped): {path_str}");
                continue;
            }
            match dotenvy::from_path(path) {
                Ok(()) => tracing::info!("Loaded env file: {path_str}"),
                Err(e) => tracing::warn!("Failed to load env file {path_str}: {e}"),
            }
        }
    }

    /// Check that everything needed to start is present
    ///
    /// # Errors
    ///
    /// Names the first missing setting.
    pub fn validate(&self) -> Result<()> {
        required(self.pangea.vault_token.as_ref(), "PANGEA_VAULT_TOKEN")?;
        required(self.pangea.vault_item_id.as_ref(), "PANGEA_VAULT_ITEM_ID")?;

        if self.authn.enabled {
            required(self.authn.issuer.as_ref(), "PANGEA_AUTHN_ISSUER")?;
            required(self.authn.client_id.as_ref(), "PANGEA_AUTHN_CLIENT_ID")?;
            required(self.authn.client_secret.as_ref(), "PANGEA_AUTHN_CLIENT_SECRET")?;
            if self.transport != TransportKind::HttpStream {
                return Err(Error::Config(
                    "authn requires the http-stream transport".to_string(),
                ));
            }
        }
        Ok(())
    }
}
