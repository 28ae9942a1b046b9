//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, TransportKind};

/// MCP server for the Pangea security APIs
#[derive(Parser, Debug)]
#[command(name = "pangea-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "PANGEA_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Transport to serve on
    #[arg(short, long, value_enum, global = true)]
    pub transport: Option<TransportKind>,

    /// Port to listen on (http-stream)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Host to bind to (http-stream)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "PANGEA_MCP_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "PANGEA_MCP_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to `start`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the MCP server (default)
    Start,
}

impl Cli {
    /// Apply command-line overrides on top of loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "pangea-mcp",
            "start",
            "--transport",
            "http-stream",
            "--port",
            "9090",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(cli.command, Some(Command::Start));
        assert_eq!(config.transport, TransportKind::HttpStream);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn accepts_camel_case_transport() {
        let cli = Cli::parse_from(["pangea-mcp", "--transport", "httpStream"]);
        assert_eq!(cli.transport, Some(TransportKind::HttpStream));
        assert_eq!(cli.command, None);
    }
}
