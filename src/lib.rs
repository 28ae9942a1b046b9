//! Pangea MCP Server Library
//!
//! Model Context Protocol (MCP) server exposing the Pangea security APIs as
//! tools.
//!
//! # Features
//!
//! - **Guarded tools**: arguments and results pass through AI Guard before
//!   and after each call, failing closed
//! - **Tool catalogue**: AI Guard, Domain/IP/URL/File Intel, Embargo,
//!   Redact, Secure Audit Log and Vault
//! - **Transports**: stdio and stateless streamable HTTP
//! - **OAuth proxy**: authorization, registration, token and introspection
//!   forwarded to Pangea AuthN, with client secrets kept in Vault

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod oauth;
pub mod pangea;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging.
///
/// Logs go to stderr; stdout carries the stdio transport.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        }
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| Error::Internal(format!("Failed to initialise tracing: {e}")))
}
