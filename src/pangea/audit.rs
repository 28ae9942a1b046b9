//! Secure Audit Log

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PangeaClient, PangeaResponse};
use crate::Result;

const SERVICE: &str = "audit";

/// Standard audit event schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditEvent {
    /// Free form text describing the event
    pub message: String,
    /// What action was performed on a record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Who the record is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Value after the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    /// Value before the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    /// Source of the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Status or result of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// What the record is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Client supplied tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Client supplied timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Serialize)]
struct LogEnvelope<'a> {
    event: &'a AuditEvent,
}

#[derive(Serialize)]
struct LogBulkRequest<'a> {
    events: Vec<LogEnvelope<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_id: Option<&'a str>,
}

/// Search tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchOptions {
    /// Maximum number of matching records
    pub max_results: u32,
    /// Records included in the first page
    pub limit: u32,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    limit: u32,
    return_context: bool,
    verbose: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_id: Option<&'a str>,
}

/// Secure Audit Log service bound to one audit config
#[derive(Debug, Clone)]
pub struct AuditService {
    client: PangeaClient,
    config_id: Option<String>,
}

impl AuditService {
    /// Wrap a shared client; `config_id` selects the audit log schema
    #[must_use]
    pub fn new(client: PangeaClient, config_id: Option<String>) -> Self {
        Self { client, config_id }
    }

    /// Queue events for asynchronous ingestion
    pub async fn log_bulk_async(&self, events: &[AuditEvent]) -> Result<PangeaResponse<Value>> {
        let request = LogBulkRequest {
            events: events.iter().map(|event| LogEnvelope { event }).collect(),
            config_id: self.config_id.as_deref(),
        };
        self.client.post(SERVICE, "/v2/log_async", &request).await
    }

    /// Search the log
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<PangeaResponse<Value>> {
        let request = SearchRequest {
            query,
            max_results: options.max_results,
            limit: options.limit,
            return_context: false,
            verbose: false,
            config_id: self.config_id.as_deref(),
        };
        self.client.post(SERVICE, "/v1/search", &request).await
    }
}
