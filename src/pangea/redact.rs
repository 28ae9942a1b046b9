//! Redact service

use serde_json::{Value, json};

use super::{PangeaClient, PangeaResponse};
use crate::Result;

/// Redact service
#[derive(Debug, Clone)]
pub struct RedactService {
    client: PangeaClient,
}

impl RedactService {
    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    /// Redact sensitive data from free text
    pub async fn redact(&self, text: &str) -> Result<PangeaResponse<Value>> {
        self.client.post("redact", "/v1/redact", &json!({ "text": text })).await
    }
}
