//! Embargo checks

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{PangeaClient, PangeaResponse};
use crate::Result;

const SERVICE: &str = "embargo";

/// Sanctions matching an IP or country
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbargoResult {
    /// Matching sanction list entries
    #[serde(default)]
    pub sanctions: Vec<Value>,
    /// Total count
    #[serde(default)]
    pub count: u64,
}

/// Embargo service
#[derive(Debug, Clone)]
pub struct EmbargoService {
    client: PangeaClient,
}

impl EmbargoService {
    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    /// Geolocate an IP and check its country
    pub async fn ip_check(&self, ip: &str) -> Result<PangeaResponse<EmbargoResult>> {
        self.client.post(SERVICE, "/v1/ip/check", &json!({ "ip": ip })).await
    }

    /// Check a two letter ISO country code
    pub async fn iso_check(&self, iso_code: &str) -> Result<PangeaResponse<EmbargoResult>> {
        self.client
            .post(SERVICE, "/v1/iso/check", &json!({ "iso_code": iso_code }))
            .await
    }
}
