//! Vault items, keys and secrets

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{PangeaClient, PangeaResponse};
use crate::oauth::SecretStore;
use crate::{Error, Result};

const SERVICE: &str = "vault";

/// One version of a vault item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemVersion {
    /// Version number
    #[serde(default)]
    pub version: u32,
    /// Pangea token value (token items)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Secret value (secret items)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Everything else the API returns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A vault key, secret, token or folder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultItem {
    /// Item ID (`pvi_...`)
    pub id: String,
    /// Item type
    #[serde(rename = "type", default)]
    pub item_type: String,
    /// Item name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Versions, newest first
    #[serde(default)]
    pub item_versions: Vec<ItemVersion>,
    /// Everything else the API returns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Page of items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemList {
    /// Matching items
    #[serde(default)]
    pub items: Vec<VaultItem>,
    /// Cursor for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
    /// Total count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Listing parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Field filters (`folder`, `name__contains`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    /// Page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// `asc` or `desc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Sort field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Pagination cursor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Key generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateKeyRequest {
    /// `asymmetric_key` or `symmetric_key`
    #[serde(rename = "type")]
    pub key_type: String,
    /// Key purpose
    pub purpose: String,
    /// Key algorithm
    pub algorithm: String,
    /// Item name
    pub name: String,
    /// Parent folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

/// Vault service
#[derive(Debug, Clone)]
pub struct VaultService {
    client: PangeaClient,
}

impl VaultService {
    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    /// Fetch an item by ID
    pub async fn get_item(&self, id: &str) -> Result<PangeaResponse<VaultItem>> {
        self.client.post(SERVICE, "/v2/get", &json!({ "id": id })).await
    }

    /// Fetch items matching a filter, with their versions
    pub async fn get_bulk(&self, filter: Value, size: u32) -> Result<PangeaResponse<ItemList>> {
        self.client
            .post(SERVICE, "/v2/get_bulk", &json!({ "filter": filter, "size": size }))
            .await
    }

    /// List items
    pub async fn list(&self, request: &ListRequest) -> Result<PangeaResponse<Value>> {
        self.client.post(SERVICE, "/v2/list", request).await
    }

    /// Delete an item
    pub async fn delete(&self, id: &str) -> Result<PangeaResponse<Value>> {
        self.client.post(SERVICE, "/v2/delete", &json!({ "id": id })).await
    }

    /// Generate a symmetric or asymmetric key
    pub async fn generate_key(&self, request: &GenerateKeyRequest) -> Result<PangeaResponse<Value>> {
        self.client.post(SERVICE, "/v2/key/generate", request).await
    }

    /// Store a named secret
    pub async fn secret_store(&self, name: &str, secret: &str) -> Result<PangeaResponse<Value>> {
        self.client
            .post(
                SERVICE,
                "/v2/secret/store",
                &json!({ "type": "secret", "name": name, "secret": secret }),
            )
            .await
    }

    /// Read the Pangea API token held by a token item
    pub async fn fetch_api_token(&self, item_id: &str) -> Result<String> {
        let item = self
            .get_item(item_id)
            .await?
            .into_result(SERVICE)
            .map_err(|e| Error::Config(format!("Failed to get API token from Pangea Vault: {e}")))?;

        item.item_versions
            .into_iter()
            .next()
            .and_then(|v| v.token)
            .ok_or_else(|| Error::Config(format!("Vault item {item_id} does not hold a token")))
    }
}

#[async_trait]
impl SecretStore for VaultService {
    async fn find_secret(&self, name: &str) -> Result<Option<String>> {
        let items = self
            .get_bulk(json!({ "type": "secret", "name": name }), 1)
            .await?
            .into_result(SERVICE)?;

        Ok(items
            .items
            .into_iter()
            .next()
            .and_then(|item| item.item_versions.into_iter().next())
            .and_then(|version| version.secret))
    }

    async fn store_secret(&self, name: &str, secret: &str) -> Result<()> {
        self.secret_store(name, secret).await?.into_result(SERVICE)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn item_keeps_unknown_fields() {
        let item: VaultItem = serde_json::from_value(json!({
            "id": "pvi_abc",
            "type": "pangea_token",
            "folder": "/mcp",
            "item_versions": [{"version": 1, "token": "pts_x", "state": "active"}]
        }))
        .unwrap();
        assert_eq!(item.item_type, "pangea_token");
        assert_eq!(item.item_versions[0].token.as_deref(), Some("pts_x"));
        assert_eq!(item.extra["folder"], json!("/mcp"));
        assert_eq!(item.item_versions[0].extra["state"], json!("active"));
    }

    #[test]
    fn list_request_omits_unset_fields() {
        let request = ListRequest {
            size: Some(5),
            ..ListRequest::default()
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"size": 5}));
    }
}
