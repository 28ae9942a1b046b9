//! Vault tools

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{ToolArgs, ToolContext, ToolRegistry, pretty, respond};
use crate::pangea::{GenerateKeyRequest, ListRequest, VaultService};
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

static ITEM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pvi_[a-z2-7]{32}$").expect("static regex"));

const ORDER_BY: [&str; 11] = [
    "id",
    "type",
    "created_at",
    "algorithm",
    "purpose",
    "expiration",
    "last_rotated",
    "next_rotation",
    "name",
    "folder",
    "item_state",
];

const ASYMMETRIC_SIGNING: &[&str] = &[
    "ED25519",
    "RSA-PKCS1V15-2048-SHA256",
    "ES256",
    "ES384",
    "ES512",
    "ES256K",
    "RSA-PSS-2048-SHA256",
    "RSA-PSS-3072-SHA256",
    "RSA-PSS-4096-SHA256",
    "RSA-PSS-4096-SHA512",
    "ED25519-DILITHIUM2-BETA",
    "ED448-DILITHIUM3-BETA",
    "SPHINCSPLUS-128F-SHAKE256-SIMPLE-BETA",
    "SPHINCSPLUS-128F-SHAKE256-ROBUST-BETA",
    "SPHINCSPLUS-128F-SHA256-SIMPLE-BETA",
    "SPHINCSPLUS-128F-SHA256-ROBUST-BETA",
    "SPHINCSPLUS-192F-SHAKE256-SIMPLE-BETA",
    "SPHINCSPLUS-192F-SHAKE256-ROBUST-BETA",
    "SPHINCSPLUS-192F-SHA256-SIMPLE-BETA",
    "SPHINCSPLUS-192F-SHA256-ROBUST-BETA",
    "SPHINCSPLUS-256F-SHAKE256-SIMPLE-BETA",
    "SPHINCSPLUS-256F-SHAKE256-ROBUST-BETA",
    "SPHINCSPLUS-256F-SHA256-SIMPLE-BETA",
    "SPHINCSPLUS-256F-SHA256-ROBUST-BETA",
    "FALCON-1024-BETA",
];

const ASYMMETRIC_ENCRYPTION: &[&str] = &[
    "RSA-OAEP-2048-SHA1",
    "RSA-OAEP-2048-SHA256",
    "RSA-OAEP-2048-SHA512",
    "RSA-OAEP-3072-SHA1",
    "RSA-OAEP-3072-SHA256",
    "RSA-OAEP-3072-SHA512",
    "RSA-OAEP-4096-SHA1",
    "RSA-OAEP-4096-SHA256",
    "RSA-OAEP-4096-SHA512",
];

const ASYMMETRIC_JWT: &[&str] = &["ES256", "ES384", "ES512"];

const ASYMMETRIC_PKI: &[&str] = &[
    "ED25519",
    "RSA-2048-SHA256",
    "RSA-3072-SHA256",
    "RSA-4096-SHA256",
    "RSA-PSS-2048-SHA256",
    "RSA-PSS-3072-SHA256",
    "RSA-PSS-4096-SHA256",
    "RSA-PSS-4096-SHA512",
    "ECDSA-SHA256",
    "ECDSA-SHA384",
    "ECDSA-SHA512",
];

const SYMMETRIC_ENCRYPTION: &[&str] = &[
    "AES-CFB-128",
    "AES-CFB-256",
    "AES-GCM-256",
    "AES-CBC-128",
    "AES-CBC-256",
];

const SYMMETRIC_JWT: &[&str] = &["HS256", "HS384", "HS512"];

const SYMMETRIC_FPE: &[&str] = &["AES-FF3-1-128-BETA", "AES-FF3-1-256-BETA"];

/// Algorithms allowed for a key type and purpose, `None` if the pair is invalid
fn algorithms(key_type: &str, purpose: &str) -> Option<&'static [&'static str]> {
    match (key_type, purpose) {
        ("asymmetric_key", "signing") => Some(ASYMMETRIC_SIGNING),
        ("asymmetric_key", "encryption") => Some(ASYMMETRIC_ENCRYPTION),
        ("asymmetric_key", "jwt") => Some(ASYMMETRIC_JWT),
        ("asymmetric_key", "pki") => Some(ASYMMETRIC_PKI),
        ("symmetric_key", "encryption") => Some(SYMMETRIC_ENCRYPTION),
        ("symmetric_key", "jwt") => Some(SYMMETRIC_JWT),
        ("symmetric_key", "fpe") => Some(SYMMETRIC_FPE),
        _ => None,
    }
}

fn check_item_id(id: &str) -> Result<()> {
    if ITEM_ID.is_match(id) {
        Ok(())
    } else {
        Err(Error::InvalidParams(format!("'{id}' is not a Vault item ID")))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ItemIdArgs {
    id: String,
}

impl ToolArgs for ItemIdArgs {
    fn validate(&self) -> Result<()> {
        check_item_id(&self.id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ListArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last: Option<String>,
}

impl ToolArgs for ListArgs {
    fn validate(&self) -> Result<()> {
        if let Some(order) = self.order.as_deref()
            && order != "asc"
            && order != "desc"
        {
            return Err(Error::InvalidParams(format!(
                "order must be 'asc' or 'desc', got '{order}'"
            )));
        }
        if let Some(order_by) = self.order_by.as_deref()
            && !ORDER_BY.contains(&order_by)
        {
            return Err(Error::InvalidParams(format!(
                "cannot order by '{order_by}'"
            )));
        }
        Ok(())
    }
}

impl ToolArgs for GenerateKeyRequest {
    fn validate(&self) -> Result<()> {
        let allowed = algorithms(&self.key_type, &self.purpose).ok_or_else(|| {
            Error::InvalidParams(format!(
                "purpose '{}' is not valid for type '{}'",
                self.purpose, self.key_type
            ))
        })?;
        if allowed.contains(&self.algorithm.as_str()) {
            Ok(())
        } else {
            Err(Error::InvalidParams(format!(
                "algorithm '{}' is not valid for a {} {} key",
                self.algorithm, self.purpose, self.key_type
            )))
        }
    }
}

fn item_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "string",
                "pattern": "^pvi_[a-z2-7]{32}$",
                "description": "ID of a Vault key, secret, token, or folder"
            }
        },
        "required": ["id"]
    })
}

fn render(result: Value) -> Result<String> {
    Ok(format!("Result:\n\n{}", pretty(&result)?))
}

// Not guarded: vault payloads are secrets and key material by nature.
pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = VaultService::new(ctx.client.clone());

    let svc = service.clone();
    registry.register_typed(
        Tool::new(
            "get_vault_item",
            "Retrieve details for a Vault key, secret, token, or folder.",
            item_id_schema(),
        )
        .with_annotations(ToolAnnotations::read_only()),
        None,
        move |args: ItemIdArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.get_item(&args.id).await?;
                respond(response, "Failed to get Vault item", |item| {
                    render(serde_json::to_value(item)?)
                })
            }
        },
    );

    let svc = service.clone();
    registry.register_typed(
        Tool::new(
            "list_vault_items",
            "Retrieve an array of Vault items matching a given filter, including secrets, keys, tokens, and folders, along with their common details.",
            json!({
                "type": "object",
                "properties": {
                    "filter": {
                        "type": "object",
                        "description": "Filters to customize your search, for example:\n```\n{\n  \"folder\": \"/encryption\",\n  \"tags\": \"personal\",\n  \"name__contains\": \"my\",\n  \"created_at__gt\": \"2020-03-11\"\n}\n```"
                    },
                    "size": {"type": "integer", "description": "Maximum number of items in the response"},
                    "order": {
                        "type": "string",
                        "enum": ["asc", "desc"],
                        "description": "Direction for ordering the results"
                    },
                    "order_by": {
                        "type": "string",
                        "enum": ORDER_BY,
                        "description": "Property by which to order the results"
                    },
                    "last": {
                        "type": "string",
                        "description": "Internal ID returned in the previous look up response. Used for pagination."
                    }
                }
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        None,
        move |args: ListArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let request = ListRequest {
                    filter: args.filter,
                    size: args.size,
                    order: args.order,
                    order_by: args.order_by,
                    last: args.last,
                };
                let response = svc.list(&request).await?;
                respond(response, "Failed to list items", render)
            }
        },
    );

    let svc = service.clone();
    registry.register_typed(
        Tool::new(
            "delete_vault_item",
            "Delete a Vault key, secret, token, or folder.",
            item_id_schema(),
        )
        .with_annotations(ToolAnnotations::destructive()),
        None,
        move |args: ItemIdArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.delete(&args.id).await?;
                respond(response, "Failed to delete Vault item", render)
            }
        },
    );

    registry.register_typed(
        Tool::new(
            "generate_key",
            "Generate a symmetric or asymmetric key.",
            json!({
                "type": "object",
                "properties": {
                    "type": {"type": "string", "enum": ["asymmetric_key", "symmetric_key"]},
                    "purpose": {
                        "type": "string",
                        "enum": ["signing", "encryption", "jwt", "pki", "fpe"],
                        "description": "Purpose of the key: signing, encryption, jwt or pki for asymmetric keys; encryption, jwt or fpe for symmetric keys"
                    },
                    "algorithm": {"type": "string", "description": "Key algorithm valid for the chosen type and purpose"},
                    "name": {"type": "string"},
                    "folder": {"type": "string"}
                },
                "required": ["type", "purpose", "algorithm", "name"]
            }),
        ),
        None,
        move |args: GenerateKeyRequest, _ctx| {
            let service = service.clone();
            async move {
                let response = service.generate_key(&args).await?;
                respond(response, "Failed to generate key", render)
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_format() {
        assert!(check_item_id("pvi_abcdefghijklmnopqrstuvwxyz234567").is_ok());
        assert!(check_item_id("pvi_ABCDEFGHIJKLMNOPQRSTUVWXYZ234567").is_err());
        assert!(check_item_id("pvi_short").is_err());
    }

    #[test]
    fn key_purpose_must_match_type() {
        let request = GenerateKeyRequest {
            key_type: "symmetric_key".into(),
            purpose: "signing".into(),
            algorithm: "ED25519".into(),
            name: "k".into(),
            folder: None,
        };
        assert!(request.validate().is_err());

        let request = GenerateKeyRequest {
            key_type: "symmetric_key".into(),
            purpose: "encryption".into(),
            algorithm: "AES-GCM-256".into(),
            name: "k".into(),
            folder: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn list_order_values() {
        let args: ListArgs = serde_json::from_value(json!({"order": "sideways"})).unwrap();
        assert!(args.validate().is_err());
        let args: ListArgs = serde_json::from_value(json!({"order_by": "name"})).unwrap();
        assert!(args.validate().is_ok());
    }
}
