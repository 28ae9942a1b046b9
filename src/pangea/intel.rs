//! Domain, IP, URL and file intelligence services

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

use super::{PangeaClient, PangeaResponse};
use crate::Result;

/// Reputation verdict for one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    /// `benign`, `suspicious`, `malicious` or `unknown`
    pub verdict: String,
    /// Provider score
    pub score: Number,
    /// Threat categories
    #[serde(default)]
    pub category: Vec<String>,
}

impl Reputation {
    /// `"{indicator}: {verdict} (score {score}) (categories {a, b})"`
    #[must_use]
    pub fn describe(&self, indicator: &str) -> String {
        format!(
            "{indicator}: {} (score {}) (categories {})",
            self.verdict,
            self.score,
            self.category.join(", ")
        )
    }
}

/// Per-indicator entries in the order the service returned them
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<T>(pub Vec<(String, T)>);

impl<T> Keyed<T> {
    /// Entries in response order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<T> IntoIterator for Keyed<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T: Serialize> Serialize for Keyed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Keyed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeyedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for KeyedVisitor<T> {
            type Value = Keyed<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by indicator")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Keyed<T>, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(Keyed(entries))
            }
        }

        deserializer.deserialize_map(KeyedVisitor(PhantomData))
    }
}

/// Bulk reputation payload keyed by indicator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationBulkResult {
    /// Verdicts
    pub data: Keyed<Reputation>,
}

/// Payload with an opaque `data` object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResult {
    /// Service data
    pub data: Value,
}

/// Reverse DNS answer for one IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainLookup {
    /// Whether a domain was found
    #[serde(default)]
    pub domain_found: bool,
    /// The domain, when found
    #[serde(default)]
    pub domain: Option<String>,
}

/// Proxy check for one IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyCheck {
    /// Whether the IP is a known proxy
    #[serde(default)]
    pub is_proxy: bool,
}

/// VPN check for one IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnCheck {
    /// Whether the IP is a known VPN exit
    #[serde(default)]
    pub is_vpn: bool,
}

/// Bulk payload keyed by IP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpBulkResult<T> {
    /// Per-IP data
    pub data: Keyed<T>,
}

// ============================================================================
// Domain Intel
// ============================================================================

/// Domain Intel service
#[derive(Debug, Clone)]
pub struct DomainIntelService {
    client: PangeaClient,
}

impl DomainIntelService {
    const SERVICE: &'static str = "domain-intel";

    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    /// Reputation for up to 100 domains
    pub async fn reputation_bulk(
        &self,
        domains: &[String],
    ) -> Result<PangeaResponse<ReputationBulkResult>> {
        self.client
            .post(Self::SERVICE, "/v2/reputation", &serde_json::json!({ "domains": domains }))
            .await
    }

    /// WHOIS record for a domain
    pub async fn who_is(&self, domain: &str) -> Result<PangeaResponse<DataResult>> {
        self.client
            .post(Self::SERVICE, "/v1/whois", &serde_json::json!({ "domain": domain }))
            .await
    }
}

// ============================================================================
// IP Intel
// ============================================================================

/// IP Intel service
#[derive(Debug, Clone)]
pub struct IpIntelService {
    client: PangeaClient,
}

impl IpIntelService {
    const SERVICE: &'static str = "ip-intel";

    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    async fn bulk<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        ips: &[String],
    ) -> Result<PangeaResponse<T>> {
        self.client
            .post(Self::SERVICE, path, &serde_json::json!({ "ips": ips }))
            .await
    }

    /// Reputation for up to 100 IPs
    pub async fn reputation_bulk(
        &self,
        ips: &[String],
    ) -> Result<PangeaResponse<ReputationBulkResult>> {
        self.bulk("/v2/reputation", ips).await
    }

    /// Reverse DNS lookup
    pub async fn get_domain_bulk(
        &self,
        ips: &[String],
    ) -> Result<PangeaResponse<IpBulkResult<DomainLookup>>> {
        self.bulk("/v2/domain", ips).await
    }

    /// Proxy detection
    pub async fn is_proxy_bulk(
        &self,
        ips: &[String],
    ) -> Result<PangeaResponse<IpBulkResult<ProxyCheck>>> {
        self.bulk("/v2/proxy", ips).await
    }

    /// VPN detection
    pub async fn is_vpn_bulk(&self, ips: &[String]) -> Result<PangeaResponse<IpBulkResult<VpnCheck>>> {
        self.bulk("/v2/vpn", ips).await
    }

    /// Geolocation
    pub async fn geolocate_bulk(&self, ips: &[String]) -> Result<PangeaResponse<DataResult>> {
        self.bulk("/v2/geolocate", ips).await
    }
}

// ============================================================================
// URL Intel
// ============================================================================

/// URL Intel service
#[derive(Debug, Clone)]
pub struct UrlIntelService {
    client: PangeaClient,
}

impl UrlIntelService {
    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    /// Reputation for up to 100 URLs
    pub async fn reputation_bulk(
        &self,
        urls: &[String],
    ) -> Result<PangeaResponse<ReputationBulkResult>> {
        self.client
            .post("url-intel", "/v2/reputation", &serde_json::json!({ "urls": urls }))
            .await
    }
}

// ============================================================================
// File Intel
// ============================================================================

/// File Intel service
#[derive(Debug, Clone)]
pub struct FileIntelService {
    client: PangeaClient,
}

impl FileIntelService {
    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    /// Reputation for up to 100 file hashes of one type
    pub async fn hash_reputation_bulk(
        &self,
        hashes: &[String],
        hash_type: &str,
    ) -> Result<PangeaResponse<DataResult>> {
        self.client
            .post(
                "file-intel",
                "/v2/reputation",
                &serde_json::json!({ "hashes": hashes, "hash_type": hash_type }),
            )
            .await
    }
}
