//! Pangea service clients
//!
//! One [`PangeaClient`] is built at startup from the project token; each
//! service wrapper holds a clone of it.

mod ai_guard;
mod audit;
mod client;
mod embargo;
mod intel;
mod redact;
mod vault;

pub use ai_guard::{AiGuardService, RECIPES, TextGuardResult};
pub use audit::{AuditEvent, AuditService, SearchOptions};
pub use client::{
    DEFAULT_DOMAIN, Environment, PangeaClient, PangeaConfig, PangeaResponse, STATUS_SUCCESS,
};
pub use embargo::{EmbargoResult, EmbargoService};
pub use intel::{
    DataResult, DomainIntelService, DomainLookup, FileIntelService, IpBulkResult, IpIntelService,
    Keyed, ProxyCheck, Reputation, ReputationBulkResult, UrlIntelService, VpnCheck,
};
pub use redact::RedactService;
pub use vault::{GenerateKeyRequest, ItemList, ItemVersion, ListRequest, VaultItem, VaultService};
