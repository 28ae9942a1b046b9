//! `lookup_domain_reputation`, `whois`

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ToolArgs, ToolContext, ToolRegistry, check_count, pretty, respond};
use crate::Result;
use crate::pangea::{DomainIntelService, ReputationBulkResult};
use crate::protocol::{Tool, ToolAnnotations};

#[derive(Debug, Serialize, Deserialize)]
struct DomainsArgs {
    domains: Vec<String>,
}

impl ToolArgs for DomainsArgs {
    fn validate(&self) -> Result<()> {
        check_count("domains", &self.domains, 100)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WhoisArgs {
    domain: String,
}

impl ToolArgs for WhoisArgs {}

/// `"Reputation data:\n\n"` followed by one line per indicator
pub(super) fn format_reputation(result: &ReputationBulkResult) -> String {
    let lines: Vec<String> = result
        .data
        .iter()
        .map(|(indicator, reputation)| reputation.describe(indicator))
        .collect();
    format!("Reputation data:\n\n{}", lines.join("\n"))
}

pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = DomainIntelService::new(ctx.client.clone());

    let svc = service.clone();
    registry.register_typed(
        Tool::new(
            "lookup_domain_reputation",
            "Look up reputation score(s) for one or more domains.",
            json!({
                "type": "object",
                "properties": {
                    "domains": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                        "maxItems": 100,
                        "description": "The domains to be looked up"
                    }
                },
                "required": ["domains"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        Some(&ctx.guard),
        move |args: DomainsArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.reputation_bulk(&args.domains).await?;
                respond(response, "Failed to retrieve reputation data", |result| {
                    Ok(format_reputation(&result))
                })
            }
        },
    );

    registry.register_typed(
        Tool::new(
            "whois",
            "Retrieve WHOIS (an Internet resource's registered users or assignees) for a domain.",
            json!({
                "type": "object",
                "properties": {
                    "domain": {"type": "string", "description": "The domain to query"}
                },
                "required": ["domain"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        Some(&ctx.guard),
        move |args: WhoisArgs, _ctx| {
            let service = service.clone();
            async move {
                let response = service.who_is(&args.domain).await?;
                respond(response, "Failed to query domain whois", |result| {
                    Ok(format!("Domain data:\n\n{}", pretty(&result.data)?))
                })
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reputation_block_keeps_response_order() {
        let result: ReputationBulkResult = serde_json::from_value(json!({
            "data": {
                "zeta.example": {"verdict": "benign", "score": 0, "category": []},
                "alpha.example": {"verdict": "malicious", "score": 90, "category": ["Malware"]}
            }
        }))
        .unwrap();
        assert_eq!(
            format_reputation(&result),
            "Reputation data:\n\n\
             zeta.example: benign (score 0) (categories )\n\
             alpha.example: malicious (score 90) (categories Malware)"
        );
    }

    #[test]
    fn domains_bounds() {
        assert!(DomainsArgs { domains: vec![] }.validate().is_err());
        assert!(DomainsArgs { domains: vec!["example.com".into()] }.validate().is_ok());
    }
}
