//! `lookup_url_reputation`

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::domain_intel::format_reputation;
use super::{ToolArgs, ToolContext, ToolRegistry, check_count, respond};
use crate::pangea::UrlIntelService;
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct UrlsArgs {
    urls: Vec<String>,
}

impl ToolArgs for UrlsArgs {
    fn validate(&self) -> Result<()> {
        check_count("urls", &self.urls, 100)?;
        for url in &self.urls {
            Url::parse(url)
                .map_err(|e| Error::InvalidParams(format!("'{url}' is not a valid URL: {e}")))?;
        }
        Ok(())
    }
}

// Unguarded. The guard recipes would block the very URLs this tool inspects.
pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = UrlIntelService::new(ctx.client.clone());

    registry.register_typed(
        Tool::new(
            "lookup_url_reputation",
            "Look up reputation score(s) for one or more URLs.",
            json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "type": "array",
                        "items": {"type": "string", "format": "uri"},
                        "minItems": 1,
                        "maxItems": 100,
                        "description": "The URLs to be looked up"
                    }
                },
                "required": ["urls"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        None,
        move |args: UrlsArgs, _ctx| {
            let service = service.clone();
            async move {
                let response = service.reputation_bulk(&args.urls).await?;
                respond(response, "Failed to retrieve reputation data", |result| {
                    Ok(format_reputation(&result))
                })
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_must_parse() {
        let ok = UrlsArgs {
            urls: vec!["http://113.235.101.11:54384".into()],
        };
        assert!(ok.validate().is_ok());
        let bad = UrlsArgs {
            urls: vec!["not a url".into()],
        };
        assert!(bad.validate().is_err());
    }
}
