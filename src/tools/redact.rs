//! `redact`

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ToolArgs, ToolContext, ToolRegistry, pretty, respond};
use crate::pangea::RedactService;
use crate::protocol::{Tool, ToolAnnotations};

#[derive(Debug, Serialize, Deserialize)]
struct RedactArgs {
    text: String,
}

impl ToolArgs for RedactArgs {}

pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = RedactService::new(ctx.client.clone());

    registry.register_typed(
        Tool::new(
            "redact",
            "Redact sensitive information from provided text.",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "The text data to redact"}
                },
                "required": ["text"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        Some(&ctx.guard),
        move |args: RedactArgs, _ctx| {
            let service = service.clone();
            async move {
                let response = service.redact(&args.text).await?;
                respond(response, "Failed to redact text", |result| pretty(&result))
            }
        },
    );
}
