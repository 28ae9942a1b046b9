//! `lookup_file_reputation`

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ToolArgs, ToolContext, ToolRegistry, check_count, pretty, respond};
use crate::Result;
use crate::pangea::FileIntelService;
use crate::protocol::{Tool, ToolAnnotations};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum HashType {
    Sha256,
    Sha,
    Md5,
}

impl HashType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha => "sha",
            Self::Md5 => "md5",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileReputationArgs {
    hash_type: HashType,
    hashes: Vec<String>,
}

impl ToolArgs for FileReputationArgs {
    fn validate(&self) -> Result<()> {
        check_count("hashes", &self.hashes, 100)
    }
}

pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = FileIntelService::new(ctx.client.clone());

    registry.register_typed(
        Tool::new(
            "lookup_file_reputation",
            "Retrieve a reputation score for a set of file hashes",
            json!({
                "type": "object",
                "properties": {
                    "hashType": {
                        "type": "string",
                        "enum": ["sha256", "sha", "md5"],
                        "description": "The type of hash to look up"
                    },
                    "hashes": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                        "maxItems": 100,
                        "description": "The file hashes to be looked up"
                    }
                },
                "required": ["hashType", "hashes"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        Some(&ctx.guard),
        move |args: FileReputationArgs, _ctx| {
            let service = service.clone();
            async move {
                let response = service
                    .hash_reputation_bulk(&args.hashes, args.hash_type.as_str())
                    .await?;
                respond(response, "Failed to retrieve reputation data", |result| {
                    Ok(format!("Reputation data:\n\n{}", pretty(&result.data)?))
                })
            }
        },
    );
}
