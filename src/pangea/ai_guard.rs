//! AI Guard text guarding

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PangeaClient, PangeaResponse};
use crate::Result;

const SERVICE: &str = "ai-guard";

/// Recipes a caller may request from the `prompt_guard` tool
pub const RECIPES: [&str; 6] = [
    "pangea_prompt_guard",
    "pangea_llm_response_guard",
    "pangea_ingestion_guard",
    "pangea_agent_pre_plan_guard",
    "pangea_agent_pre_tool_guard",
    "pangea_agent_post_tool_guard",
];

#[derive(Serialize)]
struct GuardTextRequest<'a> {
    text: &'a str,
    recipe: &'a str,
}

/// Result of guarding a piece of text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextGuardResult {
    /// Whether the recipe blocked the text
    #[serde(default)]
    pub blocked: bool,
    /// Text after redaction/defanging, when the recipe changed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    /// Recipe that was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    /// Per-detector findings
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detectors: Value,
}

/// AI Guard service
#[derive(Debug, Clone)]
pub struct AiGuardService {
    client: PangeaClient,
}

impl AiGuardService {
    /// Wrap a shared client
    #[must_use]
    pub fn new(client: PangeaClient) -> Self {
        Self { client }
    }

    /// Run `text` through a recipe
    pub async fn guard_text(
        &self,
        text: &str,
        recipe: &str,
    ) -> Result<PangeaResponse<TextGuardResult>> {
        self.client
            .post(SERVICE, "/v1/text/guard", &GuardTextRequest { text, recipe })
            .await
    }
}
