//! AI Guard around tool calls
//!
//! [`Guarded`] runs the serialized arguments through a pre-tool policy before
//! the tool executes and the serialized result through a post-tool policy
//! before it is returned. Any guard failure aborts the call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::GuardStage;
use crate::pangea::AiGuardService;
use crate::protocol::{Content, ToolsCallResult};
use crate::tools::{InvocationContext, ToolHandler};
use crate::{Error, Result};

/// Recipe applied to tool arguments
pub const PRE_TOOL_POLICY: &str = "pangea_agent_pre_tool_guard";

/// Recipe applied to tool results
pub const POST_TOOL_POLICY: &str = "pangea_agent_post_tool_guard";

/// Outcome of a guard check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardVerdict {
    /// The policy rejected the text
    pub blocked: bool,
    /// Replacement text (redacted or defanged), when the policy changed it
    pub rewritten_text: Option<String>,
}

impl GuardVerdict {
    /// Not blocked, not rewritten
    #[must_use]
    pub fn allow() -> Self {
        Self::default()
    }

    /// Blocked
    #[must_use]
    pub fn block() -> Self {
        Self {
            blocked: true,
            rewritten_text: None,
        }
    }

    /// Not blocked, with replacement text
    pub fn rewrite(text: impl Into<String>) -> Self {
        Self {
            blocked: false,
            rewritten_text: Some(text.into()),
        }
    }
}

/// A content-safety service
#[async_trait]
pub trait ContentGuard: Send + Sync {
    /// Evaluate `text` under `policy`. An `Err` means no verdict was produced.
    async fn check(&self, text: &str, policy: &str) -> Result<GuardVerdict>;
}

#[async_trait]
impl ContentGuard for AiGuardService {
    async fn check(&self, text: &str, policy: &str) -> Result<GuardVerdict> {
        let result = self.guard_text(text, policy).await?.into_result("ai-guard")?;
        Ok(GuardVerdict {
            blocked: result.blocked,
            rewritten_text: result.prompt_text,
        })
    }
}

/// A tool handler wrapped in pre- and post-call guard checks
pub struct Guarded<H> {
    guard: Arc<dyn ContentGuard>,
    inner: H,
}

impl<H: ToolHandler> Guarded<H> {
    /// Guard `inner` with `guard`
    pub fn new(guard: Arc<dyn ContentGuard>, inner: H) -> Self {
        Self { guard, inner }
    }

    async fn verdict(&self, stage: GuardStage, text: &str) -> Result<GuardVerdict> {
        let policy = match stage {
            GuardStage::Input => PRE_TOOL_POLICY,
            GuardStage::Output => POST_TOOL_POLICY,
        };
        let verdict = self
            .guard
            .check(text, policy)
            .await
            .map_err(|e| Error::GuardUnavailable {
                stage,
                reason: e.to_string(),
            })?;
        debug!(%stage, blocked = verdict.blocked, rewritten = verdict.rewritten_text.is_some(), "Guard verdict");
        Ok(verdict)
    }
}

/// Shorthand for [`Guarded::new`]
pub fn guard<H: ToolHandler>(guard: Arc<dyn ContentGuard>, inner: H) -> Guarded<H> {
    Guarded::new(guard, inner)
}

#[async_trait]
impl<H: ToolHandler> ToolHandler for Guarded<H> {
    async fn call(&self, args: Value, ctx: InvocationContext) -> Result<ToolsCallResult> {
        let invocation_id = ctx.invocation_id;

        let input = serde_json::to_string(&args)?;
        if self.verdict(GuardStage::Input, &input).await?.blocked {
            warn!(%invocation_id, "Tool input blocked by AI Guard");
            return Err(Error::BlockedInput);
        }

        let result = self.inner.call(args, ctx).await?;

        // Only text is inspected.
        if !result.is_text_only() {
            return Ok(result);
        }

        let output = serde_json::to_string(&result)?;
        let verdict = self.verdict(GuardStage::Output, &output).await?;
        if verdict.blocked {
            warn!(%invocation_id, "Tool output blocked by AI Guard");
            return Err(Error::BlockedOutput);
        }

        match verdict.rewritten_text {
            Some(text) if !text.is_empty() => parse_rewritten(&text),
            _ => Ok(result),
        }
    }
}

/// Decode a rewritten result: a whole tool result, or a single content item.
fn parse_rewritten(text: &str) -> Result<ToolsCallResult> {
    if let Ok(result) = serde_json::from_str::<ToolsCallResult>(text) {
        return Ok(result);
    }
    match serde_json::from_str::<Content>(text) {
        Ok(content) => Ok(ToolsCallResult {
            content: vec![content],
            is_error: false,
        }),
        Err(e) => Err(Error::Schema(format!(
            "rewritten tool output is not a tool result: {e}"
        ))),
    }
}
