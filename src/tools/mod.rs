//! Tool registry and the Pangea tool catalogue
//!
//! Every tool is a [`ToolHandler`]. Arguments are validated first, then (for
//! guarded tools) checked by AI Guard, then handed to the typed handler:
//!
//! ```text
//! Validated<A>  ->  Guarded  ->  TypedHandler<A>
//! ```

mod ai_guard;
mod audit_log;
mod domain_intel;
mod embargo;
mod file_intel;
mod ip_intel;
mod redact;
mod url_intel;
mod vault;

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::guard::{ContentGuard, Guarded};
use crate::oauth::AuthInfo;
use crate::pangea::{PangeaClient, PangeaResponse};
use crate::protocol::{Tool, ToolsCallResult};
use crate::{Error, Result};

/// Per-call context handed to every handler
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Unique ID for log correlation
    pub invocation_id: Uuid,
    /// Verified bearer token, when the transport is authenticated
    pub auth: Option<AuthInfo>,
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            auth: None,
        }
    }
}

impl InvocationContext {
    /// Context for an authenticated caller
    #[must_use]
    pub fn authenticated(auth: AuthInfo) -> Self {
        Self {
            auth: Some(auth),
            ..Self::default()
        }
    }
}

/// Executes one tool call
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with raw JSON arguments
    async fn call(&self, args: Value, ctx: InvocationContext) -> Result<ToolsCallResult>;
}

#[async_trait]
impl<T: ToolHandler + ?Sized> ToolHandler for Arc<T> {
    async fn call(&self, args: Value, ctx: InvocationContext) -> Result<ToolsCallResult> {
        (**self).call(args, ctx).await
    }
}

/// Handler backed by an async closure over raw JSON
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`ToolHandler`]
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolsCallResult>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolsCallResult>> + Send + 'static,
{
    async fn call(&self, args: Value, ctx: InvocationContext) -> Result<ToolsCallResult> {
        (self.0)(args, ctx).await
    }
}

// ============================================================================
// Typed arguments
// ============================================================================

/// Deserializable tool arguments with extra validation
pub trait ToolArgs: DeserializeOwned + Serialize + Send + 'static {
    /// Constraints serde cannot express (lengths, formats)
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Decode tool arguments; a missing argument object counts as `{}`
pub fn parse_args<A: DeserializeOwned>(args: Value) -> Result<A> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| Error::InvalidParams(e.to_string()))
}

/// Handler that decodes `A` and calls an async closure
pub struct TypedHandler<A, F> {
    f: F,
    _args: PhantomData<fn() -> A>,
}

#[async_trait]
impl<A, F, Fut> ToolHandler for TypedHandler<A, F>
where
    A: ToolArgs,
    F: Fn(A, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolsCallResult>> + Send + 'static,
{
    async fn call(&self, args: Value, ctx: InvocationContext) -> Result<ToolsCallResult> {
        let args: A = parse_args(args)?;
        (self.f)(args, ctx).await
    }
}

/// Validates and normalizes arguments before delegating.
///
/// The inner handler receives the re-serialized arguments, so defaults are
/// filled in before anything downstream (including AI Guard) sees them.
pub struct Validated<A, H> {
    inner: H,
    _args: PhantomData<fn() -> A>,
}

impl<A, H> Validated<A, H> {
    /// Validate as `A` before calling `inner`
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            _args: PhantomData,
        }
    }
}

#[async_trait]
impl<A: ToolArgs, H: ToolHandler> ToolHandler for Validated<A, H> {
    async fn call(&self, args: Value, ctx: InvocationContext) -> Result<ToolsCallResult> {
        let parsed: A = parse_args(args)?;
        parsed.validate()?;
        let canonical = serde_json::to_value(&parsed)?;
        self.inner.call(canonical, ctx).await
    }
}

/// Require between 1 and `max` entries
pub(crate) fn check_count<T>(field: &str, items: &[T], max: usize) -> Result<()> {
    if items.is_empty() {
        return Err(Error::InvalidParams(format!("{field} must contain at least 1 item")));
    }
    if items.len() > max {
        return Err(Error::InvalidParams(format!(
            "{field} must contain at most {max} items"
        )));
    }
    Ok(())
}

/// Pretty JSON with two-space indentation
pub(crate) fn pretty(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render a successful Pangea response, or answer with `failure` text.
///
/// An unsuccessful envelope is reported to the model as a normal text
/// result rather than a protocol error.
pub(crate) fn respond<T>(
    response: PangeaResponse<T>,
    failure: &str,
    render: impl FnOnce(T) -> Result<String>,
) -> Result<ToolsCallResult> {
    let ok = response.success();
    match response.result {
        Some(result) if ok => Ok(ToolsCallResult::text(render(result)?)),
        _ => {
            debug!(status = %response.status, summary = %response.summary, "Pangea call failed");
            Ok(ToolsCallResult::text(failure))
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

struct RegisteredTool {
    definition: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Name -> definition -> handler, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, definition: Tool, handler: impl ToolHandler + 'static) {
        let handler: Arc<dyn ToolHandler> = Arc::new(handler);
        if let Some(&i) = self.index.get(&definition.name) {
            warn!(tool = %definition.name, "Replacing registered tool");
            self.tools[i] = RegisteredTool { definition, handler };
            return;
        }
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool { definition, handler });
    }

    /// Register a typed tool, optionally behind AI Guard
    pub fn register_typed<A, F, Fut>(
        &mut self,
        definition: Tool,
        guard: Option<&Arc<dyn ContentGuard>>,
        f: F,
    ) where
        A: ToolArgs,
        F: Fn(A, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolsCallResult>> + Send + 'static,
    {
        let typed = TypedHandler {
            f,
            _args: PhantomData::<fn() -> A>,
        };
        match guard {
            Some(guard) => self.register(
                definition,
                Validated::<A, _>::new(Guarded::new(Arc::clone(guard), typed)),
            ),
            None => self.register(definition, Validated::<A, _>::new(typed)),
        }
    }

    /// Tool definitions for `tools/list`
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Whether a tool is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name
    pub async fn call(
        &self,
        name: &str,
        args: Value,
        ctx: InvocationContext,
    ) -> Result<ToolsCallResult> {
        let Some(&i) = self.index.get(name) else {
            return Err(Error::ToolNotFound(name.to_string()));
        };
        debug!(tool = %name, invocation_id = %ctx.invocation_id, "Calling tool");
        self.tools[i].handler.call(args, ctx).await
    }
}

// ============================================================================
// Catalogue
// ============================================================================

/// Shared dependencies of the Pangea tools
#[derive(Clone)]
pub struct ToolContext {
    /// Client authenticated with the project API token
    pub client: PangeaClient,
    /// Guard used by guarded tools
    pub guard: Arc<dyn ContentGuard>,
    /// Secure Audit Log config
    pub audit_config_id: Option<String>,
}

/// Registry holding every Pangea tool
#[must_use]
pub fn pangea_tools(ctx: &ToolContext) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    ai_guard::register(&mut registry, ctx);
    domain_intel::register(&mut registry, ctx);
    embargo::register(&mut registry, ctx);
    file_intel::register(&mut registry, ctx);
    ip_intel::register(&mut registry, ctx);
    redact::register(&mut registry, ctx);
    audit_log::register(&mut registry, ctx);
    url_intel::register(&mut registry, ctx);
    vault::register(&mut registry, ctx);
    registry
}
