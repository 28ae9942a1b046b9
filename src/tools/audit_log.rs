//! `log_entry`, `search_log`

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ToolArgs, ToolContext, ToolRegistry, pretty};
use crate::pangea::{AuditEvent, AuditService, SearchOptions};
use crate::protocol::{Tool, ToolAnnotations, ToolsCallResult};
use crate::{Error, Result};

const SEARCH_DESCRIPTION: &str = r#"Search the Secure Audit Log.

<examples>
### Search for the term `deactivated` across all fields

```
query='deactivated'
```

### Search events where the `actor` field contains the word `Dennis`

```
query='actor:"Dennis"'
```

### Search events where the `actor` field does not include the word `Dennis`

```
query='-actor:"Dennis"'
```

### Search for events where the `actor` field contains `Dennis` and the `target` contains `Security`

```
query='actor:"Dennis" AND target:"Security"'
```

### Search for events where the actor is "Dennis" or "Grant" and the target is "Security"

```
query='(actor:"Dennis" OR target:"Grant") AND target:"Security"'
```

</examples>"#;

#[derive(Debug, Serialize, Deserialize)]
struct LogEntryArgs {
    event: AuditEvent,
}

impl ToolArgs for LogEntryArgs {}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchLogArgs {
    query: String,
    #[serde(default = "default_page")]
    max_results: u32,
    #[serde(default = "default_page")]
    limit: u32,
}

fn default_page() -> u32 {
    10
}

impl ToolArgs for SearchLogArgs {
    fn validate(&self) -> Result<()> {
        if (1..=10_000).contains(&self.max_results) {
            Ok(())
        } else {
            Err(Error::InvalidParams(
                "maxResults must be between 1 and 10000".to_string(),
            ))
        }
    }
}

fn event_schema() -> serde_json::Value {
    let field = |description: &str| json!({"type": "string", "description": description});
    json!({
        "type": "object",
        "description": "A structured record describing an auditable event.",
        "properties": {
            "message": field("A free form text field describing the event"),
            "action": field("What action was performed on a record"),
            "actor": field("An identifier for who the audit record is about"),
            "new": field("The value of a record after it was changed"),
            "old": field("The value of a record before it was changed"),
            "source": field("The source of a record"),
            "status": field("The status or result of the event"),
            "target": field("An identifier for what the audit record is about"),
            "tenant_id": field("An optional client-supplied tenant_id"),
            "timestamp": field("An optional client-supplied timestamp")
        },
        "required": ["message"],
        "additionalProperties": false
    })
}

pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = AuditService::new(ctx.client.clone(), ctx.audit_config_id.clone());

    let svc = service.clone();
    registry.register_typed(
        Tool::new(
            "log_entry",
            "Create a log entry in the Secure Audit Log.",
            json!({
                "type": "object",
                "properties": {"event": event_schema()},
                "required": ["event"]
            }),
        ),
        Some(&ctx.guard),
        move |args: LogEntryArgs, _ctx| {
            let svc = svc.clone();
            async move {
                // Ingestion is asynchronous; the envelope is all there is.
                let response = svc.log_bulk_async(std::slice::from_ref(&args.event)).await?;
                Ok(ToolsCallResult::text(pretty(&response)?))
            }
        },
    );

    registry.register_typed(
        Tool::new(
            "search_log",
            SEARCH_DESCRIPTION,
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural search string; a space-separated list of case-sensitive values. Enclose strings in double-quotes \" to include spaces (works for strings, not text). Optionally prefix with a field ID and a colon : to limit to a specific field."
                    },
                    "maxResults": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 10000,
                        "default": 10,
                        "description": "Maximum number of results to return."
                    },
                    "limit": {
                        "type": "integer",
                        "default": 10,
                        "description": "Number of audit records to include from the first page of the results."
                    }
                },
                "required": ["query"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        None,
        move |args: SearchLogArgs, _ctx| {
            let service = service.clone();
            async move {
                let options = SearchOptions {
                    max_results: args.max_results,
                    limit: args.limit,
                };
                let response = service.search(&args.query, options).await?;
                let result = response.result.unwrap_or_default();
                Ok(ToolsCallResult::text(serde_json::to_string(&result)?))
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_defaults() {
        let args: SearchLogArgs = serde_json::from_value(json!({"query": "deactivated"})).unwrap();
        assert_eq!(args.max_results, 10);
        assert_eq!(args.limit, 10);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn search_max_results_range() {
        let args: SearchLogArgs =
            serde_json::from_value(json!({"query": "x", "maxResults": 10001})).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn event_rejects_unknown_fields() {
        let parsed: std::result::Result<LogEntryArgs, _> =
            serde_json::from_value(json!({"event": {"message": "hi", "severity": "high"}}));
        assert!(parsed.is_err());
    }
}
