//! `check_ip_embargo`, `check_iso_code_embargo`

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ToolArgs, ToolContext, ToolRegistry, pretty, respond};
use crate::pangea::EmbargoService;
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct IpArgs {
    ip: String,
}

impl ToolArgs for IpArgs {
    fn validate(&self) -> Result<()> {
        self.ip
            .parse::<IpAddr>()
            .map(|_| ())
            .map_err(|_| Error::InvalidParams(format!("'{}' is not a valid IP address", self.ip)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IsoCodeArgs {
    iso_code: String,
}

impl ToolArgs for IsoCodeArgs {
    fn validate(&self) -> Result<()> {
        if self.iso_code.chars().count() == 2 {
            Ok(())
        } else {
            Err(Error::InvalidParams(
                "isoCode must be exactly 2 characters".to_string(),
            ))
        }
    }
}

pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = EmbargoService::new(ctx.client.clone());

    let svc = service.clone();
    registry.register_typed(
        Tool::new(
            "check_ip_embargo",
            "Check one or more IP addresses against known sanction and trade embargo lists.",
            json!({
                "type": "object",
                "properties": {
                    "ip": {
                        "type": "string",
                        "description": "Geolocate this IP and check the corresponding country against the enabled embargo lists"
                    }
                },
                "required": ["ip"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        Some(&ctx.guard),
        move |args: IpArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.ip_check(&args.ip).await?;
                respond(response, "Failed to retrieve embargo data", |result| {
                    pretty(&result.sanctions)
                })
            }
        },
    );

    registry.register_typed(
        Tool::new(
            "check_iso_code_embargo",
            "Check a country code against known sanction and trade embargo lists",
            json!({
                "type": "object",
                "properties": {
                    "isoCode": {
                        "type": "string",
                        "minLength": 2,
                        "maxLength": 2,
                        "description": "The two character country ISO code to check against the enabled embargo lists"
                    }
                },
                "required": ["isoCode"]
            }),
        )
        .with_annotations(ToolAnnotations::read_only()),
        Some(&ctx.guard),
        move |args: IsoCodeArgs, _ctx| {
            let service = service.clone();
            async move {
                let response = service.iso_check(&args.iso_code).await?;
                respond(response, "Failed to retrieve embargo data", |result| {
                    pretty(&result.sanctions)
                })
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_must_parse() {
        assert!(IpArgs { ip: "8.8.8.8".into() }.validate().is_ok());
        assert!(IpArgs { ip: "2001:db8::1".into() }.validate().is_ok());
        assert!(IpArgs { ip: "example.com".into() }.validate().is_err());
    }

    #[test]
    fn iso_code_is_two_chars() {
        assert!(IsoCodeArgs { iso_code: "CU".into() }.validate().is_ok());
        assert!(IsoCodeArgs { iso_code: "CUB".into() }.validate().is_err());
    }
}
