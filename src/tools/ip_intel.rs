//! IP intelligence tools

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain_intel::format_reputation;
use super::{ToolArgs, ToolContext, ToolRegistry, check_count, pretty, respond};
use crate::pangea::IpIntelService;
use crate::protocol::{Tool, ToolAnnotations};
use crate::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpAddressesArgs {
    ip_addresses: Vec<String>,
}

impl ToolArgs for IpAddressesArgs {
    fn validate(&self) -> Result<()> {
        check_count("ipAddresses", &self.ip_addresses, 100)?;
        if let Some(bad) = self
            .ip_addresses
            .iter()
            .find(|ip| ip.parse::<IpAddr>().is_err())
        {
            return Err(Error::InvalidParams(format!(
                "'{bad}' is not a valid IP address"
            )));
        }
        Ok(())
    }
}

fn definition(name: &str, description: &str) -> Tool {
    Tool::new(
        name,
        description,
        json!({
            "type": "object",
            "properties": {
                "ipAddresses": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "maxItems": 100,
                    "description": "The IP addresses to be looked up"
                }
            },
            "required": ["ipAddresses"]
        }),
    )
    .with_annotations(ToolAnnotations::read_only())
}

fn lines<T>(data: impl IntoIterator<Item = (String, T)>, f: impl Fn(&str, T) -> String) -> String {
    data.into_iter()
        .map(|(ip, item)| f(&ip, item))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(super) fn register(registry: &mut ToolRegistry, ctx: &ToolContext) {
    let service = IpIntelService::new(ctx.client.clone());

    let svc = service.clone();
    registry.register_typed(
        definition(
            "lookup_ip_address_reputation",
            "Look up reputation score(s) for one or more IP addresses.",
        ),
        Some(&ctx.guard),
        move |args: IpAddressesArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.reputation_bulk(&args.ip_addresses).await?;
                respond(response, "Failed to retrieve reputation data", |result| {
                    Ok(format_reputation(&result))
                })
            }
        },
    );

    let svc = service.clone();
    registry.register_typed(
        definition(
            "lookup_domain_from_ip_address",
            "Retrieve the domain name associated with one or more IP addresses.",
        ),
        Some(&ctx.guard),
        move |args: IpAddressesArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.get_domain_bulk(&args.ip_addresses).await?;
                respond(response, "Failed to retrieve domains", |result| {
                    let body = lines(result.data, |ip, lookup| match lookup.domain {
                        Some(domain) if lookup.domain_found => format!("{ip}: {domain}"),
                        _ => format!("{ip}: No domain found"),
                    });
                    Ok(format!("Domain data:\n\n{body}"))
                })
            }
        },
    );

    let svc = service.clone();
    registry.register_typed(
        definition(
            "is_proxy",
            "Determine if one or more IP addresses originate from a proxy.",
        ),
        Some(&ctx.guard),
        move |args: IpAddressesArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.is_proxy_bulk(&args.ip_addresses).await?;
                respond(response, "Failed to retrieve proxy data", |result| {
                    let body = lines(result.data, |ip, check| {
                        if check.is_proxy {
                            format!("{ip}: Is a proxy.")
                        } else {
                            format!("{ip}: Is not a proxy.")
                        }
                    });
                    Ok(format!("Proxy data:\n\n{body}"))
                })
            }
        },
    );

    let svc = service.clone();
    registry.register_typed(
        definition(
            "is_vpn",
            "Determine if one or more IP addresses originate from a VPN.",
        ),
        Some(&ctx.guard),
        move |args: IpAddressesArgs, _ctx| {
            let svc = svc.clone();
            async move {
                let response = svc.is_vpn_bulk(&args.ip_addresses).await?;
                respond(response, "Failed to retrieve VPN data", |result| {
                    let body = lines(result.data, |ip, check| {
                        if check.is_vpn {
                            format!("{ip}: Is a VPN.")
                        } else {
                            format!("{ip}: Is not a VPN.")
                        }
                    });
                    Ok(format!("VPN data:\n\n{body}"))
                })
            }
        },
    );

    registry.register_typed(
        definition(
            "geolocate",
            "Geolocate, or retrieve location information associated with, one or more IP addresses.",
        ),
        Some(&ctx.guard),
        move |args: IpAddressesArgs, _ctx| {
            let service = service.clone();
            async move {
                let response = service.geolocate_bulk(&args.ip_addresses).await?;
                respond(response, "Failed to geolocate IP addresses", |result| {
                    pretty(&result.data)
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
    fn rejects_hostnames() {
        let args = IpAddressesArgs {
            ip_addresses: vec!["1.1.1.1".into(), "one.one".into()],
        };
        let err = args.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid params: 'one.one' is not a valid IP address");
    }

    #[test]
    fn line_joining() {
        let data = vec![("1.1.1.1".to_string(), true), ("2.2.2.2".to_string(), false)];
        let body = lines(data, |ip, flag| format!("{ip}: {flag}"));
        assert_eq!(body, "1.1.1.1: true\n2.2.2.2: false");
    }
}
