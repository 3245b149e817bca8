//! Local address and subnet of the route controller's node

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tokio::process::Command;
use tracing::debug;

use crate::config::RouteParams;
use crate::error::{Error, Result};

/// The address routes must point at while we are active, and the subnet
/// that bounds which routes we manage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteIdentity {
    pub address: Ipv4Addr,
    pub subnet: Ipv4Net,
}

impl RouteIdentity {
    /// Exactly one IPv4 address must be configured on the interface
    pub fn from_addresses(interface: &str, addresses: &[Ipv4Net]) -> Result<Self> {
        match addresses {
            [net] => Ok(Self {
                address: net.addr(),
                subnet: net.trunc(),
            }),
            [] => Err(Error::ConfigError(format!(
                "Interface {interface} has no IPv4 address"
            ))),
            many => Err(Error::ConfigError(format!(
                "Interface {} has {} IPv4 addresses, expected exactly one",
                interface,
                many.len()
            ))),
        }
    }

    /// Use the configured override or ask the kernel
    pub async fn resolve(params: &RouteParams) -> Result<Self> {
        let addresses = match params.local_address {
            Some(net) => vec![net],
            None => interface_addresses(&params.interface).await?,
        };
        let identity = Self::from_addresses(&params.interface, &addresses)?;
        debug!(
            "Local address {} in subnet {}",
            identity.address, identity.subnet
        );
        Ok(identity)
    }

    pub fn in_subnet(&self, ip: Ipv4Addr) -> bool {
        self.subnet.contains(&ip)
    }
}

/// IPv4 addresses configured on `interface`, via `ip -o -4 addr show`
async fn interface_addresses(interface: &str) -> Result<Vec<Ipv4Net>> {
    let output = match Command::new("ip")
        .args(["-o", "-4", "addr", "show", "dev", interface])
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotInstalled(
                "The ip utility is not available".to_string(),
            ));
        }
        Err(e) => return Err(Error::Io(e)),
    };

    if !output.status.success() {
        return Err(Error::ConfigError(format!(
            "Cannot read addresses of {}: {}",
            interface,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_ip_addr_output(&String::from_utf8_lossy(&output.stdout))
}

/// Pull the `inet a.b.c.d/len` entries out of one-line `ip addr` output
pub fn parse_ip_addr_output(stdout: &str) -> Result<Vec<Ipv4Net>> {
    let mut addresses = Vec::new();
    for line in stdout.lines() {
        let mut fields = line.split_whitespace();
        while let Some(field) = fields.next() {
            if field != "inet" {
                continue;
            }
            let cidr = fields.next().ok_or_else(|| {
                Error::ConfigError(format!("Truncated address line: {}", line.trim()))
            })?;
            let net: Ipv4Net = cidr
                .parse()
                .map_err(|_| Error::ConfigError(format!("Invalid address {cidr}")))?;
            addresses.push(net);
        }
    }
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &str = "2: eth0    inet 10.0.1.4/24 brd 10.0.1.255 scope global eth0\\       valid_lft forever preferred_lft forever\n";

    #[test]
    fn test_parse_single_address() {
        let addrs = parse_ip_addr_output(SINGLE).unwrap();
        assert_eq!(addrs, vec!["10.0.1.4/24".parse::<Ipv4Net>().unwrap()]);

        let id = RouteIdentity::from_addresses("eth0", &addrs).unwrap();
        assert_eq!(id.address, Ipv4Addr::new(10, 0, 1, 4));
        assert_eq!(id.subnet, "10.0.1.0/24".parse::<Ipv4Net>().unwrap());
        assert!(id.in_subnet(Ipv4Addr::new(10, 0, 1, 200)));
        assert!(!id.in_subnet(Ipv4Addr::new(10, 0, 2, 4)));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_ip_addr_output("").unwrap().is_empty());
    }

    #[test]
    fn test_zero_or_many_addresses_rejected() {
        assert!(matches!(
            RouteIdentity::from_addresses("eth0", &[]),
            Err(Error::ConfigError(_))
        ));

        let output = "2: eth0    inet 10.0.1.4/24 scope global eth0\n2: eth0    inet 10.0.1.9/24 scope global secondary eth0\n";
        let addrs = parse_ip_addr_output(output).unwrap();
        assert_eq!(addrs.len(), 2);
        assert!(matches!(
            RouteIdentity::from_addresses("eth0", &addrs),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_address_rejected() {
        assert!(matches!(
            parse_ip_addr_output("2: eth0    inet 10.0.1/33 scope global\n"),
            Err(Error::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_override_skips_detection() {
        let params = RouteParams {
            interface: "does-not-exist0".into(),
            table: "ha".into(),
            local_address: Some("192.168.7.10/25".parse().unwrap()),
        };
        let id = RouteIdentity::resolve(&params).await.unwrap();
        assert_eq!(id.address, Ipv4Addr::new(192, 168, 7, 10));
        assert_eq!(id.subnet, "192.168.7.0/25".parse::<Ipv4Net>().unwrap());
    }
}
