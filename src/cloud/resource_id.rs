//! Fully-qualified resource identifiers
//!
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{type}/{name}...]`
//!
//! Identifiers compare case-insensitively, as the control plane treats them.

use std::fmt;

use crate::error::{Error, Result};

pub const NETWORK_PROVIDER: &str = "Microsoft.Network";

#[derive(Debug, Clone)]
pub struct ResourceId {
    subscription: String,
    resource_group: String,
    provider: String,
    /// `(type, name)` pairs, outermost first
    segments: Vec<(String, String)>,
}

impl ResourceId {
    pub fn new(
        subscription: &str,
        resource_group: &str,
        provider: &str,
        segments: &[(&str, &str)],
    ) -> Self {
        Self {
            subscription: subscription.to_string(),
            resource_group: resource_group.to_string(),
            provider: provider.to_string(),
            segments: segments
                .iter()
                .map(|(t, n)| (t.to_string(), n.to_string()))
                .collect(),
        }
    }

    pub fn public_ip(subscription: &str, resource_group: &str, name: &str) -> Self {
        Self::new(
            subscription,
            resource_group,
            NETWORK_PROVIDER,
            &[("publicIPAddresses", name)],
        )
    }

    pub fn network_interface(subscription: &str, resource_group: &str, name: &str) -> Self {
        Self::new(
            subscription,
            resource_group,
            NETWORK_PROVIDER,
            &[("networkInterfaces", name)],
        )
    }

    pub fn parse(id: &str) -> Result<Self> {
        let invalid = || Error::Topology(format!("Unparseable resource id '{id}'"));

        let parts: Vec<&str> = id.trim_matches('/').split('/').collect();
        if parts.len() < 8 || parts.len() % 2 != 0 {
            return Err(invalid());
        }
        if !parts[0].eq_ignore_ascii_case("subscriptions")
            || !parts[2].eq_ignore_ascii_case("resourceGroups")
            || !parts[4].eq_ignore_ascii_case("providers")
        {
            return Err(invalid());
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let segments = parts[6..]
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        Ok(Self {
            subscription: parts[1].to_string(),
            resource_group: parts[3].to_string(),
            provider: parts[5].to_string(),
            segments,
        })
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Name of the innermost resource
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(|(_, n)| n.as_str())
            .unwrap_or_default()
    }

    /// Name of the segment of the given type, e.g. the interface that owns
    /// an IP configuration
    pub fn segment(&self, resource_type: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(resource_type))
            .map(|(_, n)| n.as_str())
    }

    pub fn network_interface_name(&self) -> Option<&str> {
        if !self.provider.eq_ignore_ascii_case(NETWORK_PROVIDER) {
            return None;
        }
        self.segment("networkInterfaces")
    }

    /// Same subscription and resource group
    pub fn same_scope(&self, subscription: &str, resource_group: &str) -> bool {
        self.subscription.eq_ignore_ascii_case(subscription)
            && self.resource_group.eq_ignore_ascii_case(resource_group)
    }

    /// Compare against a raw id string
    pub fn matches(&self, other: &str) -> bool {
        self.to_string()
            .eq_ignore_ascii_case(other.trim_end_matches('/'))
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq_ignore_ascii_case(&other.to_string())
    }
}

impl Eq for ResourceId {}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription, self.resource_group, self.provider
        )?;
        for (t, n) in &self.segments {
            write!(f, "/{t}/{n}")?;
        }
        Ok(())
    }
}
