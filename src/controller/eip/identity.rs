//! Which cloud interface is ours, and which one is the peer's

use crate::cloud::ResourceId;
use crate::config::{AgentConfig, EipParams};
use crate::error::{Error, Result};

/// Both nodes name their interface `{hostname}-{interface}`; the shared
/// suffix is what identifies the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EipIdentity {
    pub interface_name: String,
    suffix: String,
    subscription: String,
    resource_group: String,
}

impl EipIdentity {
    pub fn new(hostname: &str, interface: &str, subscription: &str, resource_group: &str) -> Self {
        Self {
            interface_name: format!("{hostname}-{interface}"),
            suffix: format!("-{interface}"),
            subscription: subscription.to_string(),
            resource_group: resource_group.to_string(),
        }
    }

    /// Use the configured hostname or fall back to the short local hostname
    pub fn resolve(config: &AgentConfig, params: &EipParams) -> Result<Self> {
        let hostname = match &params.hostname {
            Some(h) if !h.trim().is_empty() => h.trim().to_string(),
            _ => local_hostname()?,
        };
        Ok(Self::new(
            &hostname,
            &params.interface,
            &config.subscription_id,
            &config.resource_group,
        ))
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// The owning interface of an IP-configuration reference
    fn owner_interface<'a>(&self, owner: &'a ResourceId) -> Option<&'a str> {
        if !owner.same_scope(&self.subscription, &self.resource_group) {
            return None;
        }
        owner.network_interface_name()
    }

    pub fn is_self(&self, owner: &ResourceId) -> bool {
        self.owner_interface(owner)
            .map(|nic| nic.eq_ignore_ascii_case(&self.interface_name))
            .unwrap_or(false)
    }

    /// An interface in our resource group carrying the same suffix that is
    /// not ours
    pub fn is_peer(&self, owner: &ResourceId) -> bool {
        match self.owner_interface(owner) {
            Some(nic) => {
                let lower = nic.to_ascii_lowercase();
                !nic.eq_ignore_ascii_case(&self.interface_name)
                    && lower.len() > self.suffix.len()
                    && lower.ends_with(&self.suffix.to_ascii_lowercase())
            }
            None => false,
        }
    }
}

fn local_hostname() -> Result<String> {
    let raw = hostname::get()
        .map_err(|e| Error::ConfigError(format!("Cannot determine hostname: {e}")))?
        .into_string()
        .map_err(|_| Error::ConfigError("Hostname is not valid UTF-8".to_string()))?;

    let short = raw.split('.').next().unwrap_or_default().trim().to_string();
    if short.is_empty() {
        return Err(Error::ConfigError("Hostname is empty".to_string()));
    }
    Ok(short)
}
