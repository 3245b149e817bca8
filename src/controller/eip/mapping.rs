//! Desired state for the public-IP controller
//!
//! The mapping file lists which public IP each of our IP configurations must
//! carry while this node is active:
//!
//! ```toml
//! [ip_configurations]
//! ip-eth0a1 = "pubA"
//! ```
//!
//! Values are short public-IP names (resolved in our subscription and
//! resource group) or fully-qualified ids. IP configurations not listed are
//! never touched.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::cloud::ResourceId;
use crate::config::{AgentConfig, EipParams};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingFile {
    #[serde(default)]
    ip_configurations: BTreeMap<String, String>,
}

/// IP-configuration name to desired public-IP id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredMapping {
    entries: BTreeMap<String, ResourceId>,
}

impl DesiredMapping {
    pub async fn load(path: &Path, subscription: &str, resource_group: &str) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotInstalled(format!(
                    "Mapping file {} not found",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(Error::NotInstalled(format!(
                    "Cannot read mapping file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        debug!("Loaded mapping file {}", path.display());
        Self::parse(&content, subscription, resource_group).map_err(|e| match e {
            Error::ConfigError(msg) => Error::ConfigError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(content: &str, subscription: &str, resource_group: &str) -> Result<Self> {
        let file: MappingFile = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Malformed mapping: {e}")))?;

        if file.ip_configurations.is_empty() {
            return Err(Error::ConfigError(
                "Mapping lists no IP configurations".to_string(),
            ));
        }

        let mut entries = BTreeMap::new();
        for (ip_config, target) in file.ip_configurations {
            let target = target.trim();
            let id = if target.is_empty() {
                return Err(Error::ConfigError(format!(
                    "IP configuration {ip_config} maps to an empty public IP name"
                )));
            } else if target.starts_with('/') {
                ResourceId::parse(target).map_err(|_| {
                    Error::ConfigError(format!(
                        "IP configuration {ip_config} maps to invalid id {target}"
                    ))
                })?
            } else if target.contains('/') {
                return Err(Error::ConfigError(format!(
                    "IP configuration {ip_config} maps to invalid name {target}"
                )));
            } else {
                ResourceId::public_ip(subscription, resource_group, target)
            };
            entries.insert(ip_config, id);
        }

        Ok(Self { entries })
    }

    /// Mapping file for the configured interface
    pub async fn for_params(config: &AgentConfig, params: &EipParams) -> Result<Self> {
        Self::load(
            &params.mapping_file(),
            &config.subscription_id,
            &config.resource_group,
        )
        .await
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, ip_configuration: &str) -> Option<&ResourceId> {
        self.entries.get(ip_configuration)
    }

    pub fn contains(&self, ip_configuration: &str) -> bool {
        self.entries.contains_key(ip_configuration)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
