//! Cloud network resource documents
//!
//! These mirror the control plane's JSON shapes closely enough to round-trip
//! a full document through a read-modify-write cycle. Fields this crate does
//! not interpret are kept in `extra` so a write never drops them.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal-completion marker of an asynchronous mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Succeeded,
    Updating,
    Creating,
    Deleting,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Reference to another resource by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub properties: InterfaceProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceProperties {
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A private IP binding on an interface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub properties: IpConfigurationProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpConfigurationProperties {
    #[serde(
        rename = "publicIPAddress",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_ip_address: Option<SubResource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub properties: PublicIpProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_configuration: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextHopType {
    VirtualNetworkGateway,
    VnetLocal,
    Internet,
    VirtualAppliance,
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub properties: RouteProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    pub next_hop_type: NextHopType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_ip_address: Option<String>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Anything that reports a provisioning state
pub trait Provisioned {
    fn provisioning_state(&self) -> Option<&ProvisioningState>;

    fn is_settled(&self) -> bool {
        self.provisioning_state() == Some(&ProvisioningState::Succeeded)
    }
}

impl Provisioned for NetworkInterface {
    fn provisioning_state(&self) -> Option<&ProvisioningState> {
        self.properties.provisioning_state.as_ref()
    }
}

impl Provisioned for PublicIpAddress {
    fn provisioning_state(&self) -> Option<&ProvisioningState> {
        self.properties.provisioning_state.as_ref()
    }
}

impl Provisioned for Route {
    fn provisioning_state(&self) -> Option<&ProvisioningState> {
        self.properties.provisioning_state.as_ref()
    }
}

impl NetworkInterface {
    pub fn ip_configuration(&self, name: &str) -> Option<&IpConfiguration> {
        self.properties
            .ip_configurations
            .iter()
            .find(|c| c.name == name)
    }

    pub fn ip_configuration_mut(&mut self, name: &str) -> Option<&mut IpConfiguration> {
        self.properties
            .ip_configurations
            .iter_mut()
            .find(|c| c.name == name)
    }
}

impl IpConfiguration {
    /// Id of the associated public IP, if any
    pub fn public_ip_id(&self) -> Option<&str> {
        self.properties
            .public_ip_address
            .as_ref()
            .map(|r| r.id.as_str())
    }
}

impl PublicIpAddress {
    /// Id of the IP configuration this public IP is bound to, if any
    pub fn associated_ip_configuration(&self) -> Option<&str> {
        self.properties
            .ip_configuration
            .as_ref()
            .map(|r| r.id.as_str())
    }
}

impl Route {
    pub fn is_virtual_appliance(&self) -> bool {
        self.properties.next_hop_type == NextHopType::VirtualAppliance
    }

    /// Parsed next-hop address; `None` when absent or not IPv4
    pub fn next_hop(&self) -> Option<Ipv4Addr> {
        self.properties
            .next_hop_ip_address
            .as_deref()
            .and_then(|ip| ip.trim().parse().ok())
    }
}

/// One page of a list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}
