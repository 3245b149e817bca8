//! Convergence plans
//!
//! A plan is the reconciler's only output and the executor's only input.
//! It is recomputed from scratch on every pass and never persisted.

use std::fmt;
use std::net::Ipv4Addr;

use crate::cloud::ResourceId;

/// Bind a public IP to one of our IP configurations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub ip_configuration: String,
    pub public_ip: ResourceId,
}

/// A resource that must report `Succeeded` before dependent work proceeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleTarget {
    Interface { name: String },
    PublicIp { resource_group: String, name: String },
    Route { table: String, name: String },
}

impl fmt::Display for SettleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettleTarget::Interface { name } => write!(f, "interface {name}"),
            SettleTarget::PublicIp { name, .. } => write!(f, "public IP {name}"),
            SettleTarget::Route { table, name } => write!(f, "route {table}/{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Detach public IPs from the peer's interface
    Disassociate {
        interface: String,
        public_ips: Vec<ResourceId>,
    },
    /// Attach public IPs to our interface
    Associate {
        interface: String,
        bindings: Vec<Binding>,
    },
    /// Point a route at our address
    UpdateNextHop {
        table: String,
        route: String,
        next_hop: Ipv4Addr,
    },
}

impl Mutation {
    /// The resource written by this step
    pub fn target(&self) -> SettleTarget {
        match self {
            Mutation::Disassociate { interface, .. } | Mutation::Associate { interface, .. } => {
                SettleTarget::Interface {
                    name: interface.clone(),
                }
            }
            Mutation::UpdateNextHop { table, route, .. } => SettleTarget::Route {
                table: table.clone(),
                name: route.clone(),
            },
        }
    }

    /// Resources that must be settled after this step before the next one
    pub fn settles(&self) -> Vec<SettleTarget> {
        let public_ip = |id: &ResourceId| SettleTarget::PublicIp {
            resource_group: id.resource_group().to_string(),
            name: id.name().to_string(),
        };

        let mut targets = vec![self.target()];
        match self {
            Mutation::Disassociate { public_ips, .. } => {
                targets.extend(public_ips.iter().map(public_ip));
            }
            Mutation::Associate { bindings, .. } => {
                targets.extend(bindings.iter().map(|b| public_ip(&b.public_ip)));
            }
            Mutation::UpdateNextHop { .. } => {}
        }
        targets
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Disassociate {
                interface,
                public_ips,
            } => {
                let names: Vec<&str> = public_ips.iter().map(|id| id.name()).collect();
                write!(f, "disassociate({}, {})", interface, names.join(", "))
            }
            Mutation::Associate {
                interface,
                bindings,
            } => {
                let pairs: Vec<String> = bindings
                    .iter()
                    .map(|b| format!("{}={}", b.ip_configuration, b.public_ip.name()))
                    .collect();
                write!(f, "associate({}, {})", interface, pairs.join(", "))
            }
            Mutation::UpdateNextHop {
                table,
                route,
                next_hop,
            } => write!(f, "update_next_hop({table}/{route}, {next_hop})"),
        }
    }
}

/// Ordered mutations for one resource group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergencePlan {
    pub resource_group: String,
    pub steps: Vec<Mutation>,
}

impl ConvergencePlan {
    pub fn new(resource_group: &str) -> Self {
        Self {
            resource_group: resource_group.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: Mutation) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

impl fmt::Display for ConvergencePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("[]");
        }
        let steps: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", steps.join(", "))
    }
}
