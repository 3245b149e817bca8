//! Public-IP reconciliation and health classification

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::identity::EipIdentity;
use super::mapping::DesiredMapping;
use crate::cloud::{NetworkInterface, PublicIpAddress, ResourceId};
use crate::controller::plan::{Binding, ConvergencePlan, Mutation};
use crate::error::{Error, Result};
use crate::ocf::Outcome;

/// Compute the mutations that move every mapped public IP onto our interface
///
/// `public_ips` holds the current state of each desired public IP, keyed by
/// the IP-configuration name it is mapped to. Any conflict aborts the whole
/// computation so no partial plan ever escapes.
pub fn compute_plan(
    mapping: &DesiredMapping,
    identity: &EipIdentity,
    interface: &NetworkInterface,
    public_ips: &BTreeMap<String, PublicIpAddress>,
) -> Result<ConvergencePlan> {
    let mut disassociations: Vec<(String, Vec<ResourceId>)> = Vec::new();
    let mut bindings = Vec::new();

    for (cfg_name, desired) in mapping.iter() {
        let cfg = interface.ip_configuration(cfg_name).ok_or_else(|| {
            Error::ConfigError(format!(
                "Interface {} has no IP configuration {}",
                interface.name, cfg_name
            ))
        })?;

        match cfg.public_ip_id() {
            Some(current) if desired.matches(current) => {
                debug!("{} already carries {}", cfg_name, desired.name());
                continue;
            }
            Some(current) => {
                return Err(Error::ConflictingAssociation(format!(
                    "{} is associated with {} but should carry {}",
                    cfg_name,
                    current,
                    desired.name()
                )));
            }
            None => {}
        }

        let public_ip = public_ips.get(cfg_name).ok_or_else(|| {
            Error::ConfigError(format!("Public IP {} was not read", desired.name()))
        })?;

        if let Some(owner_ref) = public_ip.associated_ip_configuration() {
            let owner = ResourceId::parse(owner_ref)?;
            if identity.is_self(&owner) && owner.name().eq_ignore_ascii_case(cfg_name) {
                // The public IP already points here; the interface read lags.
                info!(
                    "{} already references {}, rebinding on {}",
                    desired.name(),
                    cfg_name,
                    identity.interface_name
                );
                bindings.push(Binding {
                    ip_configuration: cfg_name.to_string(),
                    public_ip: desired.clone(),
                });
                continue;
            }
            if identity.is_self(&owner) {
                return Err(Error::ConflictingAssociation(format!(
                    "{} is bound to {} on our own interface, not {}",
                    desired.name(),
                    owner.name(),
                    cfg_name
                )));
            }
            if !identity.is_peer(&owner) {
                return Err(Error::Topology(format!(
                    "{} is associated with {}, which is neither {} nor its peer",
                    desired.name(),
                    owner_ref,
                    identity.interface_name
                )));
            }

            let peer = owner.network_interface_name().unwrap_or_default().to_string();
            info!("{} is held by peer interface {}", desired.name(), peer);
            match disassociations
                .iter_mut()
                .find(|(nic, _)| nic.eq_ignore_ascii_case(&peer))
            {
                Some((_, ips)) => ips.push(desired.clone()),
                None => disassociations.push((peer, vec![desired.clone()])),
            }
        }

        bindings.push(Binding {
            ip_configuration: cfg_name.to_string(),
            public_ip: desired.clone(),
        });
    }

    let mut plan = ConvergencePlan::new(identity.resource_group());
    for (interface, public_ips) in disassociations {
        plan.push(Mutation::Disassociate {
            interface,
            public_ips,
        });
    }
    if !bindings.is_empty() {
        plan.push(Mutation::Associate {
            interface: identity.interface_name.clone(),
            bindings,
        });
    }
    Ok(plan)
}

/// Every mapped IP configuration must carry exactly its desired public IP
pub fn classify(mapping: &DesiredMapping, interface: &NetworkInterface) -> Result<Outcome> {
    for (cfg_name, desired) in mapping.iter() {
        let cfg = interface.ip_configuration(cfg_name).ok_or_else(|| {
            Error::ConfigError(format!(
                "Interface {} has no IP configuration {}",
                interface.name, cfg_name
            ))
        })?;

        match cfg.public_ip_id() {
            Some(current) if desired.matches(current) => {}
            Some(current) => {
                info!(
                    "{} carries {} instead of {}, not running",
                    cfg_name,
                    current,
                    desired.name()
                );
                return Ok(Outcome::NotRunning);
            }
            None => {
                info!("{} has no public IP, not running", cfg_name);
                return Ok(Outcome::NotRunning);
            }
        }
    }
    Ok(Outcome::Success)
}
