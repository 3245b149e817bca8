//! Applies convergence plans through the asynchronous control plane
//!
//! Every step waits for its target to settle, submits the write, blocks on
//! the returned operation and then waits for every resource the step touched
//! to settle before the next step is considered. Settle-polling is not bounded
//! by the validation deadline; only the cluster manager's timeout stops it.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::plan::{ConvergencePlan, Mutation, SettleTarget};
use crate::cloud::types::SubResource;
use crate::cloud::{CloudNetworkApi, PendingOperation, Provisioned};
use crate::error::{Error, Result};

pub struct Executor<'a> {
    api: &'a dyn CloudNetworkApi,
    resource_group: &'a str,
    settle_delay: Duration,
}

impl<'a> Executor<'a> {
    pub fn new(api: &'a dyn CloudNetworkApi, resource_group: &'a str, settle_delay: Duration) -> Self {
        Self {
            api,
            resource_group,
            settle_delay,
        }
    }

    /// Apply every step of the plan in order
    #[instrument(skip(self, plan), fields(steps = plan.len()))]
    pub async fn execute(&self, plan: &ConvergencePlan) -> Result<()> {
        for (index, step) in plan.steps.iter().enumerate() {
            info!("Applying step {}/{}: {}", index + 1, plan.len(), step);

            self.wait_until_settled(&step.target()).await?;
            let operation = self.submit(step).await?;
            self.api.wait(operation).await?;

            for target in step.settles() {
                self.wait_until_settled(&target).await?;
            }
        }
        Ok(())
    }

    /// Poll until the resource reports `Succeeded`
    pub async fn wait_until_settled(&self, target: &SettleTarget) -> Result<()> {
        let mut polls = 0u32;
        loop {
            let settled = match target {
                SettleTarget::Interface { name } => self
                    .api
                    .get_interface(self.resource_group, name)
                    .await?
                    .is_settled(),
                SettleTarget::PublicIp {
                    resource_group,
                    name,
                } => self
                    .api
                    .get_public_ip(resource_group, name)
                    .await?
                    .is_settled(),
                SettleTarget::Route { table, name } => self
                    .api
                    .get_route(self.resource_group, table, name)
                    .await?
                    .is_settled(),
            };

            if settled {
                if polls > 0 {
                    debug!("{} settled after {} poll(s)", target, polls);
                }
                return Ok(());
            }

            polls += 1;
            debug!(
                "{} not settled yet (poll {}), retrying in {:?}",
                target, polls, self.settle_delay
            );
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    /// Read-modify-write the step's target and return the pending operation
    async fn submit(&self, step: &Mutation) -> Result<PendingOperation> {
        let rg = self.resource_group;
        match step {
            Mutation::Disassociate {
                interface,
                public_ips,
            } => {
                let mut nic = self.api.get_interface(rg, interface).await?;
                let mut detached = 0;
                for cfg in nic.properties.ip_configurations.iter_mut() {
                    let targeted = cfg
                        .public_ip_id()
                        .map(|id| public_ips.iter().any(|p| p.matches(id)))
                        .unwrap_or(false);
                    if targeted {
                        cfg.properties.public_ip_address = None;
                        detached += 1;
                    }
                }

                if detached == 0 {
                    warn!(
                        "Interface {} no longer holds the public IPs to detach, skipping write",
                        interface
                    );
                    return Ok(PendingOperation::completed(format!(
                        "no-op disassociate {interface}"
                    )));
                }
                self.api.update_interface(rg, interface, &nic).await
            }
            Mutation::Associate {
                interface,
                bindings,
            } => {
                let mut nic = self.api.get_interface(rg, interface).await?;
                for binding in bindings {
                    let cfg = nic
                        .ip_configuration_mut(&binding.ip_configuration)
                        .ok_or_else(|| {
                            Error::ConfigError(format!(
                                "IP configuration {} vanished from interface {}",
                                binding.ip_configuration, interface
                            ))
                        })?;
                    cfg.properties.public_ip_address = Some(SubResource {
                        id: binding.public_ip.to_string(),
                    });
                }
                self.api.update_interface(rg, interface, &nic).await
            }
            Mutation::UpdateNextHop {
                table,
                route,
                next_hop,
            } => {
                let mut current = self.api.get_route(rg, table, route).await?;
                current.properties.next_hop_ip_address = Some(next_hop.to_string());
                self.api.update_route(rg, table, route, &current).await
            }
        }
    }
}
