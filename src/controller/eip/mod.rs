//! Public-IP failover controller
//!
//! Keeps the public IPs listed in the mapping file attached to this node's
//! interface while it is active. `start` moves them over from the peer,
//! `monitor` checks they are still here.

mod identity;
mod mapping;
mod reconcile;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};

use super::{apply_tolerance, retry_until_valid, Deadline, Executor};
use crate::cloud::{CloudNetworkApi, NetworkInterface, PublicIpAddress};
use crate::config::{AgentConfig, EipParams};
use crate::error::Result;
use crate::ocf::{Outcome, Verb};

pub use identity::EipIdentity;
pub use mapping::DesiredMapping;
pub use reconcile::{classify, compute_plan};

/// Everything validation establishes; never handed out partially built
struct Snapshot {
    mapping: DesiredMapping,
    identity: EipIdentity,
    interface: NetworkInterface,
}

pub struct EipController {
    api: Arc<dyn CloudNetworkApi>,
    config: AgentConfig,
    params: EipParams,
}

impl EipController {
    pub fn new(api: Arc<dyn CloudNetworkApi>, config: AgentConfig, params: EipParams) -> Self {
        Self {
            api,
            config,
            params,
        }
    }

    pub async fn handle(&self, verb: Verb) -> Result<Outcome> {
        match verb {
            Verb::Start => self.start().await,
            Verb::Stop => self.stop().await,
            Verb::Monitor => self.monitor().await,
            Verb::ValidateAll => self.validate_all().await,
        }
    }

    /// Claim every mapped public IP, looping until the plan comes back empty
    #[instrument(skip(self), fields(interface = %self.params.interface))]
    pub async fn start(&self) -> Result<Outcome> {
        let Snapshot {
            mapping,
            identity,
            mut interface,
        } = retry_until_valid(self.config.timing.retry_backoff, move || self.validate()).await?;

        let rg = self.config.resource_group.as_str();
        let executor = Executor::new(self.api.as_ref(), rg, self.config.timing.settle_delay);

        let mut passes = 0u32;
        loop {
            passes += 1;
            let public_ips = self.read_public_ips(&mapping).await?;
            let plan = compute_plan(&mapping, &identity, &interface, &public_ips)?;

            if plan.is_empty() {
                info!(
                    "Interface {} holds all {} mapped public IP(s) after {} pass(es)",
                    identity.interface_name,
                    mapping.len(),
                    passes
                );
                return Ok(Outcome::Success);
            }

            info!("Convergence plan: {}", plan);
            if self.config.dry_run {
                info!("Dry run, leaving cloud state untouched");
                return Ok(Outcome::Success);
            }

            executor.execute(&plan).await?;
            interface = self.api.get_interface(rg, &identity.interface_name).await?;
        }
    }

    /// Ownership only changes through the peer's `start`
    pub async fn stop(&self) -> Result<Outcome> {
        info!("Stop requested, public IPs stay where they are until the peer starts");
        Ok(Outcome::Success)
    }

    #[instrument(skip(self), fields(interface = %self.params.interface, mode = ?self.config.monitor_mode))]
    pub async fn monitor(&self) -> Result<Outcome> {
        let result = match self.validate().await {
            Ok(snapshot) => classify(&snapshot.mapping, &snapshot.interface),
            Err(e) => Err(e),
        };
        apply_tolerance(result, self.config.monitor_mode)
    }

    pub async fn validate_all(&self) -> Result<Outcome> {
        self.validate().await.map(|_| Outcome::Success)
    }

    /// Load desired state, authenticate and probe our interface within the
    /// call budget
    async fn validate(&self) -> Result<Snapshot> {
        self.config.validate()?;
        self.params.validate()?;

        let deadline = Deadline::after(self.config.timing.call_budget);
        let mapping = deadline
            .run(DesiredMapping::for_params(&self.config, &self.params))
            .await?;
        let identity = EipIdentity::resolve(&self.config, &self.params)?;

        deadline.run(self.api.authenticate()).await?;
        let interface = deadline
            .run(
                self.api
                    .get_interface(&self.config.resource_group, &identity.interface_name),
            )
            .await?;

        Ok(Snapshot {
            mapping,
            identity,
            interface,
        })
    }

    /// Current state of every desired public IP, keyed by IP-configuration
    async fn read_public_ips(
        &self,
        mapping: &DesiredMapping,
    ) -> Result<BTreeMap<String, PublicIpAddress>> {
        let mut public_ips = BTreeMap::new();
        for (cfg_name, desired) in mapping.iter() {
            let ip = self
                .api
                .get_public_ip(desired.resource_group(), desired.name())
                .await?;
            public_ips.insert(cfg_name.to_string(), ip);
        }
        Ok(public_ips)
    }
}
