//! Route-table failover controller
//!
//! Every virtual-appliance route whose next hop lies in our subnet must
//! point at our address while this node is active.

mod identity;
mod reconcile;

use std::sync::Arc;

use futures::{future, TryStreamExt};
use tracing::{info, instrument, warn};

use super::{apply_tolerance, retry_until_valid, Deadline, Executor};
use crate::cloud::{CloudNetworkApi, Route};
use crate::config::{AgentConfig, RouteParams};
use crate::error::{Error, Result};
use crate::ocf::{Outcome, Verb};

pub use identity::{parse_ip_addr_output, RouteIdentity};
pub use reconcile::{classify, classify_counts, compute_plan, partition, Partition};

struct Snapshot {
    identity: RouteIdentity,
    routes: Vec<Route>,
}

pub struct RouteController {
    api: Arc<dyn CloudNetworkApi>,
    config: AgentConfig,
    params: RouteParams,
}

impl RouteController {
    pub fn new(api: Arc<dyn CloudNetworkApi>, config: AgentConfig, params: RouteParams) -> Self {
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

    #[instrument(skip(self), fields(table = %self.params.table))]
    pub async fn start(&self) -> Result<Outcome> {
        let Snapshot {
            identity,
            mut routes,
        } = retry_until_valid(self.config.timing.retry_backoff, move || self.validate()).await?;

        let rg = self.config.resource_group.as_str();
        let table = self.params.table.as_str();
        let executor = Executor::new(self.api.as_ref(), rg, self.config.timing.settle_delay);

        loop {
            let plan = compute_plan(&routes, &identity, rg, table);
            if plan.is_empty() {
                let split = partition(&routes, &identity);
                if split.to_us.is_empty() {
                    warn!(
                        "No route in {} forwards into {}, nothing to claim",
                        table, identity.subnet
                    );
                } else {
                    info!(
                        "{} route(s) in {} point at {}",
                        split.to_us.len(),
                        table,
                        identity.address
                    );
                }
                return Ok(Outcome::Success);
            }

            info!("Convergence plan: {}", plan);
            if self.config.dry_run {
                info!("Dry run, leaving cloud state untouched");
                return Ok(Outcome::Success);
            }

            executor.execute(&plan).await?;
            routes = self.read_routes().await?;
        }
    }

    /// Routes only move when the peer starts
    pub async fn stop(&self) -> Result<Outcome> {
        info!("Stop requested, routes stay where they are until the peer starts");
        Ok(Outcome::Success)
    }

    #[instrument(skip(self), fields(table = %self.params.table, mode = ?self.config.monitor_mode))]
    pub async fn monitor(&self) -> Result<Outcome> {
        let result = match self.validate().await {
            Ok(snapshot) => classify(&snapshot.routes, &snapshot.identity),
            Err(e) => Err(e),
        };
        apply_tolerance(result, self.config.monitor_mode)
    }

    pub async fn validate_all(&self) -> Result<Outcome> {
        self.validate().await.map(|_| Outcome::Success)
    }

    async fn validate(&self) -> Result<Snapshot> {
        self.config.validate()?;
        self.params.validate()?;

        let deadline = Deadline::after(self.config.timing.call_budget);
        let identity = deadline.run(RouteIdentity::resolve(&self.params)).await?;

        deadline.run(self.api.authenticate()).await?;
        let routes = deadline.run(self.read_routes()).await?;

        Ok(Snapshot { identity, routes })
    }

    /// Every virtual-appliance route in the table; an empty set cannot be
    /// managed
    async fn read_routes(&self) -> Result<Vec<Route>> {
        let routes: Vec<Route> = self
            .api
            .list_routes(&self.config.resource_group, &self.params.table)
            .try_filter(|route| future::ready(route.is_virtual_appliance()))
            .try_collect()
            .await?;

        if routes.is_empty() {
            return Err(Error::ConfigError(format!(
                "Route table {} has no virtual appliance routes",
                self.params.table
            )));
        }
        Ok(routes)
    }
}
