//! Invocation configuration shared by both controllers

use std::path::PathBuf;
use std::time::Duration;

use ipnet::Ipv4Net;

use crate::cloud::{ArmEndpoints, Credentials};
use crate::error::{Error, Result};

/// Default location of the per-interface public-IP mapping files
pub const DEFAULT_MAPPING_DIR: &str = "/etc/cloud-failover/eip";

/// Call budget used when the cluster manager passes no timeout
pub const DEFAULT_CALL_BUDGET: Duration = Duration::from_secs(60);

/// Delays governing the convergence loops
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Budget for credential acquisition plus the liveness probe
    pub call_budget: Duration,
    /// Fixed delay between provisioning-state polls
    pub settle_delay: Duration,
    /// Fixed delay between validation attempts during `start`
    pub retry_backoff: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            call_budget: DEFAULT_CALL_BUDGET,
            settle_delay: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(10),
        }
    }
}

impl TimingConfig {
    /// Size the call budget from the invocation timeout (milliseconds),
    /// keeping a fifth of it for the cluster manager's own bookkeeping
    pub fn from_invocation_timeout(timeout_ms: Option<u64>) -> Self {
        let call_budget = match timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms.saturating_mul(4) / 5),
            _ => DEFAULT_CALL_BUDGET,
        };
        Self {
            call_budget,
            ..Default::default()
        }
    }
}

/// Monitor flavour requested by the cluster manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// One-shot probe; always reports the true state
    Probe,
    /// Recurring check; tolerates transient control-plane failures
    Periodic,
}

impl MonitorMode {
    /// A non-zero monitor interval marks a recurring check
    pub fn from_interval(interval_ms: Option<u64>) -> Self {
        match interval_ms {
            Some(ms) if ms > 0 => MonitorMode::Periodic,
            _ => MonitorMode::Probe,
        }
    }
}

/// Settings common to both controllers
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub credentials: Credentials,
    pub endpoints: ArmEndpoints,
    pub timing: TimingConfig,
    pub monitor_mode: MonitorMode,
    /// Compute and log the convergence plan without applying it
    pub dry_run: bool,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        require("subscription_id", &self.subscription_id)?;
        require("resource_group", &self.resource_group)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EipParams {
    /// Interface suffix; the cloud-side interface is `{hostname}-{interface}`
    pub interface: String,
    pub mapping_dir: PathBuf,
    /// Overrides the local hostname
    pub hostname: Option<String>,
}

impl EipParams {
    pub fn validate(&self) -> Result<()> {
        require("interface", &self.interface)
    }

    pub fn mapping_file(&self) -> PathBuf {
        self.mapping_dir.join(format!("{}.toml", self.interface))
    }
}

#[derive(Debug, Clone)]
pub struct RouteParams {
    /// Local interface whose address and subnet identify this node
    pub interface: String,
    pub table: String,
    /// Overrides local address detection
    pub local_address: Option<Ipv4Net>,
}

impl RouteParams {
    pub fn validate(&self) -> Result<()> {
        require("interface", &self.interface)?;
        require("table", &self.table)
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingParameter(format!("{name} is required")));
    }
    Ok(())
}
