//! Cloud network control-plane access
//!
//! The controllers only ever talk to the control plane through
//! [`CloudNetworkApi`]. [`ArmClient`] implements it over HTTPS.

pub mod auth;
mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod resource_id;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

pub use auth::Credentials;
pub use client::{ArmClient, ArmEndpoints};
pub use resource_id::ResourceId;
pub use types::{
    IpConfiguration, NetworkInterface, NextHopType, ProvisioningState, Provisioned,
    PublicIpAddress, Route,
};

/// A submitted mutation that has not necessarily completed yet
#[derive(Debug, Clone)]
pub struct PendingOperation {
    /// Human-readable description for logs
    pub description: String,
    /// Status endpoint to poll; `None` when the write completed synchronously
    pub status_url: Option<String>,
    /// Server-suggested delay between status polls
    pub retry_after: Option<Duration>,
}

impl PendingOperation {
    pub fn completed(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            status_url: None,
            retry_after: None,
        }
    }
}

/// Capability surface the controllers need from the control plane
#[async_trait]
pub trait CloudNetworkApi: Send + Sync {
    /// Acquire (or refresh) credentials
    async fn authenticate(&self) -> Result<()>;

    async fn get_interface(&self, resource_group: &str, name: &str) -> Result<NetworkInterface>;

    async fn update_interface(
        &self,
        resource_group: &str,
        name: &str,
        body: &NetworkInterface,
    ) -> Result<PendingOperation>;

    async fn get_public_ip(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress>;

    /// Lazily list every route in a table. The stream can be consumed once.
    fn list_routes<'a>(
        &'a self,
        resource_group: &'a str,
        table: &'a str,
    ) -> BoxStream<'a, Result<Route>>;

    async fn get_route(&self, resource_group: &str, table: &str, name: &str) -> Result<Route>;

    async fn update_route(
        &self,
        resource_group: &str,
        table: &str,
        name: &str,
        body: &Route,
    ) -> Result<PendingOperation>;

    /// Block until the operation reaches a terminal state
    async fn wait(&self, operation: PendingOperation) -> Result<()>;
}
