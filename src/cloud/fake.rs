//! In-memory control plane used by the controller tests
//!
//! Mutations apply immediately, keep public-IP back-references in sync the
//! way the real control plane does, and leave the touched resources in
//! `Updating` for a configurable number of polls.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::types::{
    InterfaceProperties, IpConfiguration, IpConfigurationProperties, NetworkInterface,
    NextHopType, ProvisioningState, PublicIpAddress, PublicIpProperties, Route, RouteProperties,
    SubResource,
};
use super::{CloudNetworkApi, PendingOperation, ResourceId};
use crate::error::{Error, Result};

pub(crate) const SUB: &str = "sub";
pub(crate) const RG: &str = "rg";

pub(crate) fn nic_id(nic: &str) -> String {
    ResourceId::network_interface(SUB, RG, nic).to_string()
}

pub(crate) fn ip_config_id(nic: &str, cfg: &str) -> String {
    format!("{}/ipConfigurations/{}", nic_id(nic), cfg)
}

pub(crate) fn public_ip_id(name: &str) -> String {
    ResourceId::public_ip(SUB, RG, name).to_string()
}

#[derive(Default)]
struct FakeState {
    interfaces: BTreeMap<String, NetworkInterface>,
    public_ips: BTreeMap<String, PublicIpAddress>,
    routes: BTreeMap<String, Vec<Route>>,
    calls: Vec<String>,
    failing_reads: usize,
    failure_status: u16,
    auth_failure: bool,
    stalled_auths: usize,
    auth_stall: Duration,
    settle_polls: usize,
    unsettled: BTreeMap<String, usize>,
}

impl FakeState {
    fn fail_read(&mut self) -> Result<()> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(Error::Http {
                status: self.failure_status,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn mark_updating(&mut self, key: String) {
        if self.settle_polls > 0 {
            self.unsettled.insert(key, self.settle_polls);
        }
    }

    /// Provisioning state reported for one poll of `key`
    fn poll_state(&mut self, key: &str) -> ProvisioningState {
        match self.unsettled.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                ProvisioningState::Updating
            }
            _ => ProvisioningState::Succeeded,
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn add_interface(&self, name: &str, ip_configs: &[&str]) {
        let nic = NetworkInterface {
            id: Some(nic_id(name)),
            name: name.to_string(),
            properties: InterfaceProperties {
                ip_configurations: ip_configs
                    .iter()
                    .map(|cfg| IpConfiguration {
                        id: Some(ip_config_id(name, cfg)),
                        name: cfg.to_string(),
                        properties: IpConfigurationProperties::default(),
                        extra: Default::default(),
                    })
                    .collect(),
                provisioning_state: Some(ProvisioningState::Succeeded),
                extra: Default::default(),
            },
            extra: Default::default(),
        };
        self.lock().interfaces.insert(name.to_string(), nic);
    }

    pub(crate) fn add_public_ip(&self, name: &str) {
        let ip = PublicIpAddress {
            id: Some(public_ip_id(name)),
            name: name.to_string(),
            properties: PublicIpProperties {
                provisioning_state: Some(ProvisioningState::Succeeded),
                ..Default::default()
            },
            extra: Default::default(),
        };
        self.lock().public_ips.insert(name.to_string(), ip);
    }

    /// Bind a public IP to an IP configuration without logging a call.
    /// `owner_id` lets tests point the public IP at foreign configurations.
    pub(crate) fn associate(&self, nic: &str, cfg: &str, public_ip: &str) {
        self.associate_with_owner(nic, cfg, public_ip, &ip_config_id(nic, cfg));
    }

    pub(crate) fn associate_with_owner(
        &self,
        nic: &str,
        cfg: &str,
        public_ip: &str,
        owner_id: &str,
    ) {
        let mut state = self.lock();
        if let Some(config) = state
            .interfaces
            .get_mut(nic)
            .and_then(|n| n.ip_configuration_mut(cfg))
        {
            config.properties.public_ip_address = Some(SubResource {
                id: public_ip_id(public_ip),
            });
        }
        if let Some(ip) = state.public_ips.get_mut(public_ip) {
            ip.properties.ip_configuration = Some(SubResource {
                id: owner_id.to_string(),
            });
        }
    }

    pub(crate) fn add_route(&self, table: &str, name: &str, hop_type: NextHopType, hop: &str) {
        let route = Route {
            id: None,
            name: name.to_string(),
            properties: RouteProperties {
                address_prefix: Some("0.0.0.0/0".to_string()),
                next_hop_type: hop_type,
                next_hop_ip_address: Some(hop.to_string()),
                provisioning_state: Some(ProvisioningState::Succeeded),
                extra: Default::default(),
            },
            extra: Default::default(),
        };
        self.lock()
            .routes
            .entry(table.to_string())
            .or_default()
            .push(route);
    }

    /// Make the next `times` reads fail with the given HTTP status
    pub(crate) fn fail_reads(&self, times: usize, status: u16) {
        let mut state = self.lock();
        state.failing_reads = times;
        state.failure_status = status;
    }

    pub(crate) fn fail_authentication(&self) {
        self.lock().auth_failure = true;
    }

    /// Make the next `times` authentications hang for `delay`
    pub(crate) fn stall_authentication(&self, times: usize, delay: Duration) {
        let mut state = self.lock();
        state.stalled_auths = times;
        state.auth_stall = delay;
    }

    /// Resources touched by a write report `Updating` for this many polls
    pub(crate) fn settle_after(&self, polls: usize) {
        self.lock().settle_polls = polls;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("update_"))
            .collect()
    }

    pub(crate) fn public_ip_owner(&self, name: &str) -> Option<String> {
        self.lock()
            .public_ips
            .get(name)
            .and_then(|ip| ip.associated_ip_configuration().map(str::to_string))
    }

    pub(crate) fn route_next_hop(&self, table: &str, name: &str) -> Option<String> {
        self.lock()
            .routes
            .get(table)
            .and_then(|routes| routes.iter().find(|r| r.name == name))
            .and_then(|r| r.properties.next_hop_ip_address.clone())
    }
}

#[async_trait]
impl CloudNetworkApi for FakeCloud {
    async fn authenticate(&self) -> Result<()> {
        let stall = {
            let mut state = self.lock();
            state.calls.push("authenticate".to_string());
            if state.auth_failure {
                return Err(Error::Authentication("invalid_client".to_string()));
            }
            if state.stalled_auths > 0 {
                state.stalled_auths -= 1;
                Some(state.auth_stall)
            } else {
                None
            }
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn get_interface(&self, _resource_group: &str, name: &str) -> Result<NetworkInterface> {
        let mut state = self.lock();
        state.calls.push(format!("get_interface {name}"));
        state.fail_read()?;
        let mut nic = state.interfaces.get(name).cloned().ok_or_else(|| Error::Http {
            status: 404,
            message: format!("ResourceNotFound: {name}"),
        })?;
        nic.properties.provisioning_state = Some(state.poll_state(&format!("interface/{name}")));
        Ok(nic)
    }

    async fn update_interface(
        &self,
        _resource_group: &str,
        name: &str,
        body: &NetworkInterface,
    ) -> Result<PendingOperation> {
        let mut state = self.lock();
        state.calls.push(format!("update_interface {name}"));

        let old = state.interfaces.get(name).cloned().ok_or_else(|| Error::Http {
            status: 404,
            message: format!("ResourceNotFound: {name}"),
        })?;

        // Single ownership is enforced at association time.
        for cfg in &body.properties.ip_configurations {
            let before = old.ip_configuration(&cfg.name).and_then(|c| c.public_ip_id());
            if let Some(new_id) = cfg.public_ip_id() {
                if before != Some(new_id) {
                    let pub_name = ResourceId::parse(new_id)?.name().to_string();
                    let this_config = ip_config_id(name, &cfg.name);
                    let owned_elsewhere = state
                        .public_ips
                        .get(&pub_name)
                        .and_then(|ip| ip.associated_ip_configuration())
                        .map(|owner| !owner.eq_ignore_ascii_case(&this_config))
                        .unwrap_or(false);
                    if owned_elsewhere {
                        return Err(Error::Http {
                            status: 400,
                            message: format!("PublicIPAddressInUse: {pub_name}"),
                        });
                    }
                }
            }
        }

        for cfg in &body.properties.ip_configurations {
            let before = old
                .ip_configuration(&cfg.name)
                .and_then(|c| c.public_ip_id())
                .map(str::to_string);
            let after = cfg.public_ip_id().map(str::to_string);
            if before == after {
                continue;
            }
            if let Some(old_id) = before {
                let pub_name = ResourceId::parse(&old_id)?.name().to_string();
                if let Some(ip) = state.public_ips.get_mut(&pub_name) {
                    ip.properties.ip_configuration = None;
                }
                state.mark_updating(format!("publicIp/{pub_name}"));
            }
            if let Some(new_id) = after {
                let pub_name = ResourceId::parse(&new_id)?.name().to_string();
                if let Some(ip) = state.public_ips.get_mut(&pub_name) {
                    ip.properties.ip_configuration = Some(SubResource {
                        id: ip_config_id(name, &cfg.name),
                    });
                }
                state.mark_updating(format!("publicIp/{pub_name}"));
            }
        }

        state.interfaces.insert(name.to_string(), body.clone());
        state.mark_updating(format!("interface/{name}"));
        Ok(PendingOperation::completed(format!("update_interface {name}")))
    }

    async fn get_public_ip(&self, _resource_group: &str, name: &str) -> Result<PublicIpAddress> {
        let mut state = self.lock();
        state.calls.push(format!("get_public_ip {name}"));
        state.fail_read()?;
        let mut ip = state.public_ips.get(name).cloned().ok_or_else(|| Error::Http {
            status: 404,
            message: format!("ResourceNotFound: {name}"),
        })?;
        ip.properties.provisioning_state = Some(state.poll_state(&format!("publicIp/{name}")));
        Ok(ip)
    }

    fn list_routes<'a>(
        &'a self,
        _resource_group: &'a str,
        table: &'a str,
    ) -> BoxStream<'a, Result<Route>> {
        let mut state = self.lock();
        state.calls.push(format!("list_routes {table}"));
        if let Err(e) = state.fail_read() {
            return stream::iter(vec![Err(e)]).boxed();
        }
        let routes = state.routes.get(table).cloned().unwrap_or_default();
        stream::iter(routes.into_iter().map(Ok)).boxed()
    }

    async fn get_route(&self, _resource_group: &str, table: &str, name: &str) -> Result<Route> {
        let mut state = self.lock();
        state.calls.push(format!("get_route {table}/{name}"));
        state.fail_read()?;
        let mut route = state
            .routes
            .get(table)
            .and_then(|routes| routes.iter().find(|r| r.name == name))
            .cloned()
            .ok_or_else(|| Error::Http {
                status: 404,
                message: format!("ResourceNotFound: {table}/{name}"),
            })?;
        route.properties.provisioning_state =
            Some(state.poll_state(&format!("route/{table}/{name}")));
        Ok(route)
    }

    async fn update_route(
        &self,
        _resource_group: &str,
        table: &str,
        name: &str,
        body: &Route,
    ) -> Result<PendingOperation> {
        let mut state = self.lock();
        state.calls.push(format!("update_route {table}/{name}"));
        let slot = state
            .routes
            .get_mut(table)
            .and_then(|routes| routes.iter_mut().find(|r| r.name == name))
            .ok_or_else(|| Error::Http {
                status: 404,
                message: format!("ResourceNotFound: {table}/{name}"),
            })?;
        *slot = body.clone();
        state.mark_updating(format!("route/{table}/{name}"));
        Ok(PendingOperation::completed(format!(
            "update_route {table}/{name}"
        )))
    }

    async fn wait(&self, operation: PendingOperation) -> Result<()> {
        self.lock()
            .calls
            .push(format!("wait {}", operation.description));
        Ok(())
    }
}
