//! Next-hop reconciliation and the monitor truth table

use tracing::debug;

use super::identity::RouteIdentity;
use crate::cloud::Route;
use crate::controller::plan::{ConvergencePlan, Mutation};
use crate::error::{Error, Result};
use crate::ocf::Outcome;

/// Eligible routes split by where their next hop points inside our subnet
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub to_us: Vec<&'a Route>,
    pub elsewhere: Vec<&'a Route>,
}

/// Routes whose next hop falls outside our subnet are left out entirely
pub fn partition<'a>(routes: &'a [Route], identity: &RouteIdentity) -> Partition<'a> {
    let mut split = Partition::default();
    for route in routes {
        match route.next_hop() {
            Some(hop) if hop == identity.address => split.to_us.push(route),
            Some(hop) if identity.in_subnet(hop) => split.elsewhere.push(route),
            _ => debug!("Ignoring route {} outside {}", route.name, identity.subnet),
        }
    }
    split
}

/// Repoint every route that forwards into our subnet but not at us
pub fn compute_plan(
    routes: &[Route],
    identity: &RouteIdentity,
    resource_group: &str,
    table: &str,
) -> ConvergencePlan {
    let mut plan = ConvergencePlan::new(resource_group);
    for route in partition(routes, identity).elsewhere {
        plan.push(Mutation::UpdateNextHop {
            table: table.to_string(),
            route: route.name.clone(),
            next_hop: identity.address,
        });
    }
    plan
}

pub fn classify(routes: &[Route], identity: &RouteIdentity) -> Result<Outcome> {
    let split = partition(routes, identity);
    classify_counts(split.to_us.len(), split.elsewhere.len(), identity)
}

pub fn classify_counts(to_us: usize, elsewhere: usize, identity: &RouteIdentity) -> Result<Outcome> {
    match (to_us, elsewhere) {
        (0, 0) => Err(Error::NothingRouted(identity.subnet.to_string())),
        (_, 0) => Ok(Outcome::Success),
        (0, _) => Ok(Outcome::NotRunning),
        (to_us, elsewhere) => Err(Error::Topology(format!(
            "{} route(s) point at {} and {} at another host in {}",
            to_us, identity.address, elsewhere, identity.subnet
        ))),
    }
}
