//! cloud-failover: active/standby failover controllers for cloud networks
//!
//! Keeps public-IP associations and route-table next-hops pointed at
//! whichever node of a two-node cluster is currently active. Invoked by the
//! cluster manager once per verb; nothing is kept between invocations.

pub mod cloud;
pub mod config;
pub mod controller;
pub mod error;
pub mod ocf;
pub mod telemetry;

pub use crate::error::{Error, Result};
