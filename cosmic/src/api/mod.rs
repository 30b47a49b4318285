//! Cosmic control-plane API client
//!
//! Every command is a signed request against a single endpoint. Typed
//! sub-APIs are reached through accessors on [`Client`], e.g.
//! `client.vpcs().get(id)`.

pub mod client;
pub mod common;
pub mod error;
pub mod signing;

pub mod addresses;
pub mod affinity_groups;
pub mod firewall;
pub mod load_balancer;
pub mod network_acls;
pub mod networks;
pub mod port_forwarding;
pub mod security_groups;
pub mod ssh_keypairs;
pub mod tags;
pub mod templates;
pub mod virtual_machines;
pub mod volumes;
pub mod vpcs;
pub mod vpn;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, ClientConfig, RetryConfig};
pub use common::{ApiParams, NamedEntity, Tag};
pub use error::ApiError;
