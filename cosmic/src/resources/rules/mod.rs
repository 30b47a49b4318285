//! Resources that own a set of remote rules on a single target

mod egress_firewall;
mod firewall;
mod network_acl_rule;
mod port_forward;
mod rule_set;

pub use egress_firewall::EgressFirewallResource;
pub use firewall::FirewallResource;
pub use network_acl_rule::NetworkAclRuleResource;
pub use port_forward::PortForwardResource;
