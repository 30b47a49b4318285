//! Networks, VPCs and the addressing built on top of them

mod ipaddress;
mod loadbalancer_rule;
mod network;
mod network_acl;
mod private_gateway;
mod security_group;
mod static_nat;
mod static_route;
mod vpc;

pub use ipaddress::IpAddressResource;
pub use loadbalancer_rule::LoadBalancerRuleResource;
pub use network::NetworkResource;
pub use network_acl::NetworkAclResource;
pub use private_gateway::PrivateGatewayResource;
pub use security_group::SecurityGroupResource;
pub use static_nat::StaticNatResource;
pub use static_route::StaticRouteResource;
pub use vpc::VpcResource;
