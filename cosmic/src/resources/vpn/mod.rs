//! Site-to-site VPN between a VPC and a customer network

mod vpn_connection;
mod vpn_customer_gateway;
mod vpn_gateway;

pub use vpn_connection::VpnConnectionResource;
pub use vpn_customer_gateway::VpnCustomerGatewayResource;
pub use vpn_gateway::VpnGatewayResource;
