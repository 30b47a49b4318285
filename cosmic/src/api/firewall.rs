//! Ingress and egress firewall rule API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{string_or_i64, ApiParams};
use super::error::ApiError;

/// Firewall rule as returned by listFirewallRules / listEgressFirewallRules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FirewallRule {
    pub id: String,
    pub protocol: String,
    /// Comma separated
    pub cidrlist: String,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub startport: Option<i64>,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub endport: Option<i64>,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub icmptype: Option<i64>,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub icmpcode: Option<i64>,
    pub ipaddressid: String,
    pub networkid: String,
    pub state: String,
}

/// Parameters shared by createFirewallRule and createEgressFirewallRule
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateFirewallRuleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipaddressid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkid: Option<String>,
    pub protocol: String,
    pub cidrlist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startport: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endport: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmptype: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmpcode: Option<i64>,
}

pub struct FirewallApi<'a> {
    client: &'a Client,
}

impl<'a> FirewallApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// All ingress rules on a public IP address
    pub async fn list_rules(&self, ip_address_id: &str) -> Result<Vec<FirewallRule>, ApiError> {
        self.client
            .list(
                "listFirewallRules",
                "firewallrule",
                ApiParams::new()
                    .add("ipaddressid", ip_address_id)
                    .add("listall", true),
            )
            .await
    }

    pub async fn create_rule(
        &self,
        ctx: &Context,
        request: &CreateFirewallRuleRequest,
    ) -> Result<FirewallRule, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createFirewallRule",
                ApiParams::from_request(request)?,
                "firewallrule",
            )
            .await
    }

    pub async fn delete_rule(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteFirewallRule", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    /// All egress rules on a network
    pub async fn list_egress_rules(&self, network_id: &str) -> Result<Vec<FirewallRule>, ApiError> {
        self.client
            .list(
                "listEgressFirewallRules",
                "firewallrule",
                ApiParams::new()
                    .add("networkid", network_id)
                    .add("listall", true),
            )
            .await
    }

    pub async fn create_egress_rule(
        &self,
        ctx: &Context,
        request: &CreateFirewallRuleRequest,
    ) -> Result<FirewallRule, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createEgressFirewallRule",
                ApiParams::from_request(request)?,
                "firewallrule",
            )
            .await
    }

    pub async fn delete_egress_rule(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteEgressFirewallRule", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }
}
