//! Port forwarding rule API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::ApiParams;
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortForwardingRule {
    pub id: String,
    pub protocol: String,
    pub privateport: String,
    pub publicport: String,
    pub virtualmachineid: String,
    pub vmguestip: String,
    pub ipaddressid: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatePortForwardingRuleRequest {
    pub ipaddressid: String,
    pub protocol: String,
    pub privateport: u16,
    pub publicport: u16,
    pub virtualmachineid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmguestip: Option<String>,
    pub openfirewall: bool,
}

pub struct PortForwardingApi<'a> {
    client: &'a Client,
}

impl<'a> PortForwardingApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(
        &self,
        ip_address_id: &str,
        project_id: Option<&str>,
    ) -> Result<Vec<PortForwardingRule>, ApiError> {
        self.client
            .list(
                "listPortForwardingRules",
                "portforwardingrule",
                ApiParams::new()
                    .add("ipaddressid", ip_address_id)
                    .add("listall", true)
                    .add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn create(
        &self,
        ctx: &Context,
        request: &CreatePortForwardingRuleRequest,
    ) -> Result<PortForwardingRule, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createPortForwardingRule",
                ApiParams::from_request(request)?,
                "portforwardingrule",
            )
            .await
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deletePortForwardingRule", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{
        create_test_client, list_body, mock_async_job_with, mock_command_with,
    };
    use serde_json::json;

    #[tokio::test]
    async fn create_rule_disables_firewall_opening() {
        let mut server = mockito::Server::new_async().await;
        let (start, _job) = mock_async_job_with(
            &mut server,
            "createPortForwardingRule",
            &[("openfirewall", "false"), ("privateport", "8080"), ("publicport", "80")],
            "job-p",
            json!({"portforwardingrule": {"id": "pf-1", "privateport": "8080", "publicport": "80"}}),
        )
        .await;

        let client = create_test_client(&server.url());
        let rule = client
            .port_forwarding()
            .create(
                &Context::new(),
                &CreatePortForwardingRuleRequest {
                    ipaddressid: "ip-1".to_string(),
                    protocol: "tcp".to_string(),
                    privateport: 8080,
                    publicport: 80,
                    virtualmachineid: "vm-1".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(rule.id, "pf-1");
        start.assert_async().await;
    }

    #[tokio::test]
    async fn list_rules_of_an_address() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(
            &mut server,
            "listPortForwardingRules",
            &[("ipaddressid", "ip-1"), ("listall", "true")],
        )
        .with_body(list_body(
            "listPortForwardingRules",
            "portforwardingrule",
            json!([{"id": "pf-1", "protocol": "TCP", "privateport": "8080", "publicport": "80",
                    "virtualmachineid": "vm-1", "vmguestip": "10.0.0.5", "ipaddressid": "ip-1"}]),
        ))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        let rules = client.port_forwarding().list("ip-1", None).await.unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].privateport, "8080");
        assert_eq!(rules[0].vmguestip, "10.0.0.5");
    }

    #[tokio::test]
    async fn delete_rule_waits_for_job() {
        let mut server = mockito::Server::new_async().await;
        let (start, job) = mock_async_job_with(
            &mut server,
            "deletePortForwardingRule",
            &[("id", "pf-1")],
            "job-d",
            json!({"success": true}),
        )
        .await;

        let client = create_test_client(&server.url());
        client
            .port_forwarding()
            .delete(&Context::new(), "pf-1")
            .await
            .unwrap();

        start.assert_async().await;
        job.assert_async().await;
    }
}
