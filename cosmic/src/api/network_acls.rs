//! Network ACL list and ACL rule API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{string_or_i64, ApiParams};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkAclList {
    pub id: String,
    pub name: String,
    pub description: String,
    pub vpcid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkAclRule {
    pub id: String,
    pub protocol: String,
    pub cidrlist: String,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub startport: Option<i64>,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub endport: Option<i64>,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub icmptype: Option<i64>,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub icmpcode: Option<i64>,
    /// `Allow` / `Deny`
    pub action: String,
    /// `Ingress` / `Egress`
    pub traffictype: String,
    pub aclid: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateNetworkAclRuleRequest {
    pub aclid: String,
    pub protocol: String,
    pub cidrlist: Vec<String>,
    pub action: String,
    pub traffictype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startport: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endport: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmptype: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmpcode: Option<i64>,
}

pub struct NetworkAclsApi<'a> {
    client: &'a Client,
}

impl<'a> NetworkAclsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_list(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<NetworkAclList>, ApiError> {
        self.client
            .get_by_id(
                "listNetworkACLLists",
                "networkacllist",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn create_list(
        &self,
        ctx: &Context,
        name: &str,
        description: &str,
        vpc_id: &str,
    ) -> Result<NetworkAclList, ApiError> {
        let params = ApiParams::new()
            .add("name", name)
            .add("description", description)
            .add("vpcid", vpc_id);

        self.client
            .request_async_entity(ctx, "createNetworkACLList", params, "networkacllist")
            .await
    }

    pub async fn delete_list(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteNetworkACLList", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    pub async fn list_rules(&self, acl_id: &str) -> Result<Vec<NetworkAclRule>, ApiError> {
        self.client
            .list(
                "listNetworkACLs",
                "networkacl",
                ApiParams::new().add("aclid", acl_id).add("listall", true),
            )
            .await
    }

    pub async fn create_rule(
        &self,
        ctx: &Context,
        request: &CreateNetworkAclRuleRequest,
    ) -> Result<NetworkAclRule, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createNetworkACL",
                ApiParams::from_request(request)?,
                "networkacl",
            )
            .await
    }

    pub async fn delete_rule(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteNetworkACL", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    /// Attaches an ACL list to a VPC tier
    pub async fn replace_for_network(
        &self,
        ctx: &Context,
        acl_id: &str,
        network_id: &str,
    ) -> Result<(), ApiError> {
        self.replace(ctx, ApiParams::new().add("aclid", acl_id).add("networkid", network_id))
            .await
    }

    /// Attaches an ACL list to a public IP address on a VPC
    pub async fn replace_for_public_ip(
        &self,
        ctx: &Context,
        acl_id: &str,
        public_ip_id: &str,
    ) -> Result<(), ApiError> {
        self.replace(ctx, ApiParams::new().add("aclid", acl_id).add("publicipid", public_ip_id))
            .await
    }

    async fn replace(&self, ctx: &Context, params: ApiParams) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "replaceNetworkACLList", params)
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
    async fn list_rules_of_acl() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(&mut server, "listNetworkACLs", &[("aclid", "acl-1")])
            .with_body(list_body(
                "listNetworkACLs",
                "networkacl",
                json!([{
                    "id": "r-1", "protocol": "tcp", "cidrlist": "10.0.0.0/8",
                    "startport": "22", "endport": "22", "action": "Allow", "traffictype": "Ingress"
                }]),
            ))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let rules = client.network_acls().list_rules("acl-1").await.unwrap();

        assert_eq!(rules[0].startport, Some(22));
        assert_eq!(rules[0].action, "Allow");
    }

    #[tokio::test]
    async fn replace_acl_on_public_ip() {
        let mut server = mockito::Server::new_async().await;
        let (start, _job) = mock_async_job_with(
            &mut server,
            "replaceNetworkACLList",
            &[("aclid", "acl-1"), ("publicipid", "ip-1")],
            "job-x",
            json!({"success": true}),
        )
        .await;

        let client = create_test_client(&server.url());
        client
            .network_acls()
            .replace_for_public_ip(&Context::new(), "acl-1", "ip-1")
            .await
            .unwrap();

        start.assert_async().await;
    }
}
