//! VPC API, including private gateways and static routes

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{ApiParams, Tag};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Vpc {
    pub id: String,
    pub name: String,
    pub displaytext: String,
    pub cidr: String,
    pub vpcofferingid: String,
    pub vpcofferingname: String,
    pub networkdomain: String,
    pub zoneid: String,
    pub zonename: String,
    pub project: String,
    pub projectid: String,
    pub sourcenatlist: String,
    pub syslogserverlist: String,
    pub state: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VpcOffering {
    pub id: String,
    pub name: String,
    pub displaytext: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrivateGateway {
    pub id: String,
    pub ipaddress: String,
    pub networkid: String,
    pub aclid: String,
    pub vpcid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticRoute {
    pub id: String,
    pub cidr: String,
    pub nexthop: String,
    pub vpcid: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVpcRequest {
    pub name: String,
    pub displaytext: String,
    pub cidr: String,
    pub vpcofferingid: String,
    pub zoneid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcenatlist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslogserverlist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVpcRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displaytext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcenatlist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslogserverlist: Option<String>,
}

pub struct VpcsApi<'a> {
    client: &'a Client,
}

impl<'a> VpcsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str, project_id: Option<&str>) -> Result<Option<Vpc>, ApiError> {
        self.client
            .get_by_id(
                "listVPCs",
                "vpc",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn create(&self, ctx: &Context, request: &CreateVpcRequest) -> Result<Vpc, ApiError> {
        self.client
            .request_async_entity(ctx, "createVPC", ApiParams::from_request(request)?, "vpc")
            .await
    }

    pub async fn update(&self, ctx: &Context, request: &UpdateVpcRequest) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "updateVPC", ApiParams::from_request(request)?)
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteVPC", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    pub async fn get_offering(&self, id: &str) -> Result<Option<VpcOffering>, ApiError> {
        self.client
            .get_by_id("listVPCOfferings", "vpcoffering", id, ApiParams::new())
            .await
    }

    pub async fn get_private_gateway(&self, id: &str) -> Result<Option<PrivateGateway>, ApiError> {
        self.client
            .get_by_id("listPrivateGateways", "privategateway", id, ApiParams::new())
            .await
    }

    pub async fn create_private_gateway(
        &self,
        ctx: &Context,
        ip_address: &str,
        network_id: &str,
        vpc_id: &str,
        acl_id: &str,
    ) -> Result<PrivateGateway, ApiError> {
        let params = ApiParams::new()
            .add("ipaddress", ip_address)
            .add("networkid", network_id)
            .add("vpcid", vpc_id)
            .add_non_empty("aclid", acl_id);

        self.client
            .request_async_entity(ctx, "createPrivateGateway", params, "privategateway")
            .await
    }

    pub async fn delete_private_gateway(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deletePrivateGateway", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    pub async fn get_static_route(&self, id: &str) -> Result<Option<StaticRoute>, ApiError> {
        self.client
            .get_by_id("listStaticRoutes", "staticroute", id, ApiParams::new())
            .await
    }

    pub async fn create_static_route(
        &self,
        ctx: &Context,
        cidr: &str,
        nexthop: &str,
        vpc_id: &str,
    ) -> Result<StaticRoute, ApiError> {
        let params = ApiParams::new()
            .add("cidr", cidr)
            .add("nexthop", nexthop)
            .add("vpcid", vpc_id);

        self.client
            .request_async_entity(ctx, "createStaticRoute", params, "staticroute")
            .await
    }

    pub async fn delete_static_route(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteStaticRoute", ApiParams::new().add("id", id))
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
    async fn create_vpc_waits_for_job() {
        let mut server = mockito::Server::new_async().await;
        let (start, job) = mock_async_job_with(
            &mut server,
            "createVPC",
            &[("cidr", "10.0.0.0/16"), ("displaytext", "prod")],
            "job-v",
            json!({"vpc": {"id": "vpc-1", "name": "prod", "cidr": "10.0.0.0/16"}}),
        )
        .await;

        let client = create_test_client(&server.url());
        let vpc = client
            .vpcs()
            .create(
                &Context::new(),
                &CreateVpcRequest {
                    name: "prod".to_string(),
                    displaytext: "prod".to_string(),
                    cidr: "10.0.0.0/16".to_string(),
                    vpcofferingid: "vo-1".to_string(),
                    zoneid: "z-1".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(vpc.id, "vpc-1");
        start.assert_async().await;
        job.assert_async().await;
    }

    #[tokio::test]
    async fn get_static_route() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(&mut server, "listStaticRoutes", &[("id", "sr-1")])
            .with_body(list_body(
                "listStaticRoutes",
                "staticroute",
                json!([{"id": "sr-1", "cidr": "192.168.0.0/16", "nexthop": "10.0.0.254", "vpcid": "vpc-1"}]),
            ))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let route = client.vpcs().get_static_route("sr-1").await.unwrap().unwrap();
        assert_eq!(route.nexthop, "10.0.0.254");
    }
}
