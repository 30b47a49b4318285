//! Site-to-site VPN API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{bool_or_string, string_or_i64, ApiParams};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VpnGateway {
    pub id: String,
    pub publicip: String,
    pub vpcid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VpnCustomerGateway {
    pub id: String,
    pub name: String,
    pub cidrlist: String,
    pub esppolicy: String,
    pub gateway: String,
    pub ikepolicy: String,
    pub ipsecpsk: String,
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub dpd: bool,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub esplifetime: Option<i64>,
    #[serde(deserialize_with = "string_or_i64::deserialize")]
    pub ikelifetime: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VpnConnection {
    pub id: String,
    pub s2scustomergatewayid: String,
    pub s2svpngatewayid: String,
    pub state: String,
}

/// Shared by create and update; `id` is only sent on update
#[derive(Debug, Clone, Default, Serialize)]
pub struct VpnCustomerGatewayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub cidrlist: Vec<String>,
    pub esppolicy: String,
    pub gateway: String,
    pub ikepolicy: String,
    pub ipsecpsk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpd: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esplifetime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ikelifetime: Option<i64>,
}

pub struct VpnApi<'a> {
    client: &'a Client,
}

impl<'a> VpnApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_gateway(&self, id: &str) -> Result<Option<VpnGateway>, ApiError> {
        self.client
            .get_by_id("listVpnGateways", "vpngateway", id, ApiParams::new())
            .await
    }

    pub async fn create_gateway(&self, ctx: &Context, vpc_id: &str) -> Result<VpnGateway, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createVpnGateway",
                ApiParams::new().add("vpcid", vpc_id),
                "vpngateway",
            )
            .await
    }

    pub async fn delete_gateway(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteVpnGateway", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    pub async fn get_customer_gateway(&self, id: &str) -> Result<Option<VpnCustomerGateway>, ApiError> {
        self.client
            .get_by_id("listVpnCustomerGateways", "vpncustomergateway", id, ApiParams::new())
            .await
    }

    pub async fn create_customer_gateway(
        &self,
        ctx: &Context,
        request: &VpnCustomerGatewayRequest,
    ) -> Result<VpnCustomerGateway, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createVpnCustomerGateway",
                ApiParams::from_request(request)?,
                "vpncustomergateway",
            )
            .await
    }

    pub async fn update_customer_gateway(
        &self,
        ctx: &Context,
        request: &VpnCustomerGatewayRequest,
    ) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "updateVpnCustomerGateway", ApiParams::from_request(request)?)
            .await
            .map(|_| ())
    }

    pub async fn delete_customer_gateway(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteVpnCustomerGateway", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    pub async fn get_connection(&self, id: &str) -> Result<Option<VpnConnection>, ApiError> {
        self.client
            .get_by_id("listVpnConnections", "vpnconnection", id, ApiParams::new())
            .await
    }

    pub async fn create_connection(
        &self,
        ctx: &Context,
        customer_gateway_id: &str,
        vpn_gateway_id: &str,
    ) -> Result<VpnConnection, ApiError> {
        let params = ApiParams::new()
            .add("s2scustomergatewayid", customer_gateway_id)
            .add("s2svpngatewayid", vpn_gateway_id);

        self.client
            .request_async_entity(ctx, "createVpnConnection", params, "vpnconnection")
            .await
    }

    pub async fn delete_connection(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteVpnConnection", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::VpnCustomerGatewayRequest;
    use crate::api::test_helpers::{
        create_test_client, list_body, mock_async_job_with, mock_command_with,
    };
    use serde_json::json;
    use tfplug::context::Context;

    #[tokio::test]
    async fn customer_gateway_lifetimes_accept_strings() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(&mut server, "listVpnCustomerGateways", &[("id", "cg-1")])
            .with_body(list_body(
                "listVpnCustomerGateways",
                "vpncustomergateway",
                json!([{
                    "id": "cg-1", "name": "office", "cidrlist": "192.168.0.0/24,192.168.1.0/24",
                    "dpd": "true", "esplifetime": "3600", "ikelifetime": 86400
                }]),
            ))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let gateway = client.vpn().get_customer_gateway("cg-1").await.unwrap().unwrap();

        assert!(gateway.dpd);
        assert_eq!(gateway.esplifetime, Some(3600));
        assert_eq!(gateway.ikelifetime, Some(86400));
    }

    #[tokio::test]
    async fn create_customer_gateway_joins_cidrs() {
        let mut server = mockito::Server::new_async().await;
        let (start, _job) = mock_async_job_with(
            &mut server,
            "createVpnCustomerGateway",
            &[
                ("name", "office"),
                ("cidrlist", "192.168.0.0/24,192.168.1.0/24"),
                ("gateway", "203.0.113.10"),
            ],
            "job-c",
            json!({"vpncustomergateway": {"id": "cg-1", "name": "office"}}),
        )
        .await;

        let client = create_test_client(&server.url());
        let gateway = client
            .vpn()
            .create_customer_gateway(
                &Context::new(),
                &VpnCustomerGatewayRequest {
                    name: "office".to_string(),
                    cidrlist: vec!["192.168.0.0/24".to_string(), "192.168.1.0/24".to_string()],
                    esppolicy: "aes256-sha1".to_string(),
                    gateway: "203.0.113.10".to_string(),
                    ikepolicy: "aes256-sha1;modp1536".to_string(),
                    ipsecpsk: "secret".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(gateway.id, "cg-1");
        start.assert_async().await;
    }

    #[tokio::test]
    async fn create_connection_links_both_gateways() {
        let mut server = mockito::Server::new_async().await;
        let (start, _job) = mock_async_job_with(
            &mut server,
            "createVpnConnection",
            &[("s2scustomergatewayid", "cg-1"), ("s2svpngatewayid", "vpngw-1")],
            "job-v",
            json!({"vpnconnection": {"id": "conn-1", "state": "Pending"}}),
        )
        .await;

        let client = create_test_client(&server.url());
        let connection = client
            .vpn()
            .create_connection(&Context::new(), "cg-1", "vpngw-1")
            .await
            .unwrap();

        assert_eq!(connection.id, "conn-1");
        assert_eq!(connection.state, "Pending");
        start.assert_async().await;
    }

    #[tokio::test]
    async fn delete_gateway_waits_for_job() {
        let mut server = mockito::Server::new_async().await;
        let (start, job) = mock_async_job_with(
            &mut server,
            "deleteVpnGateway",
            &[("id", "vpngw-1")],
            "job-d",
            json!({"success": true}),
        )
        .await;

        let client = create_test_client(&server.url());
        client.vpn().delete_gateway(&Context::new(), "vpngw-1").await.unwrap();

        start.assert_async().await;
        job.assert_async().await;
    }
}
