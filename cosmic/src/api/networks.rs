//! Network API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::{ApiParams, Tag};
use super::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub displaytext: String,
    pub cidr: String,
    pub gateway: String,
    pub netmask: String,
    pub networkdomain: String,
    pub networkofferingid: String,
    pub networkofferingname: String,
    pub vlan: String,
    pub vpcid: String,
    pub aclid: String,
    pub zoneid: String,
    pub zonename: String,
    pub project: String,
    pub projectid: String,
    pub state: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub displaytext: String,
    pub networkofferingid: String,
    pub zoneid: String,
    pub gateway: String,
    pub netmask: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpcid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateNetworkRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displaytext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkofferingid: Option<String>,
}

pub struct NetworksApi<'a> {
    client: &'a Client,
}

impl<'a> NetworksApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str, project_id: Option<&str>) -> Result<Option<Network>, ApiError> {
        self.client
            .get_by_id(
                "listNetworks",
                "network",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    /// createNetwork is synchronous
    pub async fn create(&self, request: &CreateNetworkRequest) -> Result<Network, ApiError> {
        self.client
            .request_entity("createNetwork", ApiParams::from_request(request)?, "network")
            .await
    }

    pub async fn update(&self, ctx: &Context, request: &UpdateNetworkRequest) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "updateNetwork", ApiParams::from_request(request)?)
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteNetwork", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{
        create_test_client, list_body, mock_async_job_with, mock_command_with, response_body,
    };
    use serde_json::json;

    #[tokio::test]
    async fn create_network_is_synchronous() {
        let mut server = mockito::Server::new_async().await;
        let mock = mock_command_with(
            &mut server,
            "createNetwork",
            &[("gateway", "10.0.1.1"), ("netmask", "255.255.255.0")],
        )
        .with_body(response_body(
            "createNetwork",
            json!({"network": {"id": "net-1", "name": "tier1", "cidr": "10.0.1.0/24"}}),
        ))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        let network = client
            .networks()
            .create(&CreateNetworkRequest {
                name: "tier1".to_string(),
                displaytext: "tier1".to_string(),
                networkofferingid: "no-1".to_string(),
                zoneid: "z-1".to_string(),
                gateway: "10.0.1.1".to_string(),
                netmask: "255.255.255.0".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(network.id, "net-1");
        assert_eq!(network.cidr, "10.0.1.0/24");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_network_waits_for_job() {
        let mut server = mockito::Server::new_async().await;
        let (start, job) = mock_async_job_with(
            &mut server,
            "updateNetwork",
            &[("id", "net-1"), ("name", "tier1-renamed")],
            "job-u",
            json!({"network": {"id": "net-1"}}),
        )
        .await;

        let client = create_test_client(&server.url());
        client
            .networks()
            .update(
                &Context::new(),
                &UpdateNetworkRequest {
                    id: "net-1".to_string(),
                    name: Some("tier1-renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        start.assert_async().await;
        job.assert_async().await;
    }

    #[tokio::test]
    async fn get_network_in_project() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_command_with(
            &mut server,
            "listNetworks",
            &[("id", "net-1"), ("projectid", "p-1")],
        )
        .with_body(list_body(
            "listNetworks",
            "network",
            json!([{"id": "net-1", "name": "tier1", "aclid": "acl-1", "vpcid": "vpc-1",
                    "tags": [{"key": "env", "value": "prod"}]}]),
        ))
        .create_async()
        .await;

        let client = create_test_client(&server.url());
        let network = client
            .networks()
            .get("net-1", Some("p-1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(network.aclid, "acl-1");
        assert_eq!(network.tags[0].key, "env");
    }

    #[tokio::test]
    async fn delete_network_reports_failed_job() {
        let mut server = mockito::Server::new_async().await;
        let _start = mock_command_with(&mut server, "deleteNetwork", &[("id", "net-1")])
            .with_body(response_body("deleteNetwork", json!({"jobid": "job-d"})))
            .create_async()
            .await;
        let _job = mock_command_with(&mut server, "queryAsyncJobResult", &[("jobid", "job-d")])
            .with_body(response_body(
                "queryAsyncJobResult",
                json!({"jobid": "job-d", "jobstatus": 2, "jobresult": {"errorcode": 530, "cserrorcode": 4250, "errortext": "Network has active VMs"}}),
            ))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client
            .networks()
            .delete(&Context::new(), "net-1")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Network has active VMs"));
    }
}
