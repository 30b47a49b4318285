//! Load balancer rule API

use serde::{Deserialize, Serialize};
use tfplug::context::Context;

use super::client::Client;
use super::common::ApiParams;
use super::error::ApiError;
use super::virtual_machines::EntityRef;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadBalancerRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub algorithm: String,
    pub publicipid: String,
    pub networkid: String,
    /// Ports are returned as strings
    pub privateport: String,
    pub publicport: String,
    pub project: String,
    pub projectid: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateLoadBalancerRuleRequest {
    pub name: String,
    pub algorithm: String,
    pub privateport: u16,
    pub publicport: u16,
    pub publicipid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Firewall rules are managed separately
    pub openfirewall: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateLoadBalancerRuleRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

pub struct LoadBalancerApi<'a> {
    client: &'a Client,
}

impl<'a> LoadBalancerApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<LoadBalancerRule>, ApiError> {
        self.client
            .get_by_id(
                "listLoadBalancerRules",
                "loadbalancerrule",
                id,
                ApiParams::new().add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn create(
        &self,
        ctx: &Context,
        request: &CreateLoadBalancerRuleRequest,
    ) -> Result<LoadBalancerRule, ApiError> {
        self.client
            .request_async_entity(
                ctx,
                "createLoadBalancerRule",
                ApiParams::from_request(request)?,
                "loadbalancer",
            )
            .await
    }

    pub async fn update(
        &self,
        ctx: &Context,
        request: &UpdateLoadBalancerRuleRequest,
    ) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "updateLoadBalancerRule", ApiParams::from_request(request)?)
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        self.client
            .request_async(ctx, "deleteLoadBalancerRule", ApiParams::new().add("id", id))
            .await
            .map(|_| ())
    }

    /// Virtual machines currently balanced by the rule
    pub async fn list_members(
        &self,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Vec<EntityRef>, ApiError> {
        self.client
            .list(
                "listLoadBalancerRuleInstances",
                "loadbalancerruleinstance",
                ApiParams::new()
                    .add("id", id)
                    .add_optional("projectid", project_id),
            )
            .await
    }

    pub async fn assign(&self, ctx: &Context, id: &str, vm_ids: &[String]) -> Result<(), ApiError> {
        self.members_command(ctx, "assignToLoadBalancerRule", id, vm_ids)
            .await
    }

    pub async fn remove(&self, ctx: &Context, id: &str, vm_ids: &[String]) -> Result<(), ApiError> {
        self.members_command(ctx, "removeFromLoadBalancerRule", id, vm_ids)
            .await
    }

    async fn members_command(
        &self,
        ctx: &Context,
        command: &str,
        id: &str,
        vm_ids: &[String],
    ) -> Result<(), ApiError> {
        if vm_ids.is_empty() {
            return Ok(());
        }

        let params = ApiParams::new()
            .add("id", id)
            .add("virtualmachineids", vm_ids.join(","));

        self.client
            .request_async(ctx, command, params)
            .await
            .map(|_| ())
    }
}
